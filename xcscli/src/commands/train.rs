//! Training against a synthetic test suite.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use rand::rngs::StdRng;
use rand::Rng;

use xcslib::agent::{Agent, AgentSettings, ReplayAgentSettings, ReplaySettings, Reward, XcsSettings};
use xcslib::situation::{Situation, TestOutcome};
use xcslib::types::Value;

use crate::fatal_error;

use super::*;

/// Latent state of one synthetic test case.
struct TestCase {
    failure_rate: f64,
    duration: Value,
    history: VecDeque<TestOutcome>,
    last_run: Option<usize>,
}

/// A synthetic test suite: tests fail with latent per-test probabilities and
/// the agent's bucket choices are graded against the observed verdicts.
struct SyntheticSuite {
    tests: Vec<TestCase>,
    history_length: usize,
    rng: StdRng,
}

impl SyntheticSuite {
    fn new(count: usize, history_length: usize) -> Self {
        let mut rng = xcslib::create_rng();
        let tests = (0..count)
            .map(|i| TestCase {
                // A fifth of the suite is flaky, the rest mostly passes.
                failure_rate: if i % 5 == 0 { 0.4 } else { 0.05 },
                duration: 0.1 + rng.gen::<f64>() * 1.9,
                history: VecDeque::new(),
                last_run: None,
            })
            .collect();
        SyntheticSuite {
            tests,
            history_length,
            rng,
        }
    }

    /// Indices of the tests scheduled for this cycle.
    fn schedule(&mut self) -> Vec<usize> {
        (0..self.tests.len())
            .filter(|_| self.rng.gen::<f64>() < 0.7)
            .collect()
    }

    /// Situation describing the test as the agent sees it.
    fn situation(&self, index: usize, cycle: usize) -> Situation {
        let test = &self.tests[index];
        let mut previous_results = vec![TestOutcome::Passed; self.history_length];
        let recent = test
            .history
            .iter()
            .rev()
            .take(self.history_length)
            .collect::<Vec<_>>();
        for (slot, outcome) in previous_results.iter_mut().rev().zip(recent) {
            *slot = *outcome;
        }
        Situation {
            previous_results,
            last_execution: match test.last_run {
                Some(last) => (cycle - last) as Value * 0.1,
                None => 1.0,
            },
            duration: test.duration,
        }
    }

    /// Run the test and record its verdict.
    fn execute(&mut self, index: usize, cycle: usize) -> TestOutcome {
        let outcome = if self.rng.gen::<f64>() < self.tests[index].failure_rate {
            TestOutcome::Failed
        } else {
            TestOutcome::Passed
        };
        let test = &mut self.tests[index];
        test.history.push_back(outcome);
        if test.history.len() > self.history_length {
            test.history.pop_front();
        }
        test.last_run = Some(cycle);
        outcome
    }

    /// Grade the bucket choice: failing tests belong in urgent buckets,
    /// passing tests in late ones. Bucket 0 is the most urgent.
    fn grade(&self, bucket: usize, bucket_count: usize, outcome: TestOutcome) -> Value {
        if bucket_count < 2 {
            return 1.0;
        }
        let position = bucket as Value / (bucket_count - 1) as Value;
        match outcome {
            TestOutcome::Failed => 1.0 - position,
            TestOutcome::Passed => position,
        }
    }
}

impl Train {
    fn agent_settings(&self) -> AgentSettings {
        let xcs = XcsSettings {
            max_population_size: self.population_size,
            history_length: self.history_length,
            initial_exploration: 0.25,
            exploration_floor: 0.1,
            discount: 0.71,
        };
        match self.agent {
            AgentKind::OnPolicy => AgentSettings::OnPolicy(xcs),
            AgentKind::Replay => AgentSettings::ExperienceReplay(ReplayAgentSettings {
                xcs,
                replay: ReplaySettings::default(),
            }),
        }
    }

    pub fn run(self) {
        if let Some(seed) = self.seed {
            xcslib::RANDOM_SEED.with(|s| s.set(Some(seed)));
        }

        let settings = match &self.settings {
            Some(path) => match xcslib::io::read_settings(path) {
                Ok(settings) => settings,
                Err(err) => fatal_error!(1, "Cannot read settings: {}", err),
            },
            None => self.agent_settings(),
        };
        let history_length = match &settings {
            AgentSettings::OnPolicy(xcs) => xcs.history_length,
            AgentSettings::ExperienceReplay(replay) => replay.xcs.history_length,
        };
        let buckets: Vec<usize> = (0..self.buckets).collect();
        let mut agent = match settings.build(buckets) {
            Ok(agent) => agent,
            Err(err) => fatal_error!(1, "Cannot build agent: {}", err),
        };

        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let interrupted = interrupted.clone();
            if let Err(err) = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            {
                log::warn!("Cannot set Ctrl-C handler: {err}");
            }
        }

        let mut suite = SyntheticSuite::new(self.tests, history_length);
        let mut completed = 0;
        let mut last_mean_reward = 0.0;
        for cycle in 0..self.cycles {
            if interrupted.load(Ordering::SeqCst) {
                log::warn!("Interrupted, stopping after {} cycles.", completed);
                break;
            }
            let scheduled = suite.schedule();
            let mut rewards = Vec::with_capacity(scheduled.len());
            for &index in &scheduled {
                let sigma = suite.situation(index, cycle);
                let bucket = match agent.get_action(&sigma) {
                    Ok(bucket) => bucket,
                    Err(err) => fatal_error!(1, "Training failed: {}", err),
                };
                let outcome = suite.execute(index, cycle);
                rewards.push(suite.grade(bucket, self.buckets, outcome));
            }
            last_mean_reward = if rewards.is_empty() {
                0.0
            } else {
                rewards.iter().sum::<Value>() / rewards.len() as Value
            };
            if let Err(err) = agent.reward(Reward::from(rewards)) {
                fatal_error!(1, "Training failed: {}", err);
            }
            completed += 1;
            if completed % 10 == 0 {
                log::info!(
                    "Cycle {}: {} classifiers, mean reward {:.3}",
                    completed,
                    agent.population().len(),
                    last_mean_reward
                );
            }
        }

        let population = agent.population();
        let count = population.len().max(1) as Value;
        println!("{:20}{}", "Agent:".bold(), agent.name());
        println!("{:20}{}", "Cycles:".bold(), completed);
        println!("{:20}{}", "Classifiers:".bold(), population.len());
        println!("{:20}{}", "Numerosity:".bold(), population.total_numerosity());
        println!(
            "{:20}{:.4}",
            "Mean fitness:".bold(),
            population.total_fitness() / count
        );
        println!(
            "{:20}{:.4}",
            "Mean prediction:".bold(),
            population.iter().map(|c| c.prediction).sum::<Value>() / count
        );
        println!("{:20}{:.3}", "Last mean reward:".bold(), last_mean_reward);

        if let Some(output) = &self.output {
            if let Err(err) = agent.save(output) {
                fatal_error!(1, "Cannot save agent: {}", err);
            }
            println!("{:20}{}", "Saved to:".bold(), output.display());
        }
    }
}
