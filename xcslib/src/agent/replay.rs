//! The experience-replay agent and its transition memory.

use std::collections::{HashMap, VecDeque};
use std::mem;
use std::path::Path;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::XcsError;
use crate::ga::GeneticAlgorithm;
use crate::io;
use crate::matching::Matching;
use crate::population::Population;
use crate::reinforcement;
use crate::selection::ActionSelection;
use crate::situation::Situation;
use crate::types::{ActionIndex, Time, Value};
use crate::{create_rng, current_seed};

use super::{Agent, ReplaySettings, Reward, XcsSettings};

/// A stored state transition awaiting replay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transition {
    /// Situation observed when the action was taken.
    pub situation: Situation,
    /// Index of the taken action.
    pub action: ActionIndex,
    /// Reward delivered for the action.
    pub reward: Value,
    /// CI cycle the action belongs to.
    pub cycle: u64,
}

/// Ring of past transitions with rank-proportional batch sampling.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReplayMemory {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        ReplayMemory {
            transitions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Add a new transition, evicting the oldest one if the ring is full.
    pub fn add(&mut self, transition: Transition) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Sample up to `size` transitions recorded strictly before `cycle`,
    /// without replacement. Draw weights are rank-proportional over the
    /// insertion order, so newer transitions are preferred. When the
    /// candidates fit into the batch they are all returned.
    pub fn sample_batch(&self, size: usize, cycle: u64, rng: &mut StdRng) -> Vec<Transition> {
        let usable = self
            .transitions
            .iter()
            .filter(|t| t.cycle < cycle)
            .cloned()
            .collect_vec();
        if usable.len() <= size {
            return usable;
        }
        match index::sample_weighted(rng, usable.len(), |rank| (rank + 1) as f64, size) {
            Ok(indices) => indices.iter().map(|i| usable[i].clone()).collect(),
            Err(_) => {
                log::warn!("rank weights rejected, sampling the batch uniformly");
                index::sample(rng, usable.len(), size)
                    .iter()
                    .map(|i| usable[i].clone())
                    .collect()
            }
        }
    }

    /// The stored transitions of one CI cycle.
    pub fn transitions_of_cycle(&self, cycle: u64) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.cycle == cycle)
    }
}

/// Experience-replay XCS agent.
///
/// Decisions only record the chosen action. Learning happens in batches over
/// stored transitions: the payoff target of a transition from cycle `c` is
/// bootstrapped from the average re-matched prediction over the transitions
/// of cycle `c + 1`.
#[derive(Serialize, Deserialize, Clone)]
pub struct ReplayAgent<A> {
    settings: XcsSettings,
    replay_settings: ReplaySettings,
    possible_actions: Vec<A>,
    population: Population,
    timestamp: Time,
    exploration: Value,
    /// Decisions of the in-flight cycle.
    action_history: Vec<(Situation, ActionIndex)>,
    memory: ReplayMemory,
    /// Completed CI cycles.
    cycle: u64,
    /// Whether action selection may explore.
    pub train_mode: bool,
    /// Seed the generator is rebuilt from after loading.
    seed: Option<u64>,
    #[serde(skip, default = "crate::create_rng")]
    rng: StdRng,
}

impl<A: Clone> ReplayAgent<A> {
    pub fn new(
        settings: XcsSettings,
        replay_settings: ReplaySettings,
        possible_actions: Vec<A>,
    ) -> Result<Self, XcsError> {
        settings.validate(possible_actions.len())?;
        Ok(ReplayAgent {
            exploration: settings.initial_exploration,
            memory: ReplayMemory::new(replay_settings.capacity),
            settings,
            replay_settings,
            possible_actions,
            population: Population::new(),
            timestamp: 1,
            action_history: Vec::new(),
            cycle: 0,
            train_mode: true,
            seed: current_seed(),
            rng: create_rng(),
        })
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    /// Current GA time, advanced once per replayed action set.
    pub fn timestamp(&self) -> Time {
        self.timestamp
    }

    /// Choose an action for the situation. Only the chosen action is
    /// retained; reinforcement re-derives action sets during replay.
    pub fn get_action(&mut self, sigma: &Situation) -> Result<A, XcsError> {
        let decision = super::decide(
            &mut self.population,
            &self.settings,
            self.possible_actions.len(),
            &mut self.exploration,
            self.train_mode,
            sigma,
            self.timestamp,
            &mut self.rng,
        )?;
        self.action_history.push((sigma.clone(), decision.action));
        Ok(self.possible_actions[decision.action].clone())
    }

    /// Store one transition per in-flight action, close the CI cycle, and
    /// learn from memory on the second and every third cycle. Every call
    /// ends by enforcing the population bound.
    pub fn reward(&mut self, reward: impl Into<Reward>) -> Result<(), XcsError> {
        let rewards = reward.into().resolve(self.action_history.len())?;
        for ((situation, action), reward) in
            mem::take(&mut self.action_history).into_iter().zip(rewards)
        {
            self.memory.add(Transition {
                situation,
                action,
                reward,
                cycle: self.cycle,
            });
        }
        self.cycle += 1;
        if self.cycle == 2 || self.cycle % 3 == 0 {
            self.learn_from_experience()?;
        }
        self.population
            .delete_excess(self.settings.max_population_size, &mut self.rng);
        Ok(())
    }

    /// Replay a batch of past transitions. Transitions whose following cycle
    /// has no stored experience carry no bootstrap target and are skipped, as
    /// are transitions whose action no longer has advocates in the re-matched
    /// set.
    fn learn_from_experience(&mut self) -> Result<(), XcsError> {
        log::debug!("starting experience replay at cycle {}", self.cycle);
        let batch =
            self.memory
                .sample_batch(self.replay_settings.batch, self.cycle - 1, &mut self.rng);

        let mut bootstraps: HashMap<u64, Option<Value>> = HashMap::new();
        for cycle in batch.iter().map(|t| t.cycle).unique().collect_vec() {
            let value = self.average_prediction(cycle + 1)?;
            bootstraps.insert(cycle, value);
        }

        let action_count = self.possible_actions.len();
        let matching = Matching::new(action_count, action_count);
        let ga = GeneticAlgorithm::new(action_count);
        for transition in &batch {
            let Some(target) = bootstraps[&transition.cycle] else {
                continue;
            };
            let payoff = transition.reward + self.settings.discount * target;
            let match_set = matching.get_match_set(
                &mut self.population,
                &transition.situation,
                self.timestamp,
                &mut self.rng,
            )?;
            let selector = ActionSelection::new(action_count, self.exploration);
            let action_set =
                selector.get_action_set(&self.population, &match_set, transition.action);
            if action_set.is_empty() {
                continue;
            }
            reinforcement::reinforce(&mut self.population, &action_set, payoff);
            ga.perform_iteration(
                &mut self.population,
                &action_set,
                &transition.situation,
                self.timestamp,
                &mut self.rng,
            );
            self.timestamp += 1;
        }
        self.population
            .delete_excess(self.settings.max_population_size, &mut self.rng);
        log::debug!(
            "finished experience replay, {} classifiers in population",
            self.population.len()
        );
        Ok(())
    }

    /// Average bootstrap prediction over the stored transitions of a cycle,
    /// `None` when the cycle has no stored transitions. Greedy by default;
    /// the `on_policy` setting switches to the chosen action's value.
    fn average_prediction(&mut self, cycle: u64) -> Result<Option<Value>, XcsError> {
        let situations = self
            .memory
            .transitions_of_cycle(cycle)
            .map(|t| t.situation.clone())
            .collect_vec();
        if situations.is_empty() {
            return Ok(None);
        }
        let action_count = self.possible_actions.len();
        let matching = Matching::new(action_count, action_count);
        let selector = ActionSelection::new(action_count, 0.0);
        let mut sum = 0.0;
        for situation in &situations {
            let match_set = matching.get_match_set(
                &mut self.population,
                situation,
                self.timestamp,
                &mut self.rng,
            )?;
            let array = selector.get_prediction_array(&self.population, &match_set);
            let value = if self.replay_settings.on_policy {
                let action = selector.select_action(&array, self.train_mode, &mut self.rng);
                array.value(action)
            } else {
                array.best_value()
            };
            sum += value.unwrap_or(0.0);
        }
        Ok(Some(sum / situations.len() as Value))
    }

    /// Persist the agent to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), XcsError>
    where
        A: Serialize,
    {
        io::save(self, path)
    }

    /// Load an agent from a file, rebuilding the generator from the stored
    /// seed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, XcsError>
    where
        A: DeserializeOwned,
    {
        let mut agent: Self = io::load(path)?;
        agent.rng = match agent.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => create_rng(),
        };
        Ok(agent)
    }
}

impl<A: Clone + Serialize> Agent<A> for ReplayAgent<A> {
    fn name(&self) -> &'static str {
        "XCS_ER"
    }

    fn get_action(&mut self, sigma: &Situation) -> Result<A, XcsError> {
        ReplayAgent::get_action(self, sigma)
    }

    fn reward(&mut self, reward: Reward) -> Result<(), XcsError> {
        ReplayAgent::reward(self, reward)
    }

    fn save(&self, path: &Path) -> Result<(), XcsError> {
        ReplayAgent::save(self, path)
    }

    fn population(&self) -> &Population {
        &self.population
    }
}
