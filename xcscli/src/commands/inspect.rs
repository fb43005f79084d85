//! Printing statistics of saved agents.
use colored::Colorize;

use xcslib::agent::{Agent, OnPolicyAgent, ReplayAgent};
use xcslib::classifier::{Classifier, ResultCondition};
use xcslib::population::Population;
use xcslib::types::Value;

use crate::fatal_error;

use super::*;

fn condition_string(classifier: &Classifier) -> String {
    classifier
        .previous_results
        .iter()
        .map(|condition| match condition {
            ResultCondition::Passed => 'P',
            ResultCondition::Failed => 'F',
            ResultCondition::DontCare => '#',
        })
        .collect()
}

fn print_population(name: &str, population: &Population, top: usize) {
    println!("{:20}{}", "Agent:".bold(), name);
    println!("{:20}{}", "Classifiers:".bold(), population.len());
    println!("{:20}{}", "Numerosity:".bold(), population.total_numerosity());

    if population.is_empty() {
        return;
    }
    let count = population.len() as Value;
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
    println!(
        "{:20}{:.4}",
        "Mean error:".bold(),
        population.iter().map(|c| c.epsilon).sum::<Value>() / count
    );

    let mut ranked: Vec<&Classifier> = population.iter().collect();
    ranked.sort_by(|a, b| {
        b.fitness
            .partial_cmp(&a.fitness)
            .expect("Fitness values must be comparable (not NaN)")
    });
    println!("{}", "Top classifiers:".bold());
    for classifier in ranked.into_iter().take(top) {
        println!(
            "  {} -> {}  p={:.3} eps={:.3} F={:.4} n={} exp={}",
            condition_string(classifier),
            classifier.action,
            classifier.prediction,
            classifier.epsilon,
            classifier.fitness,
            classifier.numerosity,
            classifier.experience,
        );
    }
}

fn print_json(population: &Population) {
    match serde_json::to_string_pretty(population) {
        Ok(out) => println!("{}", out),
        Err(err) => fatal_error!(1, "Error while serializing population: {}", err),
    }
}

impl Inspect {
    pub fn run(self) {
        match self.agent {
            AgentKind::OnPolicy => {
                let agent = match OnPolicyAgent::<usize>::load(&self.path) {
                    Ok(agent) => agent,
                    Err(err) => fatal_error!(1, "Cannot load agent: {}", err),
                };
                if self.json {
                    print_json(agent.population());
                    return;
                }
                print_population(agent.name(), agent.population(), self.top);
            }
            AgentKind::Replay => {
                let agent = match ReplayAgent::<usize>::load(&self.path) {
                    Ok(agent) => agent,
                    Err(err) => fatal_error!(1, "Cannot load agent: {}", err),
                };
                if self.json {
                    print_json(agent.population());
                    return;
                }
                println!("{:20}{}", "Transitions:".bold(), agent.memory().len());
                print_population(agent.name(), agent.population(), self.top);
            }
        }
    }
}
