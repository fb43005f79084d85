//! The one-step on-policy agent.

use std::mem;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::XcsError;
use crate::ga::GeneticAlgorithm;
use crate::io;
use crate::population::Population;
use crate::reinforcement;
use crate::situation::Situation;
use crate::types::{ClassifierId, Time, Value};
use crate::{create_rng, current_seed};

use super::{Agent, Reward, XcsSettings};

/// One in-flight decision: the situation and the ids of the classifiers
/// whose action won.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct HistoryEntry {
    situation: Situation,
    action_set: Vec<ClassifierId>,
}

/// One-step on-policy XCS agent.
///
/// Rewards arrive one CI cycle late: each [`Self::reward`] call reinforces
/// the previous cycle's action sets with a target bootstrapped from the
/// current cycle's average chosen-action prediction.
#[derive(Serialize, Deserialize, Clone)]
pub struct OnPolicyAgent<A> {
    settings: XcsSettings,
    possible_actions: Vec<A>,
    population: Population,
    timestamp: Time,
    exploration: Value,
    /// Decisions of the in-flight cycle.
    action_history: Vec<HistoryEntry>,
    /// Previous cycle's decisions, awaiting their bootstrap target.
    old_action_history: Vec<HistoryEntry>,
    /// Sum of chosen-action predictions over the in-flight cycle.
    prediction_sum: Value,
    /// Rewards stored by the previous `reward` call.
    pending_rewards: Option<Vec<Value>>,
    /// Whether action selection may explore.
    pub train_mode: bool,
    /// Seed the generator is rebuilt from after loading.
    seed: Option<u64>,
    #[serde(skip, default = "crate::create_rng")]
    rng: StdRng,
}

impl<A: Clone> OnPolicyAgent<A> {
    pub fn new(settings: XcsSettings, possible_actions: Vec<A>) -> Result<Self, XcsError> {
        settings.validate(possible_actions.len())?;
        Ok(OnPolicyAgent {
            exploration: settings.initial_exploration,
            settings,
            possible_actions,
            population: Population::new(),
            timestamp: 1,
            action_history: Vec::new(),
            old_action_history: Vec::new(),
            prediction_sum: 0.0,
            pending_rewards: None,
            train_mode: true,
            seed: current_seed(),
            rng: create_rng(),
        })
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Current exploration probability.
    pub fn exploration(&self) -> Value {
        self.exploration
    }

    /// Current GA time, advanced once per reinforced action set.
    pub fn timestamp(&self) -> Time {
        self.timestamp
    }

    /// Choose an action for the situation and retain the winning action set
    /// for the reinforcement that follows the next reward call.
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
        // The chosen action's value feeds the on-policy bootstrap. A niche
        // without fitness contributes its undivided zero sum.
        self.prediction_sum += decision.array.value(decision.action).unwrap_or(0.0);
        let action_set = decision
            .action_set
            .iter()
            .map(|&i| self.population.get(i).id)
            .collect();
        self.action_history.push(HistoryEntry {
            situation: sigma.clone(),
            action_set,
        });
        Ok(self.possible_actions[decision.action].clone())
    }

    /// Deliver the rewards of the in-flight cycle. The first call only
    /// stores them; later calls reinforce the previous cycle's action sets
    /// against `reward + discount * avg_prediction` and run the GA on them.
    /// Every call ends by enforcing the population bound.
    pub fn reward(&mut self, reward: impl Into<Reward>) -> Result<(), XcsError> {
        let rewards = reward.into().resolve(self.action_history.len())?;
        let old_rewards = mem::replace(&mut self.pending_rewards, Some(rewards));
        if let Some(old_rewards) = old_rewards {
            let avg_prediction = if self.action_history.is_empty() {
                0.0
            } else {
                self.prediction_sum / self.action_history.len() as Value
            };
            let ga = GeneticAlgorithm::new(self.possible_actions.len());
            let old_history = mem::take(&mut self.old_action_history);
            for (entry, reward) in old_history.iter().zip(&old_rewards) {
                // Ids that fell to deletion since the decision are dropped;
                // reinforcement touches only classifiers still in the
                // population.
                let action_set: Vec<usize> = entry
                    .action_set
                    .iter()
                    .filter_map(|&id| self.population.position_of(id))
                    .collect();
                let payoff = *reward + self.settings.discount * avg_prediction;
                reinforcement::reinforce(&mut self.population, &action_set, payoff);
                ga.perform_iteration(
                    &mut self.population,
                    &action_set,
                    &entry.situation,
                    self.timestamp,
                    &mut self.rng,
                );
                self.timestamp += 1;
            }
        }
        self.prediction_sum = 0.0;
        self.old_action_history = mem::take(&mut self.action_history);
        self.population
            .delete_excess(self.settings.max_population_size, &mut self.rng);
        Ok(())
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

impl<A: Clone + Serialize> Agent<A> for OnPolicyAgent<A> {
    fn name(&self) -> &'static str {
        "XCS"
    }

    fn get_action(&mut self, sigma: &Situation) -> Result<A, XcsError> {
        OnPolicyAgent::get_action(self, sigma)
    }

    fn reward(&mut self, reward: Reward) -> Result<(), XcsError> {
        OnPolicyAgent::reward(self, reward)
    }

    fn save(&self, path: &Path) -> Result<(), XcsError> {
        OnPolicyAgent::save(self, path)
    }

    fn population(&self) -> &Population {
        &self.population
    }
}
