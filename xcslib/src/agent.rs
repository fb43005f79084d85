//! XCS agents driving the learning loop.
//!
//! Two variants share the decision path: the one-step on-policy agent
//! ([`OnPolicyAgent`]) and the experience-replay agent ([`ReplayAgent`]).

use std::path::Path;

use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::XcsError;
use crate::matching::Matching;
use crate::population::Population;
use crate::selection::{ActionSelection, PredictionArray};
use crate::situation::Situation;
use crate::types::{ActionIndex, Time, Value};

mod onpolicy;
pub use self::onpolicy::OnPolicyAgent;

mod replay;
pub use self::replay::{ReplayAgent, ReplayMemory, Transition};


/// Decay factor pulling the exploration probability towards its floor.
const EXPLORATION_DECAY: Value = 0.99;

/// Shared settings of both agent variants.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct XcsSettings {
    /// Maximum number of distinct classifiers in the population.
    pub max_population_size: usize,
    /// Length of the verdict history in situations and conditions.
    pub history_length: usize,
    /// Exploration probability at construction time.
    #[serde(default = "default_initial_exploration")]
    pub initial_exploration: Value,
    /// Asymptotic lower bound of the exploration probability.
    #[serde(default = "default_exploration_floor")]
    pub exploration_floor: Value,
    /// Discount factor of the bootstrapped payoff target.
    #[serde(default = "default_discount")]
    pub discount: Value,
}

fn default_initial_exploration() -> Value {
    0.25
}

fn default_exploration_floor() -> Value {
    0.1
}

fn default_discount() -> Value {
    0.71
}

impl XcsSettings {
    /// Reject configurations the core cannot run with.
    fn validate(&self, action_count: usize) -> Result<(), XcsError> {
        if action_count == 0 {
            return Err(XcsError::Config("the action set is empty".into()));
        }
        if self.history_length == 0 {
            return Err(XcsError::Config("history length must be positive".into()));
        }
        if self.max_population_size == 0 {
            return Err(XcsError::Config("population bound must be positive".into()));
        }
        Ok(())
    }
}

/// Settings of the experience replay memory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    /// Maximum number of stored transitions.
    #[serde(default = "default_replay_capacity")]
    pub capacity: usize,
    /// Number of transitions sampled per learning pass.
    #[serde(default = "default_replay_batch")]
    pub batch: usize,
    /// Bootstrap from the chosen action's prediction instead of the greedy
    /// maximum.
    #[serde(default)]
    pub on_policy: bool,
}

fn default_replay_capacity() -> usize {
    5000
}

fn default_replay_batch() -> usize {
    2000
}

impl Default for ReplaySettings {
    fn default() -> Self {
        ReplaySettings {
            capacity: default_replay_capacity(),
            batch: default_replay_batch(),
            on_policy: false,
        }
    }
}

/// Settings of the experience-replay agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplayAgentSettings {
    pub xcs: XcsSettings,
    #[serde(default)]
    pub replay: ReplaySettings,
}

/// Agent variant selection with the variant-specific settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AgentSettings {
    OnPolicy(XcsSettings),
    ExperienceReplay(ReplayAgentSettings),
}

impl AgentSettings {
    /// Construct the configured agent variant.
    pub fn build<A>(self, possible_actions: Vec<A>) -> Result<Box<dyn Agent<A>>, XcsError>
    where
        A: Clone + Serialize + DeserializeOwned + 'static,
    {
        match self {
            AgentSettings::OnPolicy(settings) => {
                Ok(Box::new(OnPolicyAgent::new(settings, possible_actions)?))
            }
            AgentSettings::ExperienceReplay(settings) => Ok(Box::new(ReplayAgent::new(
                settings.xcs,
                settings.replay,
                possible_actions,
            )?)),
        }
    }
}

/// Reward signal delivered for one CI cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Reward {
    /// One value broadcast to every in-flight action of the cycle.
    Uniform(Value),
    /// One value per in-flight action, in submission order. Entries beyond
    /// the in-flight history are ignored.
    PerAction(Vec<Value>),
}

impl From<Value> for Reward {
    fn from(value: Value) -> Self {
        Reward::Uniform(value)
    }
}

impl From<Vec<Value>> for Reward {
    fn from(values: Vec<Value>) -> Self {
        Reward::PerAction(values)
    }
}

impl Reward {
    /// Expand into exactly one reward per in-flight action.
    fn resolve(self, count: usize) -> Result<Vec<Value>, XcsError> {
        match self {
            Reward::Uniform(value) => Ok(vec![value; count]),
            Reward::PerAction(values) if values.len() < count => {
                Err(XcsError::RewardShapeMismatch {
                    expected: count,
                    received: values.len(),
                })
            }
            Reward::PerAction(mut values) => {
                values.truncate(count);
                Ok(values)
            }
        }
    }
}

/// Surface the CI harness drives.
pub trait Agent<A> {
    /// Short variant name for logs and summaries.
    fn name(&self) -> &'static str;

    /// Present a situation, receive the chosen action.
    fn get_action(&mut self, sigma: &Situation) -> Result<A, XcsError>;

    /// Deliver the rewards for the last cycle's actions.
    fn reward(&mut self, reward: Reward) -> Result<(), XcsError>;

    /// Persist the whole agent state to a file.
    fn save(&self, path: &Path) -> Result<(), XcsError>;

    /// The current classifier population.
    fn population(&self) -> &Population;
}

/// Outcome of one decision step.
struct Decision {
    array: PredictionArray,
    action: ActionIndex,
    action_set: Vec<usize>,
}

/// The decision path both agents share: match (covering included), decay the
/// exploration probability, build the prediction array, choose an action and
/// derive its action set.
fn decide(
    population: &mut Population,
    settings: &XcsSettings,
    action_count: usize,
    exploration: &mut Value,
    train_mode: bool,
    sigma: &Situation,
    timestamp: Time,
    rng: &mut StdRng,
) -> Result<Decision, XcsError> {
    debug_assert_eq!(sigma.previous_results.len(), settings.history_length);
    let matching = Matching::new(action_count, action_count);
    let match_set = matching.get_match_set(population, sigma, timestamp, rng)?;
    *exploration = (*exploration - settings.exploration_floor) * EXPLORATION_DECAY
        + settings.exploration_floor;
    let selector = ActionSelection::new(action_count, *exploration);
    let array = selector.get_prediction_array(population, &match_set);
    let action = selector.select_action(&array, train_mode, rng);
    let action_set = selector.get_action_set(population, &match_set, action);
    Ok(Decision {
        array,
        action,
        action_set,
    })
}
