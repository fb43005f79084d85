//! Match set construction and covering.

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::classifier::{Classifier, Interval, ResultCondition};
use crate::error::XcsError;
use crate::population::Population;
use crate::situation::Situation;
use crate::types::{ActionIndex, ClassifierId, Time, Value};

/// Builds match sets for situations, synthesizing covering classifiers when
/// the match set does not span enough distinct actions.
pub struct Matching {
    /// Minimum number of distinct actions required in a match set.
    theta_mna: usize,
    /// Total number of actions available to the agent.
    action_count: usize,
}

impl Matching {
    /// Maximum half-width drawn for a covering interval over `last_execution`.
    pub const MAX_PAST: Value = 0.5;
    /// Maximum half-width drawn for a covering interval over `duration`.
    pub const MAX_DURATION: Value = 0.5;
    /// Probability that a covering condition generalizes a history entry.
    pub const P_DONT_CARE: f64 = 0.33;
    /// Covering rounds before matching is considered divergent.
    const MAX_ROUNDS: usize = 10;

    /// `theta_mna` is clamped to the number of actions; more distinct actions
    /// than exist can never be covered.
    pub fn new(theta_mna: usize, action_count: usize) -> Self {
        Matching {
            theta_mna: theta_mna.min(action_count),
            action_count,
        }
    }

    /// Collect the indices of all classifiers matching `sigma`, covering
    /// missing actions until the set spans at least `theta_mna` of them.
    /// Covering appends to the population; the caller enforces the population
    /// bound at the end of the reward cycle.
    pub fn get_match_set(
        &self,
        population: &mut Population,
        sigma: &Situation,
        timestamp: Time,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, XcsError> {
        for _ in 0..Self::MAX_ROUNDS {
            let match_set = population
                .iter()
                .enumerate()
                .filter(|(_, c)| c.matches(sigma))
                .map(|(i, _)| i)
                .collect_vec();
            let mut present = match_set
                .iter()
                .map(|&i| population.get(i).action)
                .unique()
                .collect_vec();

            if present.len() >= self.theta_mna {
                return Ok(match_set);
            }

            for _ in 0..(self.theta_mna - present.len()) {
                let missing = (0..self.action_count)
                    .filter(|action| !present.contains(action))
                    .collect_vec();
                let id = population.mint_id();
                let classifier =
                    self.generate_covering_classifier(id, sigma, &missing, timestamp, rng);
                debug_assert!(classifier.matches(sigma));
                present.push(classifier.action);
                population.push(classifier);
            }
        }
        Err(XcsError::CoveringDivergence {
            rounds: Self::MAX_ROUNDS,
        })
    }

    /// Synthesize a classifier for one of the `missing` actions, tailored to
    /// match `sigma` by construction: interval conditions straddle the
    /// observed values and history conditions either copy the observed
    /// verdict or generalize to don't-care.
    pub fn generate_covering_classifier(
        &self,
        id: ClassifierId,
        sigma: &Situation,
        missing: &[ActionIndex],
        timestamp: Time,
        rng: &mut StdRng,
    ) -> Classifier {
        let action = *missing.choose(rng).unwrap();
        let duration = Interval(
            sigma.duration - rng.gen::<Value>() * Self::MAX_DURATION,
            sigma.duration + rng.gen::<Value>() * Self::MAX_DURATION,
        );
        let last_execution = Interval(
            sigma.last_execution - rng.gen::<Value>() * Self::MAX_PAST,
            sigma.last_execution + rng.gen::<Value>() * Self::MAX_PAST,
        );
        let previous_results = sigma
            .previous_results
            .iter()
            .map(|&outcome| {
                if rng.gen::<f64>() < Self::P_DONT_CARE {
                    ResultCondition::DontCare
                } else {
                    outcome.into()
                }
            })
            .collect();
        Classifier::new(id, previous_results, last_execution, duration, action, timestamp)
    }
}
