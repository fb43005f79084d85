//! Condition-action rules and their learned statistics.

use serde::{Deserialize, Serialize};

use crate::situation::{Situation, TestOutcome};
use crate::types::{ActionIndex, ClassifierId, Time, Value};

/// Ternary condition over a single entry of the verdict history.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCondition {
    Passed,
    Failed,
    DontCare,
}

impl ResultCondition {
    /// Whether the condition accepts the given verdict.
    pub fn accepts(self, outcome: TestOutcome) -> bool {
        match self {
            ResultCondition::Passed => outcome == TestOutcome::Passed,
            ResultCondition::Failed => outcome == TestOutcome::Failed,
            ResultCondition::DontCare => true,
        }
    }
}

impl From<TestOutcome> for ResultCondition {
    fn from(outcome: TestOutcome) -> Self {
        match outcome {
            TestOutcome::Passed => ResultCondition::Passed,
            TestOutcome::Failed => ResultCondition::Failed,
        }
    }
}

/// Interval condition over a continuous attribute, stored as `(lo, hi)`.
///
/// There is no `lo <= hi` invariant: arithmetic crossover can invert the
/// bounds, and an inverted interval contains no value at all. The classifier
/// stays dormant until mutation resamples the bounds around a situation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Interval(pub Value, pub Value);

impl Interval {
    /// Inclusive containment. Always false when the bounds are inverted.
    pub fn contains(&self, x: Value) -> bool {
        self.0 <= x && x <= self.1
    }

    /// Arithmetic crossover of two intervals with mixing coefficient `mix`,
    /// elementwise over the bounds. Returns the pair of blended intervals.
    pub fn blend(a: &Interval, b: &Interval, mix: Value) -> (Interval, Interval) {
        (
            Interval(mix * a.0 + (1.0 - mix) * b.0, mix * a.1 + (1.0 - mix) * b.1),
            Interval((1.0 - mix) * a.0 + mix * b.0, (1.0 - mix) * a.1 + mix * b.1),
        )
    }
}

/// A condition-action rule together with its learned statistics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Classifier {
    /// Stable identity within the owning population. Retained action sets
    /// refer to classifiers by id so they survive index churn from deletion.
    pub id: ClassifierId,
    /// Ternary conditions over the recent verdict history.
    pub previous_results: Vec<ResultCondition>,
    /// Interval condition over the time since the last execution.
    pub last_execution: Interval,
    /// Interval condition over the expected duration.
    pub duration: Interval,
    /// Action advocated by this rule.
    pub action: ActionIndex,
    /// Time of the last GA involvement.
    pub timestamp: Time,
    /// Estimated payoff.
    pub prediction: Value,
    /// Estimated absolute prediction error.
    pub epsilon: Value,
    /// Accuracy share relative to the rest of the niche.
    pub fitness: Value,
    /// Number of reinforcement updates this rule received.
    pub experience: u32,
    /// Estimated size of the action sets this rule participates in.
    pub action_set_size: Value,
    /// Number of identical copies collapsed into this record.
    pub numerosity: u32,
}

impl Classifier {
    /// Experience above which an under-performing rule attracts extra
    /// deletion pressure.
    pub const THETA_DEL: u32 = 20;
    /// Fraction of the mean population fitness below which the deletion vote
    /// is inflated.
    pub const DELTA: Value = 0.1;

    /// New classifier with default learned statistics.
    pub fn new(
        id: ClassifierId,
        previous_results: Vec<ResultCondition>,
        last_execution: Interval,
        duration: Interval,
        action: ActionIndex,
        timestamp: Time,
    ) -> Self {
        Classifier {
            id,
            previous_results,
            last_execution,
            duration,
            action,
            timestamp,
            prediction: 0.0,
            epsilon: 0.0,
            fitness: 0.0,
            experience: 0,
            action_set_size: 1.0,
            numerosity: 1,
        }
    }

    /// Whether the rule's conditions accept the situation.
    pub fn matches(&self, sigma: &Situation) -> bool {
        if !self.duration.contains(sigma.duration) {
            return false;
        }
        for (condition, outcome) in self.previous_results.iter().zip(&sigma.previous_results) {
            if !condition.accepts(*outcome) {
                return false;
            }
        }
        self.last_execution.contains(sigma.last_execution)
    }

    /// Deletion vote of this rule given the mean fitness of the population.
    /// Experienced rules whose per-copy fitness falls below `DELTA` times the
    /// mean receive an inflated vote.
    pub fn deletion_vote(&self, avg_fitness: Value) -> Value {
        let vote = self.action_set_size * self.numerosity as Value;
        let relative_fitness = self.fitness / self.numerosity as Value;
        if self.experience > Self::THETA_DEL && relative_fitness < Self::DELTA * avg_fitness {
            vote * avg_fitness / relative_fitness
        } else {
            vote
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::situation::TestOutcome::{Failed, Passed};

    fn example_classifier() -> Classifier {
        Classifier::new(
            0,
            vec![
                ResultCondition::DontCare,
                ResultCondition::Passed,
                ResultCondition::Failed,
            ],
            Interval(0.0, 3.0),
            Interval(42.0, 45.0),
            0,
            42,
        )
    }

    fn example_situation() -> Situation {
        Situation {
            previous_results: vec![Passed, Passed, Failed],
            last_execution: 2.0,
            duration: 43.0,
        }
    }

    #[test]
    fn matches_accepting_situation() {
        let classifier = example_classifier();
        assert!(classifier.matches(&example_situation()));
    }

    #[test]
    fn rejects_on_every_condition_kind() {
        let classifier = example_classifier();

        let mut sigma = example_situation();
        sigma.duration = 47.0;
        assert!(!classifier.matches(&sigma));

        let mut sigma = example_situation();
        sigma.previous_results = vec![Passed, Passed, Passed];
        assert!(!classifier.matches(&sigma));

        let mut sigma = example_situation();
        sigma.last_execution = 42.0;
        assert!(!classifier.matches(&sigma));
    }

    #[test]
    fn inverted_interval_never_contains() {
        let interval = Interval(3.0, 0.0);
        assert!(!interval.contains(0.0));
        assert!(!interval.contains(1.5));
        assert!(!interval.contains(3.0));
    }

    #[test]
    fn deletion_vote_inflates_weak_experienced_rules() {
        let mut classifier = example_classifier();
        classifier.fitness = 10.0;
        classifier.action_set_size = 10.0;
        classifier.experience = 100;
        classifier.numerosity = 2;
        assert_eq!(classifier.deletion_vote(100.0), 400.0);
    }

    #[test]
    fn deletion_vote_base_case() {
        let mut classifier = example_classifier();
        classifier.fitness = 50.0;
        classifier.action_set_size = 4.0;
        classifier.experience = 100;
        classifier.numerosity = 2;
        // Per-copy fitness 25 is above 0.1 * 100, no inflation.
        assert_eq!(classifier.deletion_vote(100.0), 8.0);
    }
}
