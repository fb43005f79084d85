//! Niche genetic algorithm discovering new classifiers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::classifier::{Classifier, Interval, ResultCondition};
use crate::matching::Matching;
use crate::population::Population;
use crate::situation::Situation;
use crate::types::{Time, Value};

/// Genetic discovery over action sets: roulette parent selection, two-point
/// ternary crossover plus arithmetic interval crossover, and niche mutation
/// that keeps the offspring matching the current situation.
pub struct GeneticAlgorithm {
    action_count: usize,
}

impl GeneticAlgorithm {
    /// Minimum mean time since the last GA involvement of an action set
    /// before another iteration runs on it.
    pub const THETA_GA: Value = 25.0;
    /// Crossover probability.
    pub const CHI: f64 = 0.75;
    /// Mixing coefficient of the arithmetic interval crossover.
    pub const CROSSOVER_MIX: Value = 0.6;
    /// Per-site mutation probability.
    pub const MU: f64 = 0.025;

    pub fn new(action_count: usize) -> Self {
        GeneticAlgorithm { action_count }
    }

    /// Run one GA iteration on the action set if its numerosity-weighted mean
    /// timestamp is old enough. Two offspring are cloned from roulette-chosen
    /// parents, crossed over with probability [`Self::CHI`], fitness-damped,
    /// mutated against `sigma` and appended to the population. Deletion is
    /// left to the reward cycle.
    pub fn perform_iteration(
        &self,
        population: &mut Population,
        action_set: &[usize],
        sigma: &Situation,
        timestamp: Time,
        rng: &mut StdRng,
    ) {
        if action_set.is_empty() {
            // Every retained member of the set has been deleted.
            return;
        }
        let set_numerosity: Value = action_set
            .iter()
            .map(|&i| population.get(i).numerosity as Value)
            .sum();
        let weighted_timestamps: Value = action_set
            .iter()
            .map(|&i| {
                let classifier = population.get(i);
                classifier.numerosity as Value * classifier.timestamp as Value
            })
            .sum();
        if timestamp as Value - weighted_timestamps / set_numerosity <= Self::THETA_GA {
            return;
        }

        for &index in action_set {
            population.get_mut(index).timestamp = timestamp;
        }

        let first_parent = self.select_offspring(population, action_set, rng);
        let second_parent = self.select_offspring(population, action_set, rng);
        let mut first_child = population.get(first_parent).clone();
        let mut second_child = population.get(second_parent).clone();
        first_child.id = population.mint_id();
        second_child.id = population.mint_id();
        first_child.numerosity = 1;
        second_child.numerosity = 1;
        first_child.experience = 0;
        second_child.experience = 0;

        if rng.gen::<f64>() < Self::CHI {
            self.apply_crossover(&mut first_child, &mut second_child, rng);
            let parent_prediction =
                (population.get(first_parent).prediction + population.get(second_parent).prediction) / 2.0;
            let parent_epsilon =
                (population.get(first_parent).epsilon + population.get(second_parent).epsilon) / 2.0;
            let parent_fitness =
                (population.get(first_parent).fitness + population.get(second_parent).fitness) / 2.0;
            first_child.prediction = parent_prediction;
            second_child.prediction = parent_prediction;
            first_child.epsilon = parent_epsilon;
            second_child.epsilon = parent_epsilon;
            first_child.fitness = parent_fitness;
            second_child.fitness = parent_fitness;
        }
        first_child.fitness *= 0.1;
        second_child.fitness *= 0.1;

        self.mutate(&mut first_child, sigma, rng);
        self.mutate(&mut second_child, sigma, rng);

        population.push(first_child);
        population.push(second_child);
    }

    /// Roulette-wheel selection on fitness over the action set. A set with no
    /// fitness at all yields a uniform random member.
    fn select_offspring(
        &self,
        population: &Population,
        action_set: &[usize],
        rng: &mut StdRng,
    ) -> usize {
        let fitness_total: Value = action_set.iter().map(|&i| population.get(i).fitness).sum();
        if fitness_total <= 0.0 {
            return *action_set.choose(rng).unwrap();
        }
        let choice_point = rng.gen::<Value>() * fitness_total;
        let mut acc = 0.0;
        for &index in action_set {
            acc += population.get(index).fitness;
            if acc >= choice_point {
                return index;
            }
        }
        *action_set.last().unwrap()
    }

    /// Two-point crossover over the ternary conditions, swapping the
    /// half-open index range `[y, x)`, followed by arithmetic crossover of
    /// both interval conditions.
    fn apply_crossover(
        &self,
        first: &mut Classifier,
        second: &mut Classifier,
        rng: &mut StdRng,
    ) {
        let length = first.previous_results.len();
        let mut x = (rng.gen::<f64>() * length as f64) as usize;
        let mut y = (rng.gen::<f64>() * length as f64) as usize;
        if y > x {
            std::mem::swap(&mut x, &mut y);
        }
        for i in y..x {
            std::mem::swap(&mut first.previous_results[i], &mut second.previous_results[i]);
        }

        let (a, b) = Interval::blend(
            &first.last_execution,
            &second.last_execution,
            Self::CROSSOVER_MIX,
        );
        first.last_execution = a;
        second.last_execution = b;
        let (a, b) = Interval::blend(&first.duration, &second.duration, Self::CROSSOVER_MIX);
        first.duration = a;
        second.duration = b;
    }

    /// Mutate the classifier in place against the current situation. Ternary
    /// sites toggle between don't-care and the observed verdict, interval
    /// conditions are resampled around the observed values, and the action is
    /// reassigned uniformly. Every outcome keeps the classifier matching
    /// `sigma`.
    pub fn mutate(&self, classifier: &mut Classifier, sigma: &Situation, rng: &mut StdRng) {
        for (condition, &outcome) in classifier
            .previous_results
            .iter_mut()
            .zip(&sigma.previous_results)
        {
            if rng.gen::<f64>() < Self::MU {
                *condition = if *condition == ResultCondition::DontCare {
                    outcome.into()
                } else {
                    ResultCondition::DontCare
                };
            }
        }
        if rng.gen::<f64>() < Self::MU {
            classifier.last_execution = Interval(
                sigma.last_execution - rng.gen::<Value>() * Matching::MAX_PAST,
                sigma.last_execution + rng.gen::<Value>() * Matching::MAX_PAST,
            );
        }
        if rng.gen::<f64>() < Self::MU {
            classifier.duration = Interval(
                sigma.duration - rng.gen::<Value>() * Matching::MAX_DURATION,
                sigma.duration + rng.gen::<Value>() * Matching::MAX_DURATION,
            );
        }
        if rng.gen::<f64>() < Self::MU {
            classifier.action = rng.gen_range(0..self.action_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_rng;
    use crate::situation::TestOutcome::{Failed, Passed};
    use crate::types::ClassifierId;

    fn assert_close(a: Value, b: Value) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    fn example_situation() -> Situation {
        Situation {
            previous_results: vec![Passed, Passed, Failed],
            last_execution: 2.0,
            duration: 43.0,
        }
    }

    fn stub_classifier(id: ClassifierId, fitness: Value) -> Classifier {
        let mut classifier = Classifier::new(
            id,
            vec![
                ResultCondition::DontCare,
                ResultCondition::Passed,
                ResultCondition::Failed,
            ],
            Interval(0.0, 3.0),
            Interval(42.0, 45.0),
            0,
            42,
        );
        classifier.fitness = fitness;
        classifier
    }

    #[test]
    fn interval_crossover_blends_bounds() {
        let ga = GeneticAlgorithm::new(2);
        let mut first = stub_classifier(0, 10.0);
        let mut second = stub_classifier(1, 20.0);
        second.previous_results = vec![
            ResultCondition::Passed,
            ResultCondition::Failed,
            ResultCondition::DontCare,
        ];
        second.last_execution = Interval(2.0, 5.0);
        second.duration = Interval(12.0, 40.0);

        let mut rng = create_rng();
        ga.apply_crossover(&mut first, &mut second, &mut rng);

        assert_close(first.last_execution.0, 0.8);
        assert_close(first.last_execution.1, 3.8);
        assert_close(second.last_execution.0, 1.2);
        assert_close(second.last_execution.1, 4.2);
        assert_close(first.duration.0, 30.0);
        assert_close(first.duration.1, 43.0);
        assert_close(second.duration.0, 24.0);
        assert_close(second.duration.1, 42.0);
    }

    #[test]
    fn roulette_returns_member_of_the_set() {
        let mut population = Population::new();
        population.push(stub_classifier(0, 10.0));
        population.push(stub_classifier(1, 20.0));
        let ga = GeneticAlgorithm::new(2);
        let mut rng = create_rng();
        for _ in 0..20 {
            let chosen = ga.select_offspring(&population, &[0, 1], &mut rng);
            assert!(chosen == 0 || chosen == 1);
        }
    }

    #[test]
    fn roulette_with_zero_fitness_is_uniform() {
        let mut population = Population::new();
        population.push(stub_classifier(0, 0.0));
        population.push(stub_classifier(1, 0.0));
        let ga = GeneticAlgorithm::new(2);
        let mut rng = create_rng();
        let chosen = ga.select_offspring(&population, &[0, 1], &mut rng);
        assert!(chosen == 0 || chosen == 1);
    }

    #[test]
    fn mutation_preserves_matching() {
        let ga = GeneticAlgorithm::new(2);
        let sigma = example_situation();
        let mut rng = create_rng();
        let matching = Matching::new(2, 2);
        let mut classifier = matching.generate_covering_classifier(0, &sigma, &[0], 1, &mut rng);
        for _ in 0..500 {
            ga.mutate(&mut classifier, &sigma, &mut rng);
            assert!(classifier.matches(&sigma));
        }
    }

    #[test]
    fn iteration_respects_the_time_gate() {
        let mut population = Population::new();
        population.push(stub_classifier(0, 10.0));
        population.push(stub_classifier(1, 20.0));
        let ga = GeneticAlgorithm::new(2);
        let mut rng = create_rng();

        // Mean timestamp 42, so nothing happens until 42 + THETA_GA passes.
        ga.perform_iteration(&mut population, &[0, 1], &example_situation(), 50, &mut rng);
        assert_eq!(population.len(), 2);
    }

    #[test]
    fn iteration_appends_two_reset_children() {
        let mut population = Population::new();
        let mut parent = stub_classifier(0, 10.0);
        parent.numerosity = 4;
        parent.experience = 33;
        population.push(parent);
        population.push(stub_classifier(1, 20.0));
        let ga = GeneticAlgorithm::new(2);
        let mut rng = create_rng();

        ga.perform_iteration(&mut population, &[0, 1], &example_situation(), 100, &mut rng);

        assert_eq!(population.len(), 4);
        for index in [2, 3] {
            let child = population.get(index);
            assert_eq!(child.numerosity, 1);
            assert_eq!(child.experience, 0);
            assert!(child.fitness <= 2.0 + 1e-12);
        }
        // The whole set was stamped with the current time.
        assert_eq!(population.get(0).timestamp, 100);
        assert_eq!(population.get(1).timestamp, 100);
    }

    #[test]
    fn empty_action_set_is_a_no_op() {
        let mut population = Population::new();
        population.push(stub_classifier(0, 10.0));
        let ga = GeneticAlgorithm::new(2);
        let mut rng = create_rng();
        ga.perform_iteration(&mut population, &[], &example_situation(), 100, &mut rng);
        assert_eq!(population.len(), 1);
    }
}
