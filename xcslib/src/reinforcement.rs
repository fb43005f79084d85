//! Temporal-difference reinforcement of action sets.

use crate::population::Population;
use crate::types::Value;

/// Learning rate once a classifier has seen at least `1 / BETA` updates.
pub const BETA: Value = 0.1;
/// Accuracy falloff factor for inaccurate classifiers.
pub const ALPHA: Value = 0.1;
/// Accuracy falloff exponent.
pub const NU: i32 = 5;
/// Error threshold below which a classifier counts as fully accurate.
pub const EPSILON_0: Value = 0.01;

/// MAM schedule: average over the first `1 / BETA` updates, then a constant
/// learning rate.
fn learning_rate(experience: u32) -> Value {
    if (experience as Value) < 1.0 / BETA {
        1.0 / experience as Value
    } else {
        BETA
    }
}

/// Update prediction, prediction error and action-set-size estimate of every
/// classifier in the action set towards the discounted payoff, then refresh
/// the fitness of the whole set.
///
/// The error update reads the already-updated prediction.
pub fn reinforce(population: &mut Population, action_set: &[usize], payoff: Value) {
    let set_numerosity: Value = action_set
        .iter()
        .map(|&i| population.get(i).numerosity as Value)
        .sum();
    for &index in action_set {
        let classifier = population.get_mut(index);
        classifier.experience += 1;
        let rate = learning_rate(classifier.experience);
        classifier.prediction += rate * (payoff - classifier.prediction);
        let absolute_error = (payoff - classifier.prediction).abs();
        classifier.epsilon += rate * (absolute_error - classifier.epsilon);
        classifier.action_set_size += rate * (set_numerosity - classifier.action_set_size);
    }
    update_fitness(population, action_set);
}

/// Move each classifier's fitness towards its share of the set's
/// numerosity-weighted accuracy.
pub fn update_fitness(population: &mut Population, action_set: &[usize]) {
    let mut accuracies = Vec::with_capacity(action_set.len());
    let mut accuracy_sum = 0.0;
    for &index in action_set {
        let classifier = population.get(index);
        let accuracy = if classifier.epsilon < EPSILON_0 {
            1.0
        } else {
            ALPHA * (classifier.epsilon / EPSILON_0).powi(-NU)
        };
        accuracy_sum += accuracy * classifier.numerosity as Value;
        accuracies.push(accuracy);
    }
    if accuracy_sum <= 0.0 {
        return;
    }
    for (&index, accuracy) in action_set.iter().zip(accuracies) {
        let classifier = population.get_mut(index);
        classifier.fitness +=
            BETA * (accuracy * classifier.numerosity as Value / accuracy_sum - classifier.fitness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, Interval, ResultCondition};

    fn assert_close(a: Value, b: Value) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    fn seasoned_classifier(experience: u32) -> Classifier {
        let mut classifier = Classifier::new(
            0,
            vec![ResultCondition::DontCare],
            Interval(0.0, 3.0),
            Interval(42.0, 45.0),
            0,
            42,
        );
        classifier.experience = experience;
        classifier.prediction = 5.0;
        classifier.epsilon = 3.0;
        classifier.numerosity = 12;
        classifier.action_set_size = 7.0;
        classifier
    }

    #[test]
    fn reinforce_small_experience_averages() {
        let mut population = Population::new();
        population.push(seasoned_classifier(2));

        reinforce(&mut population, &[0], 10.0);

        let classifier = population.get(0);
        assert_eq!(classifier.experience, 3);
        assert_close(classifier.prediction, 5.0 + 5.0 / 3.0);
        let absolute_error = (10.0 - classifier.prediction).abs();
        assert_close(classifier.epsilon, 3.0 + (absolute_error - 3.0) / 3.0);
        assert_close(classifier.action_set_size, 7.0 + 5.0 / 3.0);
    }

    #[test]
    fn reinforce_large_experience_uses_beta() {
        let mut population = Population::new();
        population.push(seasoned_classifier(999));
        let mut copy = seasoned_classifier(999);
        copy.id = 1;
        population.push(copy);

        reinforce(&mut population, &[0, 1], 10.0);

        let classifier = population.get(0);
        assert_eq!(classifier.experience, 1000);
        assert_close(classifier.prediction, 5.5);
        assert_close(classifier.epsilon, 3.0 + 0.1 * ((10.0f64 - 5.5).abs() - 3.0));
        // Both copies carry numerosity 12, so the set numerosity is 24.
        assert_close(classifier.action_set_size, 7.0 + 0.1 * (24.0 - 7.0));
    }

    #[test]
    fn fitness_shares_accuracy_by_numerosity() {
        let mut population = Population::new();
        let mut accurate = seasoned_classifier(10);
        accurate.fitness = 7.0;
        accurate.epsilon = 0.005;
        accurate.numerosity = 1;
        population.push(accurate);
        let mut sloppy = seasoned_classifier(10);
        sloppy.id = 1;
        sloppy.fitness = 11.0;
        sloppy.epsilon = 0.02;
        sloppy.numerosity = 2;
        population.push(sloppy);

        update_fitness(&mut population, &[0, 1]);

        // Accuracies: 1 (below threshold) and 0.1 * 2^-5 = 0.003125.
        let accuracy_sum = 1.0 + 0.003125 * 2.0;
        assert_close(
            population.get(0).fitness,
            7.0 + 0.1 * (1.0 / accuracy_sum - 7.0),
        );
        assert_close(
            population.get(1).fitness,
            11.0 + 0.1 * (0.003125 * 2.0 / accuracy_sum - 11.0),
        );
    }

    #[test]
    fn prediction_converges_to_stationary_reward() {
        let mut population = Population::new();
        // Deep into the constant-rate regime of the MAM schedule.
        let mut classifier = seasoned_classifier(999);
        classifier.prediction = 0.0;
        classifier.epsilon = 0.0;
        classifier.numerosity = 1;
        population.push(classifier);

        let reward = 42.0;
        let mut previous_gap = Value::INFINITY;
        for _ in 0..200 {
            reinforce(&mut population, &[0], reward);
            let gap = (population.get(0).prediction - reward).abs();
            assert!(gap <= previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-6);
        assert!(population.get(0).epsilon >= 0.0);
        assert!(population.get(0).fitness >= 0.0);
    }

    #[test]
    fn empty_action_set_is_a_no_op() {
        let mut population = Population::new();
        population.push(seasoned_classifier(5));
        reinforce(&mut population, &[], 10.0);
        assert_eq!(population.get(0).experience, 5);
    }
}
