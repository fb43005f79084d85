//! Prediction arrays and epsilon-greedy action selection.

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::population::Population;
use crate::types::{ActionIndex, Value};

/// Fitness-weighted mean predictions of the actions present in a match set.
#[derive(Debug)]
pub struct PredictionArray {
    /// Accumulated `(fitness * prediction, fitness)` per action; `None` for
    /// actions absent from the match set.
    slots: Vec<Option<(Value, Value)>>,
    /// Present actions in first-seen order.
    order: Vec<ActionIndex>,
}

impl PredictionArray {
    fn new(action_count: usize) -> Self {
        PredictionArray {
            slots: vec![None; action_count],
            order: Vec::new(),
        }
    }

    fn accumulate(&mut self, action: ActionIndex, fitness: Value, prediction: Value) {
        match &mut self.slots[action] {
            Some((weighted, total)) => {
                *weighted += fitness * prediction;
                *total += fitness;
            }
            slot @ None => {
                *slot = Some((fitness * prediction, fitness));
                self.order.push(action);
            }
        }
    }

    /// Actions present in the match set, in first-seen order.
    pub fn actions(&self) -> &[ActionIndex] {
        &self.order
    }

    /// Mean prediction of an action. `None` when the action is absent or its
    /// total fitness is zero; such entries must not win a greedy comparison.
    pub fn value(&self, action: ActionIndex) -> Option<Value> {
        let (weighted, total) = self.slots[action]?;
        (total > 0.0).then(|| weighted / total)
    }

    /// Greedy argmax over the defined entries, first-seen order breaking
    /// ties. `None` when every present action is undefined.
    pub fn best_action(&self) -> Option<ActionIndex> {
        let mut best: Option<(ActionIndex, Value)> = None;
        for &action in &self.order {
            let Some(value) = self.value(action) else {
                continue;
            };
            match best {
                Some((_, incumbent)) if value <= incumbent => {}
                _ => best = Some((action, value)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// Largest defined mean prediction, if any.
    pub fn best_value(&self) -> Option<Value> {
        self.order
            .iter()
            .filter_map(|&action| self.value(action))
            .max_by_key(|&value| OrderedFloat(value))
    }
}

/// Epsilon-greedy selection over a prediction array.
pub struct ActionSelection {
    action_count: usize,
    exploration: Value,
}

impl ActionSelection {
    pub fn new(action_count: usize, exploration: Value) -> Self {
        ActionSelection {
            action_count,
            exploration,
        }
    }

    /// Compute the fitness-weighted prediction array of a match set.
    pub fn get_prediction_array(
        &self,
        population: &Population,
        match_set: &[usize],
    ) -> PredictionArray {
        let mut array = PredictionArray::new(self.action_count);
        for &index in match_set {
            let classifier = population.get(index);
            array.accumulate(classifier.action, classifier.fitness, classifier.prediction);
        }
        array
    }

    /// Choose an action: explore uniformly over the present actions with the
    /// configured probability (training only), otherwise pick greedily. A
    /// niche where no action has positive fitness falls back to a uniform
    /// choice over the present actions.
    pub fn select_action(
        &self,
        array: &PredictionArray,
        train_mode: bool,
        rng: &mut StdRng,
    ) -> ActionIndex {
        let actions = array.actions();
        if train_mode && rng.gen::<Value>() < self.exploration {
            return *actions.choose(rng).unwrap();
        }
        match array.best_action() {
            Some(action) => action,
            None => {
                log::debug!("no niche carries fitness, selecting uniformly");
                *actions.choose(rng).unwrap()
            }
        }
    }

    /// The members of the match set advocating the given action.
    pub fn get_action_set(
        &self,
        population: &Population,
        match_set: &[usize],
        action: ActionIndex,
    ) -> Vec<usize> {
        match_set
            .iter()
            .copied()
            .filter(|&i| population.get(i).action == action)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, Interval, ResultCondition};
    use crate::create_rng;

    fn classifier_with(action: ActionIndex, fitness: Value, prediction: Value) -> Classifier {
        let mut classifier = Classifier::new(
            0,
            vec![ResultCondition::DontCare],
            Interval(0.0, 3.0),
            Interval(42.0, 45.0),
            action,
            42,
        );
        classifier.fitness = fitness;
        classifier.prediction = prediction;
        classifier
    }

    fn population_of(classifiers: Vec<Classifier>) -> (Population, Vec<usize>) {
        let mut population = Population::new();
        let indices = (0..classifiers.len()).collect();
        for mut classifier in classifiers {
            classifier.id = population.mint_id();
            population.push(classifier);
        }
        (population, indices)
    }

    #[test]
    fn weighted_prediction_array() {
        let (population, match_set) = population_of(vec![
            classifier_with(0, 10.0, 5.0),
            classifier_with(0, 3.0, 4.0),
            classifier_with(1, 7.0, 2.0),
        ]);
        let selector = ActionSelection::new(2, 0.0);
        let array = selector.get_prediction_array(&population, &match_set);
        assert_eq!(array.value(0), Some(62.0 / 13.0));
        assert_eq!(array.value(1), Some(2.0));
    }

    #[test]
    fn greedy_selection_takes_largest_prediction() {
        let (population, match_set) = population_of(vec![
            classifier_with(0, 1.0, 100.0),
            classifier_with(1, 1.0, 10.0),
        ]);
        let selector = ActionSelection::new(2, 0.0);
        let array = selector.get_prediction_array(&population, &match_set);
        let mut rng = create_rng();
        assert_eq!(selector.select_action(&array, true, &mut rng), 0);
    }

    #[test]
    fn zero_fitness_niche_is_skipped_by_greedy_argmax() {
        let (population, match_set) = population_of(vec![
            classifier_with(0, 0.0, 1000.0),
            classifier_with(1, 1.0, 1.0),
        ]);
        let selector = ActionSelection::new(2, 0.0);
        let array = selector.get_prediction_array(&population, &match_set);
        assert_eq!(array.value(0), None);
        assert_eq!(array.best_action(), Some(1));
    }

    #[test]
    fn all_zero_fitness_falls_back_to_present_actions() {
        let (population, match_set) = population_of(vec![
            classifier_with(0, 0.0, 5.0),
            classifier_with(1, 0.0, 7.0),
        ]);
        let selector = ActionSelection::new(3, 0.0);
        let array = selector.get_prediction_array(&population, &match_set);
        assert_eq!(array.best_action(), None);
        let mut rng = create_rng();
        let action = selector.select_action(&array, true, &mut rng);
        assert!(array.actions().contains(&action));
    }

    #[test]
    fn action_set_filters_by_action() {
        let (population, match_set) = population_of(vec![
            classifier_with(0, 1.0, 1.0),
            classifier_with(1, 1.0, 1.0),
            classifier_with(0, 2.0, 2.0),
        ]);
        let selector = ActionSelection::new(2, 0.0);
        let action_set = selector.get_action_set(&population, &match_set, 0);
        assert_eq!(action_set, vec![0, 2]);
    }

    #[test]
    fn best_value_is_maximum_defined_entry() {
        let (population, match_set) = population_of(vec![
            classifier_with(0, 2.0, 3.0),
            classifier_with(1, 0.0, 90.0),
            classifier_with(2, 1.0, 8.0),
        ]);
        let selector = ActionSelection::new(3, 0.0);
        let array = selector.get_prediction_array(&population, &match_set);
        assert_eq!(array.best_value(), Some(8.0));
    }
}
