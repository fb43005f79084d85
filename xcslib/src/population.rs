//! The classifier population and its deletion pressure.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::types::{ClassifierId, Value};

/// Bounded multiset of classifiers owned by an agent.
///
/// The population also mints the stable ids that retained action sets use to
/// find their classifiers again after deletions have shuffled the indices.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Population {
    classifiers: Vec<Classifier>,
    next_id: ClassifierId,
}

impl Population {
    pub fn new() -> Self {
        Population::default()
    }

    /// Number of distinct classifier records, not total numerosity.
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Classifier> {
        self.classifiers.iter()
    }

    pub fn get(&self, index: usize) -> &Classifier {
        &self.classifiers[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Classifier {
        &mut self.classifiers[index]
    }

    /// Reserve a fresh classifier id.
    pub fn mint_id(&mut self) -> ClassifierId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, classifier: Classifier) {
        self.classifiers.push(classifier);
    }

    /// Current index of the classifier with the given id, if it still exists.
    pub fn position_of(&self, id: ClassifierId) -> Option<usize> {
        self.classifiers.iter().position(|c| c.id == id)
    }

    /// Sum of numerosities over all records.
    pub fn total_numerosity(&self) -> u64 {
        self.classifiers.iter().map(|c| c.numerosity as u64).sum()
    }

    /// Sum of fitness over all records.
    pub fn total_fitness(&self) -> Value {
        self.classifiers.iter().map(|c| c.fitness).sum()
    }

    /// Roulette-wheel deletion over deletion votes until at most `max_size`
    /// distinct records remain. Each spin removes one copy: the hit record
    /// loses one numerosity, or the whole record when it is down to one.
    pub fn delete_excess(&mut self, max_size: usize, rng: &mut StdRng) {
        while self.classifiers.len() > max_size {
            let total_numerosity = self.total_numerosity() as Value;
            let avg_fitness = self.total_fitness() / total_numerosity;
            let total_votes: Value = self
                .classifiers
                .iter()
                .map(|c| c.deletion_vote(avg_fitness))
                .sum();

            let index = if total_votes > 0.0 {
                let choice_point = rng.gen::<Value>() * total_votes;
                let mut acc = 0.0;
                let mut hit = self.classifiers.len() - 1;
                for (i, classifier) in self.classifiers.iter().enumerate() {
                    acc += classifier.deletion_vote(avg_fitness);
                    if acc > choice_point {
                        hit = i;
                        break;
                    }
                }
                hit
            } else {
                log::warn!("population carries no deletion votes, evicting uniformly");
                rng.gen_range(0..self.classifiers.len())
            };

            if self.classifiers[index].numerosity > 1 {
                self.classifiers[index].numerosity -= 1;
            } else {
                self.classifiers.remove(index);
            }
        }
    }
}
