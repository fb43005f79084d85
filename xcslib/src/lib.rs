//! # XCS Test Prioritization Library
//!
//! An XCS-style learning classifier system for ranking continuous-integration
//! test cases. The agent observes a [`situation::Situation`] describing a
//! single test (recent verdicts, recency, expected duration), answers with a
//! priority action, and learns from the delayed rewards of the CI cycle.

use std::cell::Cell;

use rand::rngs::StdRng;
use rand::SeedableRng;

pub mod agent;
pub mod classifier;
pub mod error;
pub mod ga;
pub mod io;
pub mod matching;
pub mod population;
pub mod reinforcement;
pub mod selection;
pub mod situation;
pub mod types;

pub use error::XcsError;

thread_local! {
    /// Seed for [`create_rng`]. `None` seeds from entropy.
    pub static RANDOM_SEED: Cell<Option<u64>> = Cell::new(None);
}

/// Create a random number generator.
/// This will use the thread local RANDOM_SEED variable if it's not None.
pub fn create_rng() -> StdRng {
    RANDOM_SEED.with(|seed| match seed.get() {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    })
}

/// The seed [`create_rng`] would use right now, if any.
pub fn current_seed() -> Option<u64> {
    RANDOM_SEED.with(|seed| seed.get())
}
