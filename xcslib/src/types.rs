//! Primitive data types.

/// Data type for predictions, errors, fitness and reward values.
pub type Value = f64;

/// Data type for the discrete GA time.
pub type Time = usize;

/// Data type for action indices.
pub type ActionIndex = usize;

/// Data type for stable classifier identifiers.
pub type ClassifierId = u64;
