//! Situations presented to the agent.

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Verdict of a single test execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
}

/// Observation describing one test case to the agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Situation {
    /// Most recent verdicts, oldest first.
    /// Length equals the configured history length.
    pub previous_results: Vec<TestOutcome>,
    /// Time since the test last ran.
    pub last_execution: Value,
    /// Expected running time of the test.
    pub duration: Value,
}
