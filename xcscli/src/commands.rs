use std::path::PathBuf;

use super::*;

mod train;

mod inspect;

/// Agent variant to construct or load.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum AgentKind {
    /// One-step on-policy agent.
    OnPolicy,
    /// Experience-replay agent.
    Replay,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        clap::ValueEnum::to_possible_value(self)
            .expect("no skipped variants")
            .get_name()
            .fmt(f)
    }
}

/// All CLI commands available in this binary.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Train an agent on a synthetic test suite.
    #[command(alias = "t")]
    Train(Train),

    /// Print statistics of a saved agent.
    #[command(alias = "i")]
    Inspect(Inspect),
}

#[derive(clap::Args, Debug)]
pub struct Train {
    /// Path to an agent settings JSON file; overrides the flags below.
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Agent variant to train.
    #[arg(short, long, value_enum, default_value_t = AgentKind::OnPolicy)]
    agent: AgentKind,
    /// Maximum number of distinct classifiers in the population.
    #[arg(short, long, default_value_t = 200)]
    population_size: usize,
    /// Length of the verdict history presented to the agent.
    #[arg(long, default_value_t = 4)]
    history_length: usize,
    /// Number of CI cycles to simulate.
    #[arg(short, long, default_value_t = 100)]
    cycles: usize,
    /// Number of test cases in the synthetic suite.
    #[arg(short, long, default_value_t = 20)]
    tests: usize,
    /// Number of priority buckets the agent can assign.
    #[arg(short, long, default_value_t = 3)]
    buckets: usize,
    /// Seed for the random number generators.
    #[arg(long)]
    seed: Option<u64>,
    /// Save the trained agent to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct Inspect {
    /// Path to the saved agent.
    path: PathBuf,
    /// Agent variant stored in the file.
    #[arg(short, long, value_enum, default_value_t = AgentKind::OnPolicy)]
    agent: AgentKind,
    /// Number of top classifiers to print.
    #[arg(short, long, default_value_t = 5)]
    top: usize,
    /// Print the whole population as JSON (Hint: redirect stdout)
    #[arg(short, long, default_value_t = false)]
    json: bool,
}

impl Command {
    pub fn run(self) {
        match self {
            Command::Train(args) => args.run(),
            Command::Inspect(args) => args.run(),
        }
    }
}
