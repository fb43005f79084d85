//! Command line interface for the XCS test prioritization library.
use clap::Parser;

/// Print an error message and exit with the given code.
macro_rules! fatal_error {
    ($code:expr, $($arg:tt)*) => {{
        eprintln!($($arg)*);
        std::process::exit($code);
    }};
}
pub(crate) use fatal_error;

mod commands;

#[derive(Parser, Debug)]
#[command(about = "Train and inspect XCS test prioritization agents.")]
struct Args {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Args::parse().command.run();
}
