use blastscreen::cli::{self, Cli};
use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize logging with BLASTSCREEN_LOG environment variable support;
    // -v/-vv raise the level to debug/trace
    let log_level = cli::log_level(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    if let Err(e) = cli::run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        // Use appropriate exit codes based on error type
        let exit_code = match e.downcast_ref::<blastscreen::ScreenError>() {
            Some(blastscreen::ScreenError::Config(_)) => 2,
            Some(blastscreen::ScreenError::Io(_)) => 3,
            Some(blastscreen::ScreenError::Parse(_))
            | Some(blastscreen::ScreenError::MalformedRecord { .. }) => 4,
            Some(blastscreen::ScreenError::Tool(_)) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}
