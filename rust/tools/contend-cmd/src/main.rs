use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::race::Scenario;

#[derive(Parser)]
#[command(name = "contend-cmd")]
#[command(about = "Races unsynchronized code on released-at-once worker threads")]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a canned race against shared state and report what was lost
    Race {
        /// The race to run
        #[arg(short, long, value_enum)]
        scenario: Scenario,

        /// Number of workers released at once
        #[arg(short, long, default_value_t = 1000)]
        workers: usize,

        /// Stack size of each worker thread, in bytes
        #[arg(long)]
        stack_size: Option<usize>,
    },

    /// Measure how far apart the workers actually start after the release
    Skew {
        /// Number of workers released at once
        #[arg(short, long, default_value_t = 1000)]
        workers: usize,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Race {
            scenario,
            workers,
            stack_size,
        } => commands::race::run(scenario, workers, stack_size),
        Commands::Skew { workers } => commands::skew::run(workers),
    }
}
