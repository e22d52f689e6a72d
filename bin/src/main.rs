//! Ronda CLI binary.
//!
//! Provides command-line access to the Ronda backtesting engine.

mod cmd;
mod data;

use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "ronda")]
#[command(about = "Factor expression backtesting engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available expression operators
    Operators {
        /// Show signatures and descriptions
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse and validate a factor expression
    Validate {
        /// Expression text, e.g. "ttm(quarter(get(net_profit)))"
        expression: String,
    },

    /// Run a factor backtest over panel data
    Backtest(cmd::backtest::BacktestArgs),
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Operators { verbose } => {
            cmd::operators::list_operators(verbose);
            Ok(())
        }
        Commands::Validate { expression } => cmd::validate::validate(&expression),
        Commands::Backtest(args) => cmd::backtest::run(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
