//! Keel CLI - Command-line interface for the Keel semantic analyzer
//!
//! Runs the staged analysis over `*.keel.json` declaration trees.

mod commands;
mod logging;
mod output;

use clap::Parser;
use commands::Commands;
use logging::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "keel",
    author,
    version,
    about = "Staged semantic analyzer for declaration trees",
    long_about = "Keel collects declarations, registers signatures and type-checks bodies\n\
                  against their control-flow graphs, reporting every problem it finds\n\
                  instead of stopping at the first one."
)]
pub struct Cli {
    #[arg(long, value_enum, default_value = "warn", global = true, help = "Set the log level")]
    pub log_level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level, cli.log_json);

    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Init(args) => args.run(),
        Commands::Explain(args) => args.run(),
    }
}
