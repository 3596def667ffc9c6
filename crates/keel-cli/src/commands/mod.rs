//! CLI command implementations

pub mod check;
pub mod explain;
pub mod init;

pub use check::CheckArgs;
pub use explain::ExplainArgs;
pub use init::InitArgs;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze declaration trees for semantic errors
    Check(CheckArgs),

    /// Initialize Keel configuration in current directory
    Init(InitArgs),

    /// Show detailed explanation for a diagnostic code
    Explain(ExplainArgs),
}
