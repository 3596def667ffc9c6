//! Init command - initializes Keel configuration in a project

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use keel_core::config::CONFIG_FILENAME;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# Keel configuration file

# Directories skipped when looking for *.keel.json declaration trees
# exclude = ["build", "fixtures"]

[analysis]
# Report statements no control-flow path can reach (K002)
report_unreachable = true

# Name given to namespaces declared without one
# default_namespace = "<no name provided>"

# Override diagnostic severity, by id or name
[analysis.severity]
# K002 = "error"
# semantic-error = "warning"
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(&self) -> Result<()> {
        let config_path = Path::new(CONFIG_FILENAME);

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Config file '{}' already exists. Use --force to overwrite.",
                CONFIG_FILENAME
            );
        }

        fs::write(config_path, DEFAULT_CONFIG)?;
        println!(
            "{} Created {} configuration file",
            "✓".green().bold(),
            CONFIG_FILENAME.cyan()
        );
        Ok(())
    }
}
