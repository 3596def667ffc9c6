//! Check command - analyzes declaration trees for semantic errors

use crate::output::FileFailure;
use crate::output::json::JsonFormatter;
use crate::output::pretty::PrettyFormatter;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use keel_core::analysis::{AnalysisEngine, FileDiagnostic};
use keel_core::config::load_config_or_default_with_warnings;
use keel_core::diagnostic::Severity;
use keel_core::tree::SourceFile;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use walkdir::WalkDir;

const TREE_SUFFIX: &str = ".keel.json";

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to a declaration tree or a directory of them
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format for diagnostics (pretty, text, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Fail on warnings (exit code 1)
    #[arg(long)]
    pub fail_on_warnings: bool,

    /// Filter diagnostics by minimum severity level (error, warning, info, hint)
    #[arg(long, value_name = "LEVEL")]
    pub severity: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Default)]
struct CheckOutcome {
    total_files: usize,
    diagnostics: Vec<FileDiagnostic>,
    failures: Vec<FileFailure>,
}

impl CheckOutcome {
    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.diagnostic.severity == severity)
            .count()
    }
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        self.configure_colors();

        let outcome = self.analyze()?;
        if outcome.total_files == 0 {
            println!("No declaration trees ({}) found.", TREE_SUFFIX);
            return Ok(());
        }

        match self.format.as_str() {
            "json" => self.output_json(&outcome),
            "text" => self.output_text(&outcome),
            _ => self.output_pretty(&outcome),
        }

        if self.should_fail(&outcome) {
            process::exit(1);
        }

        Ok(())
    }

    fn analyze(&self) -> Result<CheckOutcome> {
        let config_result = load_config_or_default_with_warnings(&self.path);
        for warning in &config_result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
        let config = config_result.config;

        let files = discover_files(&self.path, &config.exclude)?;
        debug!(files = files.len(), path = %self.path.display(), "discovered declaration trees");

        let engine = AnalysisEngine::with_config(&config);
        let min_severity = self.parse_severity()?;

        let results: Vec<(Vec<FileDiagnostic>, Option<FileFailure>)> = files
            .par_iter()
            .map(|file| analyze_file(&engine, file))
            .collect();

        let mut outcome = CheckOutcome {
            total_files: files.len(),
            ..Default::default()
        };
        for (diagnostics, failure) in results {
            outcome.diagnostics.extend(
                diagnostics
                    .into_iter()
                    .filter(|d| severity_level(&d.diagnostic.severity) >= severity_level(&min_severity)),
            );
            outcome.failures.extend(failure);
        }

        Ok(outcome)
    }

    fn should_fail(&self, outcome: &CheckOutcome) -> bool {
        let has_errors = !outcome.failures.is_empty() || outcome.count(Severity::Error) > 0;
        let has_warnings = outcome.count(Severity::Warning) > 0 && self.fail_on_warnings;
        has_errors || has_warnings
    }

    fn parse_severity(&self) -> Result<Severity> {
        match self.severity.as_deref() {
            Some("error") => Ok(Severity::Error),
            Some("warning") => Ok(Severity::Warning),
            Some("info") => Ok(Severity::Info),
            Some("hint") => Ok(Severity::Hint),
            Some(other) => anyhow::bail!(
                "Invalid severity '{}'. Valid values: error, warning, info, hint",
                other
            ),
            None => Ok(Severity::Hint),
        }
    }

    fn configure_colors(&self) {
        let no_color_env = std::env::var("NO_COLOR").is_ok();
        if self.no_color || no_color_env {
            colored::control::set_override(false);
        }
    }

    fn output_text(&self, outcome: &CheckOutcome) {
        for failure in &outcome.failures {
            println!("{}: {}: {}", failure.file, "error".red().bold(), failure.message);
        }

        for diag in &outcome.diagnostics {
            let inner = &diag.diagnostic;
            let severity_str = match inner.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow().bold(),
                Severity::Info => "info".blue().bold(),
                Severity::Hint => "hint".cyan().bold(),
            };

            println!(
                "{}: {}: {} [{}]: {}",
                diag.file,
                diag.label,
                severity_str,
                inner.code.id().dimmed(),
                inner.message
            );
        }

        if !outcome.diagnostics.is_empty() || !outcome.failures.is_empty() {
            println!();
            println!(
                "Found {} error(s) and {} warning(s)",
                outcome.count(Severity::Error) + outcome.failures.len(),
                outcome.count(Severity::Warning)
            );
        }
    }

    fn output_json(&self, outcome: &CheckOutcome) {
        let formatter = JsonFormatter::new();
        println!(
            "{}",
            formatter.format(
                &outcome.diagnostics,
                &outcome.failures,
                outcome.total_files,
                &self.path.to_string_lossy()
            )
        );
    }

    fn output_pretty(&self, outcome: &CheckOutcome) {
        let formatter = PrettyFormatter::new();
        print!("{}", formatter.format(&outcome.diagnostics, &outcome.failures));
    }
}

/// Diagnostics reported before any fatal error are kept alongside it.
fn analyze_file(engine: &AnalysisEngine, path: &Path) -> (Vec<FileDiagnostic>, Option<FileFailure>) {
    let name = path.to_string_lossy().to_string();
    let failure = |message: String| FileFailure {
        file: name.clone(),
        message,
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return (Vec::new(), Some(failure(format!("failed to read file: {e}")))),
    };
    let file = match SourceFile::from_json(name.clone(), &content) {
        Ok(file) => file,
        Err(e) => {
            return (
                Vec::new(),
                Some(failure(format!("not a declaration tree: {e}"))),
            );
        }
    };

    let report = engine.analyze(&file);
    let fatal = report
        .fatal
        .map(|error| failure(format!("analysis aborted: {error}")));
    (report.diagnostics, fatal)
}

fn discover_files(path: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        if is_supported_file(path) {
            return Ok(vec![path.to_path_buf()]);
        } else {
            return Ok(vec![]);
        }
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| !is_skipped(e, exclude))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    Ok(files)
}

fn is_supported_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.len() > TREE_SUFFIX.len() && name.ends_with(TREE_SUFFIX))
        .unwrap_or(false)
}

fn is_skipped(entry: &walkdir::DirEntry, exclude: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| {
            name.starts_with('.')
                || (entry.file_type().is_dir() && exclude.iter().any(|dir| dir == name))
        })
        .unwrap_or(false)
}

fn severity_level(severity: &Severity) -> u8 {
    match severity {
        Severity::Error => 4,
        Severity::Warning => 3,
        Severity::Info => 2,
        Severity::Hint => 1,
    }
}
