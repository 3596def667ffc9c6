//! Pretty formatter for human-readable terminal output
//!
//! Displays diagnostics with colors, the node they point at, and a summary.

use colored::{ColoredString, Colorize};
use keel_core::analysis::FileDiagnostic;
use keel_core::diagnostic::Severity;

use super::FileFailure;

pub struct PrettyFormatter;

impl PrettyFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, diagnostics: &[FileDiagnostic], failures: &[FileFailure]) -> String {
        let mut output = String::new();

        for failure in failures {
            output.push_str(&self.format_failure(failure));
            output.push('\n');
        }

        for diag in diagnostics {
            output.push_str(&self.format_diagnostic(diag));
            output.push('\n');
        }

        if !diagnostics.is_empty() || !failures.is_empty() {
            output.push_str(&self.format_summary(diagnostics, failures));
        }

        output
    }

    fn format_diagnostic(&self, diag: &FileDiagnostic) -> String {
        let inner = &diag.diagnostic;
        let header = format!(
            "{}[{}]: {}",
            self.colorize_severity(&inner.severity),
            inner.code.id().dimmed(),
            inner.message
        );
        let location = format!(
            "  {} {}: {} {}",
            "-->".blue(),
            diag.file,
            diag.label,
            format!("({})", inner.node).dimmed()
        );
        let note = format!(
            "   {} {} run `keel explain {}` for details",
            "=".blue(),
            "note:".green(),
            inner.code.id()
        );

        [header, location, note].join("\n")
    }

    fn format_failure(&self, failure: &FileFailure) -> String {
        format!(
            "{}: {}\n  {} {}",
            "error".red().bold(),
            failure.message,
            "-->".blue(),
            failure.file
        )
    }

    fn colorize_severity(&self, severity: &Severity) -> ColoredString {
        match severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
            Severity::Hint => "hint".cyan().bold(),
        }
    }

    fn format_summary(&self, diagnostics: &[FileDiagnostic], failures: &[FileFailure]) -> String {
        let error_count = diagnostics
            .iter()
            .filter(|d| matches!(d.diagnostic.severity, Severity::Error))
            .count()
            + failures.len();
        let warning_count = diagnostics
            .iter()
            .filter(|d| matches!(d.diagnostic.severity, Severity::Warning))
            .count();

        let total = diagnostics.len() + failures.len();

        let errors_str = if error_count == 1 {
            format!("{} error", error_count)
        } else {
            format!("{} errors", error_count)
        };

        let warnings_str = if warning_count == 1 {
            format!("{} warning", warning_count)
        } else {
            format!("{} warnings", warning_count)
        };

        let problems_str = if total == 1 { "problem" } else { "problems" };

        format!(
            "\nFound {} {} ({}, {})\n",
            total.to_string().bold(),
            problems_str,
            errors_str.red(),
            warnings_str.yellow()
        )
    }
}

impl Default for PrettyFormatter {
    fn default() -> Self {
        Self::new()
    }
}
