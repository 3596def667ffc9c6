//! Explain command - provides detailed explanation of a diagnostic code

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use keel_core::config::load_config_or_default_with_warnings;
use keel_core::diagnostic::{DiagnosticCode, Severity};
use std::env;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[arg(
        value_name = "CODE",
        help = "Diagnostic code to explain (e.g., \"K002\", \"unreachable-code\")"
    )]
    pub code: String,
}

impl ExplainArgs {
    pub fn run(&self) -> Result<()> {
        let Ok(code) = self.code.parse::<DiagnosticCode>() else {
            eprintln!(
                "{} Unknown diagnostic code '{}'",
                "error:".red().bold(),
                self.code
            );
            eprintln!();
            eprintln!("Available codes:");
            for code in DiagnosticCode::ALL {
                let meta = code.metadata();
                eprintln!("  {} ({})", meta.id, meta.name);
            }
            std::process::exit(1);
        };

        let cwd = env::current_dir()?;
        let config = load_config_or_default_with_warnings(&cwd).config;
        let configured = config.analysis.severity_overrides().get(&code).copied();

        print!("{}", render(code, configured));
        Ok(())
    }
}

fn render(code: DiagnosticCode, configured: Option<Severity>) -> String {
    let metadata = code.metadata();
    let mut out = String::new();

    out.push('\n');
    out.push_str(&format!("{}\n", format!("Diagnostic {}", metadata.id).bold()));
    out.push('\n');
    out.push_str(&format!("  {}: {}\n", "Name".cyan(), metadata.name));
    out.push_str(&format!("  {}: {}\n", "Description".cyan(), metadata.description));
    out.push_str(&format!(
        "  {}: {}\n",
        "Default severity".cyan(),
        format_severity(&metadata.severity)
    ));
    if let Some(severity) = configured.filter(|s| *s != metadata.severity) {
        out.push_str(&format!(
            "  {}: {}\n",
            "Configured severity".cyan(),
            format_severity(&severity)
        ));
    }

    out.push('\n');
    out.push_str(&format!("  {}:\n", "Example".cyan()));
    for line in metadata.example.lines() {
        out.push_str(&format!("    {}\n", line));
    }
    out.push('\n');

    out
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Error => "error".red().to_string(),
        Severity::Warning => "warning".yellow().to_string(),
        Severity::Info => "info".blue().to_string(),
        Severity::Hint => "hint".cyan().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_known_code_shows_metadata() {
        colored::control::set_override(false);

        let output = render(DiagnosticCode::UnreachableCode, None);

        assert!(output.contains("Diagnostic K002"));
        assert!(output.contains("Name: unreachable-code"));
        assert!(output.contains("Default severity: warning"));
        assert!(output.contains("return 1; 2"));
        assert!(!output.contains("Configured severity"));
    }

    #[test]
    fn explain_shows_configured_override() {
        colored::control::set_override(false);

        let output = render(DiagnosticCode::UnreachableCode, Some(Severity::Error));

        assert!(output.contains("Configured severity: error"));
    }

    #[test]
    fn codes_resolve_by_id_and_name() {
        assert_eq!(
            "k005".parse::<DiagnosticCode>(),
            Ok(DiagnosticCode::InitializerNotAllowed)
        );
        assert_eq!(
            "backing-field-misuse".parse::<DiagnosticCode>(),
            Ok(DiagnosticCode::BackingFieldMisuse)
        );
        assert!("K999".parse::<DiagnosticCode>().is_err());
    }

    #[test]
    fn every_code_has_an_example() {
        for code in DiagnosticCode::ALL {
            assert!(!code.metadata().example.is_empty(), "{code} has no example");
        }
    }
}
