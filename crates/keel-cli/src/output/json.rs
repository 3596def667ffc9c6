//! JSON output formatter for diagnostic display
//!
//! Provides a structured JSON document for programmatic integration.

use keel_core::analysis::FileDiagnostic;
use keel_core::diagnostic::Severity;
use serde::Serialize;
use std::collections::HashSet;

use super::FileFailure;

#[derive(Serialize)]
pub struct JsonOutput {
    pub version: &'static str,
    pub metadata: JsonMetadata,
    pub summary: JsonSummary,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub failures: Vec<JsonFailure>,
}

#[derive(Serialize)]
pub struct JsonMetadata {
    pub keel_version: &'static str,
    pub working_directory: String,
    pub analyzed_path: String,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub files_with_issues: usize,
    pub failed_files: usize,
    pub total_diagnostics: usize,
    pub by_severity: SeverityCounts,
}

#[derive(Serialize, Default)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub hint: usize,
}

#[derive(Serialize)]
pub struct JsonDiagnostic {
    pub code: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub message: String,
    pub location: JsonLocation,
}

#[derive(Serialize)]
pub struct JsonLocation {
    pub file: String,
    pub node: u32,
    pub label: String,
}

#[derive(Serialize)]
pub struct JsonFailure {
    pub file: String,
    pub message: String,
}

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(
        &self,
        diagnostics: &[FileDiagnostic],
        failures: &[FileFailure],
        total_files: usize,
        analyzed_path: &str,
    ) -> String {
        let output = self.build_output(diagnostics, failures, total_files, analyzed_path);
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }

    fn build_output(
        &self,
        diagnostics: &[FileDiagnostic],
        failures: &[FileFailure],
        total_files: usize,
        analyzed_path: &str,
    ) -> JsonOutput {
        JsonOutput {
            version: "1.0",
            metadata: self.build_metadata(analyzed_path),
            summary: self.build_summary(diagnostics, failures, total_files),
            diagnostics: diagnostics.iter().map(convert_diagnostic).collect(),
            failures: failures
                .iter()
                .map(|f| JsonFailure {
                    file: f.file.clone(),
                    message: f.message.clone(),
                })
                .collect(),
        }
    }

    fn build_metadata(&self, analyzed_path: &str) -> JsonMetadata {
        JsonMetadata {
            keel_version: env!("CARGO_PKG_VERSION"),
            working_directory: std::env::current_dir()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            analyzed_path: analyzed_path.to_string(),
        }
    }

    fn build_summary(
        &self,
        diagnostics: &[FileDiagnostic],
        failures: &[FileFailure],
        total_files: usize,
    ) -> JsonSummary {
        let mut by_severity = SeverityCounts::default();
        let mut files_with_issues: HashSet<&str> = HashSet::new();

        for diag in diagnostics {
            match diag.diagnostic.severity {
                Severity::Error => by_severity.error += 1,
                Severity::Warning => by_severity.warning += 1,
                Severity::Info => by_severity.info += 1,
                Severity::Hint => by_severity.hint += 1,
            }
            files_with_issues.insert(&diag.file);
        }
        for failure in failures {
            files_with_issues.insert(&failure.file);
        }

        JsonSummary {
            total_files,
            files_with_issues: files_with_issues.len(),
            failed_files: failures.len(),
            total_diagnostics: diagnostics.len(),
            by_severity,
        }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_diagnostic(diag: &FileDiagnostic) -> JsonDiagnostic {
    let metadata = diag.diagnostic.code.metadata();
    JsonDiagnostic {
        code: metadata.id,
        name: metadata.name,
        severity: diag.diagnostic.severity,
        message: diag.diagnostic.message.clone(),
        location: JsonLocation {
            file: diag.file.clone(),
            node: diag.diagnostic.node.0,
            label: diag.label.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::diagnostic::{Diagnostic, DiagnosticCode};
    use keel_core::tree::NodeId;

    fn file_diagnostic(file: &str, code: DiagnosticCode) -> FileDiagnostic {
        FileDiagnostic {
            file: file.to_string(),
            label: "`+` expression".to_string(),
            diagnostic: Diagnostic::new(code, NodeId(7), "Unreachable code"),
        }
    }

    fn parse(output: &str) -> serde_json::Value {
        serde_json::from_str(output).unwrap()
    }

    #[test]
    fn format_produces_valid_json() {
        let diagnostics = vec![file_diagnostic("a.keel.json", DiagnosticCode::UnreachableCode)];

        let parsed = parse(&JsonFormatter::new().format(&diagnostics, &[], 5, "./trees"));

        assert_eq!(parsed["version"], "1.0");
        assert!(parsed["metadata"]["keel_version"].is_string());
        assert_eq!(parsed["metadata"]["analyzed_path"], "./trees");
        assert!(parsed["diagnostics"].is_array());
        assert!(parsed["failures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn format_includes_summary() {
        let diagnostics = vec![
            file_diagnostic("a.keel.json", DiagnosticCode::TypeMismatch),
            file_diagnostic("a.keel.json", DiagnosticCode::UnreachableCode),
            file_diagnostic("b.keel.json", DiagnosticCode::UnreachableCode),
        ];
        let failures = vec![FileFailure {
            file: "c.keel.json".to_string(),
            message: "analysis aborted".to_string(),
        }];

        let parsed = parse(&JsonFormatter::new().format(&diagnostics, &failures, 10, "."));

        assert_eq!(parsed["summary"]["total_files"], 10);
        assert_eq!(parsed["summary"]["files_with_issues"], 3);
        assert_eq!(parsed["summary"]["failed_files"], 1);
        assert_eq!(parsed["summary"]["total_diagnostics"], 3);
        assert_eq!(parsed["summary"]["by_severity"]["error"], 1);
        assert_eq!(parsed["summary"]["by_severity"]["warning"], 2);
    }

    #[test]
    fn format_includes_diagnostic_details() {
        let diagnostics = vec![file_diagnostic("a.keel.json", DiagnosticCode::UnreachableCode)];

        let parsed = parse(&JsonFormatter::new().format(&diagnostics, &[], 1, "."));

        let diag = &parsed["diagnostics"][0];
        assert_eq!(diag["code"], "K002");
        assert_eq!(diag["name"], "unreachable-code");
        assert_eq!(diag["severity"], "warning");
        assert_eq!(diag["message"], "Unreachable code");
        assert_eq!(diag["location"]["file"], "a.keel.json");
        assert_eq!(diag["location"]["node"], 7);
        assert_eq!(diag["location"]["label"], "`+` expression");
    }

    #[test]
    fn empty_diagnostics_produces_valid_output() {
        let parsed = parse(&JsonFormatter::new().format(&[], &[], 0, "."));

        assert_eq!(parsed["summary"]["total_diagnostics"], 0);
        assert!(parsed["diagnostics"].as_array().unwrap().is_empty());
    }
}
