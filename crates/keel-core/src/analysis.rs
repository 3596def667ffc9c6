//! Analysis engine used by the CLI
//!
//! Wraps [`TopDownAnalyzer`] with the configured options and severity
//! overrides, and attaches file names and node labels to diagnostics.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticCode, DiagnosticCollector, Severity};
use crate::error::AnalysisError;
use crate::resolve::{AnalyzerOptions, TopDownAnalyzer};
use crate::tree::SourceFile;

/// A diagnostic with the file and node it was reported against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiagnostic {
    pub file: String,
    pub label: String,
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

#[derive(Debug)]
pub struct AnalysisReport {
    pub file: String,
    pub diagnostics: Vec<FileDiagnostic>,
    /// Set when the run stopped early; `diagnostics` holds what was reported
    /// before that.
    pub fatal: Option<AnalysisError>,
}

impl AnalysisReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.diagnostic.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.fatal.is_some() || self.count(Severity::Error) > 0
    }
}

pub struct AnalysisEngine {
    analyzer: TopDownAnalyzer,
    severity_overrides: HashMap<DiagnosticCode, Severity>,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self {
            analyzer: TopDownAnalyzer::default(),
            severity_overrides: HashMap::new(),
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            analyzer: TopDownAnalyzer::new(config.analysis.analyzer_options()),
            severity_overrides: config.analysis.severity_overrides(),
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        self.analyzer.options()
    }

    pub fn analyze(&self, file: &SourceFile) -> AnalysisReport {
        let mut collector = DiagnosticCollector::new();
        let fatal = self.analyzer.analyze(file, &mut collector).err();

        let diagnostics = collector
            .into_diagnostics()
            .into_iter()
            .map(|diagnostic| {
                let severity = self
                    .severity_overrides
                    .get(&diagnostic.code)
                    .copied()
                    .unwrap_or(diagnostic.severity);
                FileDiagnostic {
                    file: file.name.clone(),
                    label: file
                        .label(diagnostic.node)
                        .map(str::to_string)
                        .unwrap_or_else(|| diagnostic.node.to_string()),
                    diagnostic: diagnostic.with_severity(severity),
                }
            })
            .collect();

        AnalysisReport {
            file: file.name.clone(),
            diagnostics,
            fatal,
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, SeverityValue};
    use serde_json::json;

    fn unreachable_after_return() -> SourceFile {
        SourceFile::from_value(
            "flow.keel.json",
            json!({
                "declarations": [{
                    "kind": "function",
                    "name": "answer",
                    "body": {"kind": "block", "statements": [
                        {"kind": "return", "value": {"kind": "constant", "value": {"int": 42}}},
                        {"kind": "constant", "value": {"int": 0}}
                    ]}
                }]
            }),
        )
        .unwrap()
    }

    #[test]
    fn diagnostics_carry_file_and_node_label() {
        let engine = AnalysisEngine::new();

        let report = engine.analyze(&unreachable_after_return());

        assert!(report.fatal.is_none());
        assert_eq!(report.diagnostics.len(), 1);
        let reported = &report.diagnostics[0];
        assert_eq!(reported.file, "flow.keel.json");
        assert_eq!(reported.diagnostic.code, DiagnosticCode::UnreachableCode);
        assert_eq!(reported.diagnostic.severity, Severity::Warning);
        assert!(!report.has_errors());
    }

    #[test]
    fn severity_overrides_apply() {
        let mut config = Config::default();
        config
            .analysis
            .severity
            .insert("unreachable-code".to_string(), SeverityValue::Error);
        let engine = AnalysisEngine::with_config(&config);

        let report = engine.analyze(&unreachable_after_return());

        assert_eq!(report.count(Severity::Error), 1);
        assert!(report.has_errors());
    }

    #[test]
    fn configured_options_reach_the_analyzer() {
        let config = Config {
            analysis: AnalysisConfig {
                report_unreachable: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = AnalysisEngine::with_config(&config);

        let report = engine.analyze(&unreachable_after_return());

        assert!(!engine.options().report_unreachable);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn fatal_errors_are_kept_in_the_report() {
        let file = SourceFile::from_value(
            "alias.keel.json",
            json!({"declarations": [{"kind": "typedef", "name": "Alias"}]}),
        )
        .unwrap();

        let report = AnalysisEngine::new().analyze(&file);

        assert!(matches!(
            report.fatal,
            Some(AnalysisError::NotImplemented { .. })
        ));
        assert!(report.has_errors());
    }
}
