//! Configuration loading and parsing for Keel
//!
//! Provides functionality to load and parse `keel.toml` configuration files.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::diagnostic::{DiagnosticCode, Severity};
use crate::resolve::{AnalyzerOptions, NO_NAME_PROVIDED};

pub const CONFIG_FILENAME: &str = "keel.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["exclude", "analysis"];
const KNOWN_ANALYSIS_KEYS: &[&str] = &["report_unreachable", "default_namespace", "severity"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory names skipped during file discovery.
    pub exclude: Vec<String>,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub report_unreachable: bool,
    pub default_namespace: String,
    pub severity: HashMap<String, SeverityValue>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            report_unreachable: true,
            default_namespace: NO_NAME_PROVIDED.to_string(),
            severity: HashMap::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            report_unreachable: self.report_unreachable,
            default_namespace: self.default_namespace.clone(),
        }
    }

    /// Severity overrides keyed by code. Keys that name no code are skipped.
    pub fn severity_overrides(&self) -> HashMap<DiagnosticCode, Severity> {
        self.severity
            .iter()
            .filter_map(|(key, value)| Some((key.parse().ok()?, Severity::from(*value))))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SeverityValue {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<SeverityValue> for Severity {
    fn from(value: SeverityValue) -> Self {
        match value {
            SeverityValue::Error => Severity::Error,
            SeverityValue::Warning => Severity::Warning,
            SeverityValue::Info => Severity::Info,
            SeverityValue::Hint => Severity::Hint,
        }
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn read_config(path: &Path) -> Result<(String, Config), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    Ok((content, config))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_config(path).map(|(_, config)| config)
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let (content, config) = read_config(path)?;
    let warnings = detect_unknown_keys(&content);
    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    if let Some(toml::Value::Table(analysis)) = table.get("analysis") {
        let known_analysis: HashSet<&str> = KNOWN_ANALYSIS_KEYS.iter().copied().collect();
        for key in analysis.keys() {
            if !known_analysis.contains(key.as_str()) {
                warnings.push(format!("Unknown config option in [analysis]: '{}'", key));
            }
        }

        if let Some(toml::Value::Table(severity)) = analysis.get("severity") {
            for key in severity.keys() {
                if key.parse::<DiagnosticCode>().is_err() {
                    warnings.push(format!(
                        "Unknown diagnostic code in [analysis.severity]: '{}'",
                        key
                    ));
                }
            }
        }
    }

    warnings
}

pub fn load_config_or_default(start_dir: &Path) -> Config {
    find_config_file(start_dir)
        .and_then(|path| load_config(&path).ok())
        .unwrap_or_default()
}

pub fn load_config_or_default_with_warnings(start_dir: &Path) -> ConfigResult {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path).unwrap_or_default(),
        None => ConfigResult::default(),
    }
}
