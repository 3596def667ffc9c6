//! Diagnostics reported against the analyzed declaration tree.
//!
//! Passes never stop on a program error: they report it through an
//! [`ErrorHandler`] and carry on with an error type where a type is needed.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::tree::NodeId;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticCode {
    TypeMismatch,
    UnreachableCode,
    MisplacedConstructor,
    UnsupportedConstruct,
    InitializerNotAllowed,
    MissingReturnTypeAndBody,
    ConstructorParametersRequired,
    BackingFieldMisuse,
    UnresolvedReference,
    SemanticError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub example: &'static str,
}

impl DiagnosticCode {
    pub const ALL: [DiagnosticCode; 10] = [
        DiagnosticCode::TypeMismatch,
        DiagnosticCode::UnreachableCode,
        DiagnosticCode::MisplacedConstructor,
        DiagnosticCode::UnsupportedConstruct,
        DiagnosticCode::InitializerNotAllowed,
        DiagnosticCode::MissingReturnTypeAndBody,
        DiagnosticCode::ConstructorParametersRequired,
        DiagnosticCode::BackingFieldMisuse,
        DiagnosticCode::UnresolvedReference,
        DiagnosticCode::SemanticError,
    ];

    pub fn id(self) -> &'static str {
        self.metadata().id
    }

    pub fn default_severity(self) -> Severity {
        self.metadata().severity
    }

    pub fn metadata(self) -> CodeMetadata {
        match self {
            DiagnosticCode::TypeMismatch => CodeMetadata {
                id: "K001",
                name: "type-mismatch",
                description: "An expression's type is not compatible with the type expected at its position.",
                severity: Severity::Error,
                example: "fun answer(): Int = \"forty-two\"",
            },
            DiagnosticCode::UnreachableCode => CodeMetadata {
                id: "K002",
                name: "unreachable-code",
                description: "Code that no control-flow path from the start of its body can reach.",
                severity: Severity::Warning,
                example: "fun f(): Int { return 1; 2 }",
            },
            DiagnosticCode::MisplacedConstructor => CodeMetadata {
                id: "K003",
                name: "misplaced-constructor",
                description: "A secondary constructor declared outside of a class body.",
                severity: Severity::Error,
                example: "namespace app { this(x: Int) {} }",
            },
            DiagnosticCode::UnsupportedConstruct => CodeMetadata {
                id: "K004",
                name: "unsupported-construct",
                description: "A construct the analyzer recognizes but does not support, such as class objects or lambdas inside flow-checked bodies.",
                severity: Severity::Error,
                example: "class A { class object { } }",
            },
            DiagnosticCode::InitializerNotAllowed => CodeMetadata {
                id: "K005",
                name: "initializer-not-allowed",
                description: "A read-only property with an initializer but no backing field to store it.",
                severity: Severity::Error,
                example: "val x: Int = 1 get() = 2",
            },
            DiagnosticCode::MissingReturnTypeAndBody => CodeMetadata {
                id: "K006",
                name: "missing-return-type-and-body",
                description: "A function with neither a declared return type nor a body to infer one from.",
                severity: Severity::Error,
                example: "fun f()",
            },
            DiagnosticCode::ConstructorParametersRequired => CodeMetadata {
                id: "K007",
                name: "constructor-parameters-required",
                description: "A supertype is named without constructor arguments where a constructor call is required.",
                severity: Severity::Error,
                example: "class B(x: Int) : A",
            },
            DiagnosticCode::BackingFieldMisuse => CodeMetadata {
                id: "K008",
                name: "backing-field-misuse",
                description: "A `$name` backing-field access to a property that has no backing field.",
                severity: Severity::Error,
                example: "val x: Int get() = 1; this() { $x = 2 }",
            },
            DiagnosticCode::UnresolvedReference => CodeMetadata {
                id: "K009",
                name: "unresolved-reference",
                description: "A name or type reference that does not resolve in any enclosing scope.",
                severity: Severity::Error,
                example: "fun f(): Missing = unknown",
            },
            DiagnosticCode::SemanticError => CodeMetadata {
                id: "K010",
                name: "semantic-error",
                description: "Other semantic errors: invalid delegation, call arguments that match no signature, reassigned values.",
                severity: Severity::Error,
                example: "class A(x: Int) { constructor() : A by x }",
            },
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DiagnosticCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagnosticCode::ALL
            .into_iter()
            .find(|code| {
                let meta = code.metadata();
                meta.id.eq_ignore_ascii_case(s) || meta.name == s
            })
            .ok_or_else(|| format!("unknown diagnostic code '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub node: NodeId,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, node: NodeId, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            node,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Sink for non-fatal program errors.
pub trait ErrorHandler {
    fn report(&mut self, diagnostic: Diagnostic);

    fn generic_error(&mut self, code: DiagnosticCode, node: NodeId, message: &str) {
        self.report(Diagnostic::new(code, node, message));
    }

    fn type_mismatch(&mut self, node: NodeId, expected: &Type, actual: &Type) {
        self.report(Diagnostic::new(
            DiagnosticCode::TypeMismatch,
            node,
            format!("Type mismatch: inferred type is {actual} but {expected} was expected"),
        ));
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

impl ErrorHandler for DiagnosticCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(code = %diagnostic.code, node = %diagnostic.node, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_unique_ids() {
        let mut ids: Vec<&str> = DiagnosticCode::ALL.iter().map(|c| c.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), DiagnosticCode::ALL.len());
    }

    #[test]
    fn parses_codes_by_id_or_name() {
        assert_eq!(
            "K002".parse::<DiagnosticCode>(),
            Ok(DiagnosticCode::UnreachableCode)
        );
        assert_eq!(
            "k007".parse::<DiagnosticCode>(),
            Ok(DiagnosticCode::ConstructorParametersRequired)
        );
        assert_eq!(
            "type-mismatch".parse::<DiagnosticCode>(),
            Ok(DiagnosticCode::TypeMismatch)
        );
        assert!("K999".parse::<DiagnosticCode>().is_err());
    }

    #[test]
    fn unreachable_code_defaults_to_warning() {
        let diagnostic = Diagnostic::new(DiagnosticCode::UnreachableCode, NodeId(4), "Unreachable code");
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(
            diagnostic.with_severity(Severity::Error).severity,
            Severity::Error
        );
    }

    #[test]
    fn collector_formats_type_mismatch() {
        let mut collector = DiagnosticCollector::new();
        collector.type_mismatch(NodeId(1), &Type::Int, &Type::String);
        collector.generic_error(
            DiagnosticCode::MisplacedConstructor,
            NodeId(2),
            "Constructors are only allowed inside classes",
        );

        assert_eq!(collector.count(DiagnosticCode::TypeMismatch), 1);
        assert_eq!(
            collector.diagnostics()[0].message,
            "Type mismatch: inferred type is String but Int was expected"
        );
        assert!(collector.has_errors());
    }
}
