//! End-to-end resolution of fixture declaration trees
//!
//! Each fixture is a declaration tree in the JSON interchange format; the
//! tests run every pass over it and check diagnostics and resolved
//! descriptors.

use std::fs;
use std::path::Path;

use insta::assert_json_snapshot;
use keel_core::analysis::AnalysisEngine;
use keel_core::diagnostic::{Diagnostic, DiagnosticCode, DiagnosticCollector, Severity};
use keel_core::resolve::{ResolvedModel, TopDownAnalyzer};
use keel_core::semantic::BindingTrace;
use keel_core::tree::{NodeId, SourceFile};
use keel_core::types::Type;
use serde::Serialize;

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

fn read_fixture(relative_path: &str) -> String {
    let path = Path::new(FIXTURES_DIR).join(relative_path);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

fn load(relative_path: &str) -> SourceFile {
    SourceFile::from_json(relative_path, &read_fixture(relative_path))
        .unwrap_or_else(|e| panic!("Invalid fixture {relative_path}: {e}"))
}

fn resolve(file: &SourceFile) -> (ResolvedModel, Vec<Diagnostic>) {
    let mut errors = DiagnosticCollector::new();
    let resolved = TopDownAnalyzer::default()
        .analyze(file, &mut errors)
        .unwrap_or_else(|e| panic!("analysis aborted: {e}"));
    (resolved, errors.into_diagnostics())
}

/// First node whose label is `label`.
fn node(file: &SourceFile, label: &str) -> NodeId {
    (1..=file.node_count() as u32)
        .map(NodeId)
        .find(|&node| file.label(node) == Some(label))
        .unwrap_or_else(|| panic!("no node labeled {label}"))
}

#[derive(Serialize)]
struct DiagnosticSnapshot {
    code: &'static str,
    severity: Severity,
    message: String,
    label: String,
}

fn snapshot(file: &SourceFile) -> Vec<DiagnosticSnapshot> {
    AnalysisEngine::new()
        .analyze(file)
        .diagnostics
        .into_iter()
        .map(|reported| DiagnosticSnapshot {
            code: reported.diagnostic.code.id(),
            severity: reported.diagnostic.severity,
            message: reported.diagnostic.message,
            label: reported.label,
        })
        .collect()
}

fn return_type(resolved: &ResolvedModel, function: NodeId) -> Option<Type> {
    let descriptor = resolved.bindings.declaration(function)?;
    resolved
        .model
        .descriptors
        .function(descriptor)?
        .return_type
        .clone()
}

mod forward_references {
    use super::*;

    #[test]
    fn types_declared_later_resolve_in_signatures() {
        let file = load("resolve/forward_references.keel.json");

        let (resolved, diagnostics) = resolve(&file);

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let origin = resolved
            .bindings
            .declaration(node(&file, "parameter `origin`"))
            .unwrap();
        assert!(matches!(
            resolved.model.descriptors.value_type(origin),
            Some(Type::Class { name, .. }) if name == "Point"
        ));
    }

    #[test]
    fn constructor_calls_resolve_against_later_classes() {
        let file = load("resolve/forward_references.keel.json");

        let (resolved, _) = resolve(&file);

        let shape = resolved
            .bindings
            .declaration(node(&file, "class `Shape`"))
            .unwrap();
        let primary = resolved
            .model
            .descriptors
            .class(shape)
            .unwrap()
            .primary_constructor;
        assert_eq!(
            resolved.bindings.reference(node(&file, "call to `Shape`")),
            primary
        );
    }
}

mod returns {
    use super::*;

    #[test]
    fn unreachable_code_and_missing_bodies_are_reported() {
        let file = load("resolve/returns.keel.json");

        assert_json_snapshot!(snapshot(&file), @r#"
        [
          {
            "code": "K002",
            "severity": "warning",
            "message": "Unreachable code",
            "label": "`+` expression"
          },
          {
            "code": "K002",
            "severity": "warning",
            "message": "Unreachable code",
            "label": "call to `lone`"
          },
          {
            "code": "K006",
            "severity": "error",
            "message": "This function must either declare a return type or have a body element",
            "label": "function `abstract`"
          }
        ]
        "#);
    }

    #[test]
    fn return_types_are_inferred_from_return_points() {
        let file = load("resolve/returns.keel.json");

        let (resolved, _) = resolve(&file);

        assert_eq!(
            return_type(&resolved, node(&file, "function `lone`")),
            Some(Type::Unit)
        );
        assert_eq!(
            return_type(&resolved, node(&file, "function `literal`")),
            Some(Type::String)
        );
        assert_eq!(
            return_type(&resolved, node(&file, "function `early`")),
            Some(Type::Int)
        );
    }

    #[test]
    fn function_without_body_or_type_gets_an_error_type() {
        let file = load("resolve/returns.keel.json");

        let (resolved, diagnostics) = resolve(&file);

        let ty = return_type(&resolved, node(&file, "function `abstract`")).unwrap();
        assert!(ty.is_error());
        assert_eq!(
            diagnostics
                .iter()
                .filter(|d| d.code == DiagnosticCode::MissingReturnTypeAndBody)
                .count(),
            1
        );
    }
}

mod delegation {
    use super::*;

    #[test]
    fn delegation_errors_are_reported_and_resolution_continues() {
        let file = load("resolve/delegation.keel.json");

        assert_json_snapshot!(snapshot(&file), @r#"
        [
          {
            "code": "K001",
            "severity": "error",
            "message": "Type mismatch: inferred type is Plain but Named was expected",
            "label": "call to `Plain`"
          },
          {
            "code": "K007",
            "severity": "error",
            "message": "Constructor parameters required in initializer",
            "label": "supertype `Named`"
          }
        ]
        "#);
    }

    #[test]
    fn members_after_a_delegation_error_are_resolved() {
        let file = load("resolve/delegation.keel.json");

        let (resolved, _) = resolve(&file);

        assert_eq!(
            return_type(&resolved, node(&file, "function `twice`")),
            Some(Type::Int)
        );
    }
}

mod properties {
    use super::*;

    #[test]
    fn backing_fields_follow_accessor_bodies() {
        let file = load("resolve/properties.keel.json");

        let (resolved, _) = resolve(&file);

        let has_field = |label: &str| {
            let property = resolved.bindings.declaration(node(&file, label)).unwrap();
            resolved.bindings.has_backing_field(property)
        };
        assert!(has_field("property `counter`"));
        assert!(!has_field("property `answer`"));
        assert!(has_field("property `label`"));
    }

    #[test]
    fn val_initializer_without_backing_field_is_reported_once() {
        let file = load("resolve/properties.keel.json");

        assert_json_snapshot!(snapshot(&file), @r#"
        [
          {
            "code": "K005",
            "severity": "error",
            "message": "Initializer is not allowed here because this property has no setter and no backing field either",
            "label": "constant `42`"
          }
        ]
        "#);
    }

    #[test]
    fn untyped_property_takes_its_initializer_type() {
        let file = load("resolve/properties.keel.json");

        let (resolved, _) = resolve(&file);

        let label = resolved
            .bindings
            .declaration(node(&file, "property `label`"))
            .unwrap();
        assert_eq!(
            resolved.model.descriptors.value_type(label),
            Some(&Type::String)
        );
    }
}

mod namespaces {
    use super::*;

    #[test]
    fn imported_classes_and_constructor_overloads_resolve() {
        let file = load("resolve/namespaces.keel.json");

        let (resolved, diagnostics) = resolve(&file);

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let secondary = resolved
            .bindings
            .declaration(node(&file, "constructor"))
            .unwrap();
        assert_eq!(
            resolved.bindings.reference(node(&file, "call to `Vector`")),
            Some(secondary)
        );
    }

    #[test]
    fn this_call_selects_the_primary_constructor() {
        let file = load("resolve/namespaces.keel.json");

        let (resolved, _) = resolve(&file);

        let vector = resolved
            .bindings
            .declaration(node(&file, "class `Vector`"))
            .unwrap();
        let primary = resolved
            .model
            .descriptors
            .class(vector)
            .unwrap()
            .primary_constructor;
        assert_eq!(
            resolved.bindings.reference(node(&file, "this call")),
            primary
        );
    }
}

mod constructors {
    use super::*;

    #[test]
    fn constructor_errors_do_not_abort() {
        let file = load("resolve/constructors.keel.json");

        assert_json_snapshot!(snapshot(&file), @r#"
        [
          {
            "code": "K003",
            "severity": "error",
            "message": "Constructors are only allowed inside classes",
            "label": "constructor"
          },
          {
            "code": "K008",
            "severity": "error",
            "message": "This property does not have a backing field",
            "label": "name `$size`"
          }
        ]
        "#);
    }
}

mod order_independence {
    use super::*;
    use keel_core::tree::Declaration;

    #[test]
    fn reversing_declarations_reports_the_same_codes() {
        let file = load("resolve/delegation.keel.json");
        let mut reversed = file.declarations.clone();
        reversed.reverse();
        let reversed = SourceFile::new("reversed", reversed);

        let codes = |file: &SourceFile| {
            let mut codes: Vec<&str> = resolve(file).1.iter().map(|d| d.code.id()).collect();
            codes.sort_unstable();
            codes
        };

        assert_eq!(codes(&file), codes(&reversed));
        assert!(matches!(reversed.declarations[0], Declaration::Class(_)));
    }
}
