//! Runs the resolution passes in order over one file.

use tracing::{debug, info_span, warn};

use super::bodies::BodyResolver;
use super::collector::DeclarationCollector;
use super::descriptors::DescriptorResolver;
use super::signatures::SignatureRegistrar;
use super::{DeclarationTables, NO_NAME_PROVIDED, Services};
use crate::diagnostic::ErrorHandler;
use crate::error::AnalysisError;
use crate::infer::{BasicTypeInferrer, NominalTypeChecker, TypeChecker, TypeInferrer};
use crate::semantic::{BindingContext, BindingTrace, ScopeKind, SemanticModel};
use crate::tree::SourceFile;

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Report code that can never run as a warning.
    pub report_unreachable: bool,
    /// Name given to namespaces declared without one.
    pub default_namespace: String,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            report_unreachable: true,
            default_namespace: NO_NAME_PROVIDED.to_string(),
        }
    }
}

/// Everything a successful run produced.
pub struct ResolvedModel {
    pub model: SemanticModel,
    pub bindings: BindingContext,
}

pub struct TopDownAnalyzer {
    inferrer: Box<dyn TypeInferrer + Send + Sync>,
    checker: Box<dyn TypeChecker + Send + Sync>,
    options: AnalyzerOptions,
}

impl Default for TopDownAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerOptions::default())
    }
}

impl TopDownAnalyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self::with_services(
            Box::new(BasicTypeInferrer::new()),
            Box::new(NominalTypeChecker::new()),
            options,
        )
    }

    pub fn with_services(
        inferrer: Box<dyn TypeInferrer + Send + Sync>,
        checker: Box<dyn TypeChecker + Send + Sync>,
        options: AnalyzerOptions,
    ) -> Self {
        Self {
            inferrer,
            checker,
            options,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Analyzes `file` with a fresh binding context.
    pub fn analyze(
        &self,
        file: &SourceFile,
        errors: &mut dyn ErrorHandler,
    ) -> Result<ResolvedModel, AnalysisError> {
        let mut bindings = BindingContext::new();
        let model = self.process(file, &mut bindings, errors)?;
        Ok(ResolvedModel { model, bindings })
    }

    /// Runs every pass over `file`, recording into `trace`.
    ///
    /// Diagnostics go to `errors` and never stop the run. An `Err` means the
    /// tree used an unsupported construct or the passes lost track of a
    /// declaration; `trace` then holds whatever was recorded so far.
    pub fn process(
        &self,
        file: &SourceFile,
        trace: &mut dyn BindingTrace,
        errors: &mut dyn ErrorHandler,
    ) -> Result<SemanticModel, AnalysisError> {
        let _span = info_span!("analyze", file = %file.name).entered();
        let mut model = SemanticModel::new();
        let result = self.run_passes(&mut model, file, trace, errors);
        match result {
            Ok(()) => Ok(model),
            Err(error) => {
                warn!(%error, "analysis aborted");
                Err(error)
            }
        }
    }

    fn run_passes(
        &self,
        model: &mut SemanticModel,
        file: &SourceFile,
        trace: &mut dyn BindingTrace,
        errors: &mut dyn ErrorHandler,
    ) -> Result<(), AnalysisError> {
        let services = Services {
            inferrer: self.inferrer.as_ref(),
            checker: self.checker.as_ref(),
        };
        let root = model.root_scope();
        let toplevel = model
            .scopes
            .create_scope(ScopeKind::Toplevel, Some(root), None);
        let mut tables = DeclarationTables::default();

        DeclarationCollector::new(
            model,
            &mut tables,
            errors,
            services,
            &self.options.default_namespace,
        )
        .collect(trace, toplevel, &file.declarations)?;
        debug!(classes = tables.classes.len(), "collected type declarations");

        {
            let mut resolver = DescriptorResolver::new(model, errors);
            for &(class, descriptor) in &tables.classes {
                let scope = tables.declaring_scope(class.id)?;
                resolver.resolve_class(trace, scope, class, descriptor)?;
            }
        }

        SignatureRegistrar::new(model, &mut tables, errors).register(
            trace,
            toplevel,
            &file.declarations,
        )?;
        let finalized = model.descriptors.finalize_classes();
        debug!(
            functions = tables.functions.len(),
            properties = tables.properties.len(),
            finalized,
            "registered signatures"
        );

        BodyResolver::new(model, &tables, errors, services, &self.options).resolve(trace)?;
        debug!("resolved bodies");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCollector;
    use crate::diagnostic::DiagnosticCode;
    use crate::tree::{ClassDecl, ClassObjectDecl, Declaration, FunctionDecl, TypedefDecl};

    #[test]
    fn analyze_returns_the_bindings_it_recorded() {
        let file = SourceFile::new(
            "test",
            vec![
                Declaration::Class(ClassDecl {
                    name: Some("Point".to_string()),
                    ..Default::default()
                }),
                Declaration::Function(FunctionDecl {
                    name: "origin".to_string(),
                    body: Some(crate::tree::Expression::int(0)),
                    ..Default::default()
                }),
            ],
        );
        let mut errors = DiagnosticCollector::new();

        let resolved = TopDownAnalyzer::default().analyze(&file, &mut errors).unwrap();

        assert_eq!(resolved.bindings.declaration_count(), 2);
        let point = resolved
            .bindings
            .declaration(file.declarations[0].id())
            .unwrap();
        assert!(resolved
            .model
            .descriptors
            .class_slot(point)
            .unwrap()
            .is_finalized());
        assert!(errors.diagnostics().is_empty());
    }

    #[test]
    fn class_nested_in_a_class_object_is_reported_not_fatal() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Class(ClassDecl {
                name: Some("Outer".to_string()),
                declarations: vec![Declaration::ClassObject(ClassObjectDecl {
                    declarations: vec![Declaration::Class(ClassDecl {
                        name: Some("Inner".to_string()),
                        ..Default::default()
                    })],
                    ..Default::default()
                })],
                ..Default::default()
            })],
        );
        let mut errors = DiagnosticCollector::new();

        let result = TopDownAnalyzer::default().analyze(&file, &mut errors);

        assert!(result.is_ok());
        assert_eq!(errors.diagnostics().len(), 1);
        assert_eq!(errors.count(DiagnosticCode::UnsupportedConstruct), 1);
    }

    #[test]
    fn unsupported_construct_aborts_the_run() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Typedef(TypedefDecl::default())],
        );
        let mut errors = DiagnosticCollector::new();

        let result = TopDownAnalyzer::default().analyze(&file, &mut errors);

        assert!(matches!(result, Err(AnalysisError::NotImplemented { .. })));
    }

    #[test]
    fn default_options_report_unreachable_code() {
        let options = AnalyzerOptions::default();

        assert!(options.report_unreachable);
        assert_eq!(options.default_namespace, NO_NAME_PROVIDED);
    }
}
