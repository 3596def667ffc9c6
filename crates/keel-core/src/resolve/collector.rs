//! Pass 1: classes and namespaces.

use tracing::debug;

use super::{DeclarationTables, NO_NAME_PROVIDED, Services};
use crate::cfg::ForbiddenFlowInformation;
use crate::diagnostic::{DiagnosticCode, ErrorHandler};
use crate::error::AnalysisError;
use crate::infer::InferenceContext;
use crate::semantic::{
    BindingTrace, ClassBuilder, ClassSlot, DescriptorId, DescriptorKind, NamespaceDescriptor,
    ScopeId, ScopeKind, SemanticModel,
};
use crate::tree::{ClassDecl, Declaration, ImportDirective, NamespaceDecl};

pub struct DeclarationCollector<'a, 'p> {
    model: &'p mut SemanticModel,
    tables: &'p mut DeclarationTables<'a>,
    errors: &'p mut dyn ErrorHandler,
    services: Services<'p>,
    default_namespace: &'p str,
}

impl<'a, 'p> DeclarationCollector<'a, 'p> {
    pub fn new(
        model: &'p mut SemanticModel,
        tables: &'p mut DeclarationTables<'a>,
        errors: &'p mut dyn ErrorHandler,
        services: Services<'p>,
        default_namespace: &'p str,
    ) -> Self {
        Self {
            model,
            tables,
            errors,
            services,
            default_namespace,
        }
    }

    pub fn collect(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        declarations: &'a [Declaration],
    ) -> Result<(), AnalysisError> {
        for declaration in declarations {
            match declaration {
                Declaration::Class(class) => {
                    let members = self.collect_class(trace, scope, class);
                    self.collect(trace, members, &class.declarations)?;
                }
                Declaration::Namespace(namespace) => {
                    let namespace_scope = self.collect_namespace(trace, scope, namespace)?;
                    self.collect(trace, namespace_scope, &namespace.declarations)?;
                }
                Declaration::Typedef(typedef) => {
                    return Err(AnalysisError::not_implemented(typedef.id, "typedef"));
                }
                Declaration::Extension(extension) => {
                    return Err(AnalysisError::not_implemented(extension.id, "extension"));
                }
                // Members are registered in the enclosing scope in pass 2.
                Declaration::ClassObject(object) => {
                    self.collect(trace, scope, &object.declarations)?;
                }
                // Declare no visible types.
                Declaration::Function(_) | Declaration::Property(_) | Declaration::Constructor(_) => {}
            }
        }
        Ok(())
    }

    /// Registers a class builder in `scope` and returns its member scope.
    fn collect_class(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        class: &'a ClassDecl,
    ) -> ScopeId {
        let name = class.name.as_deref().unwrap_or(NO_NAME_PROVIDED);
        let container = self.model.scopes.containing_declaration(scope);
        let members = self
            .model
            .scopes
            .create_scope(ScopeKind::Class, Some(scope), None);
        let descriptor = self.model.descriptors.alloc(
            name,
            container,
            DescriptorKind::Class(ClassSlot::UnderConstruction(ClassBuilder::new(
                members, scope,
            ))),
        );
        self.model.scopes.set_owner(members, descriptor);
        self.model.scopes.add_classifier(scope, name, descriptor);
        trace.record_declaration(class.id, descriptor);

        self.tables.classes.push((class, descriptor));
        self.tables.declaring_scopes.insert(class.id, scope);
        debug!(class = name, "collected class");
        members
    }

    /// Finds or creates the namespace and returns a scope that reads through
    /// `scope` and writes into the namespace's members.
    fn collect_namespace(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        namespace: &'a NamespaceDecl,
    ) -> Result<ScopeId, AnalysisError> {
        let name = namespace.name.as_deref().unwrap_or(self.default_namespace);
        let descriptor = match self.model.scopes.declared_namespace(scope, name) {
            Some(existing) => existing,
            None => self.declare_namespace(trace, scope, name, namespace),
        };
        let members = self
            .model
            .descriptors
            .namespace(descriptor)
            .map(|ns| ns.member_scope)
            .ok_or_else(|| {
                AnalysisError::internal_at(namespace.id, "namespace descriptor expected")
            })?;

        let namespace_scope = self.model.scopes.create_write_through(scope, members);
        self.tables
            .namespace_scopes
            .insert(namespace.id, namespace_scope);

        for import in &namespace.imports {
            self.apply_import(trace, namespace_scope, import)?;
        }
        Ok(namespace_scope)
    }

    fn declare_namespace(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        name: &str,
        namespace: &NamespaceDecl,
    ) -> DescriptorId {
        let container = self.model.scopes.containing_declaration(scope);
        let members = self
            .model
            .scopes
            .create_scope(ScopeKind::Namespace, None, None);
        let descriptor = self.model.descriptors.alloc(
            name,
            container,
            DescriptorKind::Namespace(NamespaceDescriptor {
                member_scope: members,
            }),
        );
        self.model.scopes.set_owner(members, descriptor);
        self.model.scopes.add_namespace(scope, name, descriptor);
        trace.record_declaration(namespace.id, descriptor);
        debug!(namespace = name, "declared namespace");
        descriptor
    }

    fn apply_import(
        &mut self,
        trace: &mut dyn BindingTrace,
        namespace_scope: ScopeId,
        import: &ImportDirective,
    ) -> Result<(), AnalysisError> {
        if import.absolute_in_root {
            return Err(AnalysisError::not_implemented(
                import.id,
                "import from the root namespace",
            ));
        }
        if !import.all_under {
            return Err(AnalysisError::not_implemented(
                import.id,
                "single-name import",
            ));
        }
        let Some(imported) = &import.imported else {
            return Ok(());
        };

        let inferrer = self.services.inferrer;
        let mut cx = InferenceContext {
            model: &mut *self.model,
            trace: &mut *trace,
            errors: &mut *self.errors,
            flow: &ForbiddenFlowInformation,
            checker: self.services.checker,
        };
        let Some(ty) = inferrer.infer_type(&mut cx, namespace_scope, imported)? else {
            return Ok(());
        };
        match self.model.descriptors.member_scope(&ty) {
            Some(members) => self.model.scopes.import_scope(namespace_scope, members),
            None if ty.is_error() => {}
            None => self.errors.generic_error(
                DiagnosticCode::SemanticError,
                imported.id,
                &format!("Cannot import members of '{ty}'"),
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCollector;
    use crate::infer::{BasicTypeInferrer, NominalTypeChecker};
    use crate::semantic::BindingContext;
    use crate::tree::{Expression, SourceFile, TypedefDecl};

    struct Run<'a> {
        model: SemanticModel,
        trace: BindingContext,
        errors: DiagnosticCollector,
        tables: DeclarationTables<'a>,
        toplevel: ScopeId,
        result: Result<(), AnalysisError>,
    }

    fn collect(file: &SourceFile) -> Run<'_> {
        let mut model = SemanticModel::new();
        let root = model.root_scope();
        let toplevel = model
            .scopes
            .create_scope(ScopeKind::Toplevel, Some(root), None);
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let mut tables = DeclarationTables::default();
        let inferrer = BasicTypeInferrer::new();
        let checker = NominalTypeChecker::new();
        let services = Services {
            inferrer: &inferrer,
            checker: &checker,
        };

        let result = DeclarationCollector::new(
            &mut model,
            &mut tables,
            &mut errors,
            services,
            NO_NAME_PROVIDED,
        )
        .collect(&mut trace, toplevel, &file.declarations);

        Run {
            model,
            trace,
            errors,
            tables,
            toplevel,
            result,
        }
    }

    fn class(name: &str, declarations: Vec<Declaration>) -> Declaration {
        Declaration::Class(ClassDecl {
            name: Some(name.to_string()),
            declarations,
            ..Default::default()
        })
    }

    fn namespace(name: Option<&str>, declarations: Vec<Declaration>) -> Declaration {
        Declaration::Namespace(NamespaceDecl {
            name: name.map(str::to_string),
            declarations,
            ..Default::default()
        })
    }

    #[test]
    fn nested_classes_are_registered_in_their_outer_member_scope() {
        let file = SourceFile::new("test", vec![class("Outer", vec![class("Inner", vec![])])]);

        let run = collect(&file);

        run.result.unwrap();
        assert_eq!(run.tables.classes.len(), 2);
        let outer = run.model.scopes.get_classifier(run.toplevel, "Outer").unwrap();
        assert_eq!(run.model.scopes.get_classifier(run.toplevel, "Inner"), None);
        let members = run.model.descriptors.class(outer).unwrap().member_scope;
        let inner = run.model.scopes.get_member_classifier(members, "Inner").unwrap();
        assert_eq!(run.model.descriptors.get(inner).container, Some(outer));
        assert!(!run.model.descriptors.class_slot(inner).unwrap().is_finalized());
    }

    #[test]
    fn namespaces_with_the_same_name_are_merged() {
        let file = SourceFile::new(
            "test",
            vec![
                namespace(Some("shapes"), vec![class("Circle", vec![])]),
                namespace(Some("shapes"), vec![class("Square", vec![])]),
            ],
        );

        let run = collect(&file);

        run.result.unwrap();
        assert_eq!(run.tables.namespace_scopes.len(), 2);
        let shapes = run.model.scopes.get_namespace(run.toplevel, "shapes").unwrap();
        let members = run.model.descriptors.namespace(shapes).unwrap().member_scope;
        assert!(run.model.scopes.get_member_classifier(members, "Circle").is_some());
        assert!(run.model.scopes.get_member_classifier(members, "Square").is_some());
        assert_eq!(run.trace.declaration_count(), 3);
    }

    #[test]
    fn anonymous_namespace_gets_the_default_name() {
        let file = SourceFile::new("test", vec![namespace(None, vec![])]);

        let run = collect(&file);

        run.result.unwrap();
        assert!(run
            .model
            .scopes
            .get_namespace(run.toplevel, NO_NAME_PROVIDED)
            .is_some());
    }

    #[test]
    fn wildcard_import_exposes_namespace_members() {
        let file = SourceFile::new(
            "test",
            vec![
                namespace(Some("lib"), vec![class("Helper", vec![])]),
                Declaration::Namespace(NamespaceDecl {
                    name: Some("app".to_string()),
                    imports: vec![ImportDirective {
                        imported: Some(Expression::name("lib")),
                        all_under: true,
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            ],
        );

        let run = collect(&file);

        run.result.unwrap();
        assert!(run.errors.diagnostics().is_empty());
        let Declaration::Namespace(app) = &file.declarations[1] else {
            unreachable!()
        };
        let body_scope = run.tables.namespace_scopes[&app.id];
        assert!(run.model.scopes.get_classifier(body_scope, "Helper").is_some());
        // Imports apply to the namespace body scope, not to the member scope.
        let app = run.trace.declaration(app.id).unwrap();
        let app_members = run.model.descriptors.namespace(app).unwrap().member_scope;
        assert_eq!(run.model.scopes.get_member_classifier(app_members, "Helper"), None);
    }

    #[test]
    fn single_name_import_is_not_implemented() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Namespace(NamespaceDecl {
                name: Some("app".to_string()),
                imports: vec![ImportDirective {
                    imported: Some(Expression::name("lib")),
                    ..Default::default()
                }],
                ..Default::default()
            })],
        );

        let run = collect(&file);

        assert!(matches!(run.result, Err(AnalysisError::NotImplemented { .. })));
    }

    #[test]
    fn typedef_is_not_implemented() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Typedef(TypedefDecl {
                name: Some("Alias".to_string()),
                ..Default::default()
            })],
        );

        let run = collect(&file);

        assert_eq!(
            run.result,
            Err(AnalysisError::not_implemented(crate::tree::NodeId(1), "typedef"))
        );
    }
}
