//! Pass 2: functions, properties and constructors.

use tracing::debug;

use super::descriptors::DescriptorResolver;
use super::{DeclarationTables, FunctionLike};
use crate::diagnostic::{DiagnosticCode, ErrorHandler};
use crate::error::AnalysisError;
use crate::semantic::{BindingTrace, DescriptorId, ScopeId, SemanticModel};
use crate::tree::{ClassDecl, ConstructorDecl, Declaration, FunctionDecl, PropertyDecl};

pub struct SignatureRegistrar<'a, 'p> {
    model: &'p mut SemanticModel,
    tables: &'p mut DeclarationTables<'a>,
    errors: &'p mut dyn ErrorHandler,
}

impl<'a, 'p> SignatureRegistrar<'a, 'p> {
    pub fn new(
        model: &'p mut SemanticModel,
        tables: &'p mut DeclarationTables<'a>,
        errors: &'p mut dyn ErrorHandler,
    ) -> Self {
        Self {
            model,
            tables,
            errors,
        }
    }

    fn resolver(&mut self) -> DescriptorResolver<'_> {
        DescriptorResolver::new(&mut *self.model, &mut *self.errors)
    }

    pub fn register(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        declarations: &'a [Declaration],
    ) -> Result<(), AnalysisError> {
        for declaration in declarations {
            match declaration {
                Declaration::Class(class) => {
                    let members = self.register_class(trace, class)?;
                    self.register(trace, members, &class.declarations)?;
                }
                Declaration::ClassObject(object) => {
                    self.errors.generic_error(
                        DiagnosticCode::UnsupportedConstruct,
                        object.id,
                        "Class objects are not supported yet",
                    );
                    self.register(trace, scope, &object.declarations)?;
                }
                Declaration::Namespace(namespace) => {
                    let namespace_scope = self
                        .tables
                        .namespace_scopes
                        .get(&namespace.id)
                        .copied()
                        .ok_or_else(|| {
                            AnalysisError::internal_at(namespace.id, "namespace was not collected")
                        })?;
                    self.register(trace, namespace_scope, &namespace.declarations)?;
                }
                Declaration::Function(function) => {
                    self.register_function(trace, scope, function)?;
                }
                Declaration::Property(property) => {
                    self.register_property(trace, scope, property)?;
                }
                Declaration::Constructor(constructor) => {
                    self.register_constructor(trace, scope, constructor)?;
                }
                Declaration::Typedef(_) | Declaration::Extension(_) => {
                    self.errors.generic_error(
                        DiagnosticCode::UnsupportedConstruct,
                        declaration.id(),
                        "Unsupported declaration",
                    );
                }
            }
        }
        Ok(())
    }

    /// Attaches the primary constructor and returns the class member scope.
    fn register_class(
        &mut self,
        trace: &mut dyn BindingTrace,
        class: &'a ClassDecl,
    ) -> Result<ScopeId, AnalysisError> {
        let descriptor = trace
            .declaration(class.id)
            .ok_or_else(|| AnalysisError::internal_at(class.id, "class was not collected"))?;
        let members = self
            .model
            .descriptors
            .class(descriptor)
            .map(|data| data.member_scope)
            .ok_or_else(|| AnalysisError::internal_at(class.id, "class descriptor expected"))?;

        let primary = self
            .resolver()
            .resolve_primary_constructor(trace, class, descriptor)?;
        for (name, property) in &primary.properties {
            self.model.scopes.add_variable(members, name, *property);
            trace.record_backing_field(*property);
            self.index_property(descriptor, *property);
        }
        if let Some(constructor) = primary.constructor {
            self.model
                .descriptors
                .class_builder_mut(descriptor)?
                .set_primary_constructor(constructor);
        }
        Ok(members)
    }

    fn register_function(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        function: &'a FunctionDecl,
    ) -> Result<(), AnalysisError> {
        let container = self.model.scopes.containing_declaration(scope);
        let descriptor = self
            .resolver()
            .resolve_function(trace, scope, container, function)?;
        self.model
            .scopes
            .add_function(scope, &function.name, descriptor);
        self.tables.declaring_scopes.insert(function.id, scope);
        self.tables
            .functions
            .push((FunctionLike::Function(function), descriptor));
        debug!(function = %function.name, "registered function");
        Ok(())
    }

    fn register_property(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        property: &'a PropertyDecl,
    ) -> Result<(), AnalysisError> {
        let container = self.model.scopes.containing_declaration(scope);
        let descriptor = self
            .resolver()
            .resolve_property(trace, scope, container, property)?;
        self.model
            .scopes
            .add_variable(scope, &property.name, descriptor);
        self.tables.declaring_scopes.insert(property.id, scope);
        self.tables.properties.push((property, descriptor));
        if let Some(container) = container {
            self.index_property(container, descriptor);
        }
        Ok(())
    }

    fn register_constructor(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        constructor: &'a ConstructorDecl,
    ) -> Result<(), AnalysisError> {
        let class = self
            .model
            .scopes
            .containing_declaration(scope)
            .filter(|&owner| self.model.descriptors.class(owner).is_some());
        let Some(class) = class else {
            self.errors.generic_error(
                DiagnosticCode::MisplacedConstructor,
                constructor.id,
                "Constructors are only allowed inside classes",
            );
            return Ok(());
        };

        let descriptor = self
            .resolver()
            .resolve_constructor(trace, scope, class, constructor)?;
        self.model
            .descriptors
            .class_builder_mut(class)?
            .add_constructor(descriptor);
        self.tables.declaring_scopes.insert(constructor.id, scope);
        self.tables
            .functions
            .push((FunctionLike::Constructor(constructor), descriptor));
        Ok(())
    }

    fn index_property(&mut self, container: DescriptorId, property: DescriptorId) {
        self.tables
            .properties_by_container
            .entry(container)
            .or_default()
            .push(property);
    }
}
