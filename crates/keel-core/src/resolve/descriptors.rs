//! Signature-level resolution: class supertypes, constructors, functions,
//! properties and the type references they mention.

use tracing::trace;

use crate::diagnostic::{DiagnosticCode, ErrorHandler};
use crate::error::AnalysisError;
use crate::semantic::{
    BindingTrace, DescriptorId, DescriptorKind, FunctionDescriptor, FunctionRole,
    PropertyDescriptor, ScopeId, SemanticModel, VariableDescriptor,
};
use crate::tree::{
    Accessor, ClassDecl, ConstructorDecl, FunctionDecl, Parameter, PropertyDecl, TypeRef,
};
use crate::types::Type;

pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Resolves `type_ref` in `scope` and records the result.
///
/// User classifiers shadow the builtin names. A dotted name walks nested
/// namespaces. A reference already recorded in the trace is not resolved
/// again, so each unresolved name is reported once.
pub fn resolve_type_reference(
    model: &SemanticModel,
    trace: &mut dyn BindingTrace,
    errors: &mut dyn ErrorHandler,
    scope: ScopeId,
    type_ref: &TypeRef,
) -> Type {
    if let Some(ty) = trace.type_reference(type_ref.id) {
        return ty.clone();
    }

    let ty = lookup_type(model, scope, &type_ref.name).unwrap_or_else(|| {
        let message = format!("Unresolved type: {}", type_ref.name);
        errors.generic_error(DiagnosticCode::UnresolvedReference, type_ref.id, &message);
        Type::error(message)
    });
    trace.record_type_reference(type_ref.id, ty.clone());
    ty
}

fn lookup_type(model: &SemanticModel, scope: ScopeId, name: &str) -> Option<Type> {
    let scopes = &model.scopes;
    let descriptors = &model.descriptors;

    let Some((path, simple)) = name.rsplit_once('.') else {
        return scopes
            .get_classifier(scope, name)
            .map(|class| descriptors.class_default_type(class))
            .or_else(|| Type::builtin(name));
    };

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut namespace = scopes.get_namespace(scope, first)?;
    for segment in segments {
        let members = descriptors.namespace(namespace)?.member_scope;
        namespace = scopes.get_member_namespace(members, segment)?;
    }
    let members = descriptors.namespace(namespace)?.member_scope;
    scopes
        .get_member_classifier(members, simple)
        .map(|class| descriptors.class_default_type(class))
}

/// The primary constructor of a class and the properties its parameters
/// declare, in parameter order.
#[derive(Debug, Default)]
pub struct PrimaryConstructor {
    pub constructor: Option<DescriptorId>,
    pub properties: Vec<(String, DescriptorId)>,
}

pub struct DescriptorResolver<'p> {
    model: &'p mut SemanticModel,
    errors: &'p mut dyn ErrorHandler,
}

impl<'p> DescriptorResolver<'p> {
    pub fn new(model: &'p mut SemanticModel, errors: &'p mut dyn ErrorHandler) -> Self {
        Self { model, errors }
    }

    fn resolve_type(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        type_ref: &TypeRef,
    ) -> Type {
        resolve_type_reference(&*self.model, trace, &mut *self.errors, scope, type_ref)
    }

    /// Attaches the supertypes named by `class`'s delegation specifiers.
    pub fn resolve_class(
        &mut self,
        trace: &mut dyn BindingTrace,
        declaring_scope: ScopeId,
        class: &ClassDecl,
        descriptor: DescriptorId,
    ) -> Result<(), AnalysisError> {
        let mut supertypes = Vec::new();
        for specifier in &class.delegation_specifiers {
            let Some(type_ref) = specifier.type_ref() else {
                continue;
            };
            let ty = self.resolve_type(trace, declaring_scope, type_ref);
            match ty {
                Type::Class { .. } | Type::Any | Type::Error(_) => supertypes.push(ty),
                other => {
                    self.errors.generic_error(
                        DiagnosticCode::SemanticError,
                        type_ref.id,
                        &format!("'{other}' cannot be used as a supertype"),
                    );
                    supertypes.push(Type::error(format!("Invalid supertype: {other}")));
                }
            }
        }
        if supertypes.is_empty() {
            supertypes.push(Type::Any);
        }

        trace!(
            class = %self.model.descriptors.get(descriptor).name,
            supertypes = supertypes.len(),
            "resolved supertypes"
        );
        self.model
            .descriptors
            .class_builder_mut(descriptor)?
            .set_supertypes(supertypes);
        Ok(())
    }

    fn resolve_parameter(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        container: DescriptorId,
        parameter: &Parameter,
    ) -> DescriptorId {
        let ty = self.parameter_type(trace, scope, parameter);
        let descriptor = self.model.descriptors.alloc(
            &parameter.name,
            Some(container),
            DescriptorKind::Variable(VariableDescriptor {
                ty: Some(ty),
                mutable: false,
            }),
        );
        trace.record_declaration(parameter.id, descriptor);
        descriptor
    }

    fn parameter_type(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        parameter: &Parameter,
    ) -> Type {
        match &parameter.type_ref {
            Some(type_ref) => self.resolve_type(trace, scope, type_ref),
            None => {
                let message = "A type annotation is required on a value parameter";
                self.errors
                    .generic_error(DiagnosticCode::SemanticError, parameter.id, message);
                Type::error(message)
            }
        }
    }

    fn signature(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        role: FunctionRole,
        name: &str,
        container: Option<DescriptorId>,
        parameters: &[Parameter],
    ) -> DescriptorId {
        let kind = match role {
            FunctionRole::PrimaryConstructor | FunctionRole::SecondaryConstructor => {
                DescriptorKind::Constructor(FunctionDescriptor::new(role))
            }
            _ => DescriptorKind::Function(FunctionDescriptor::new(role)),
        };
        let descriptor = self.model.descriptors.alloc(name, container, kind);
        let parameters: Vec<DescriptorId> = parameters
            .iter()
            .map(|parameter| self.resolve_parameter(trace, scope, descriptor, parameter))
            .collect();
        if let Some(function) = self.model.descriptors.function_mut(descriptor) {
            function.parameters = parameters;
        }
        descriptor
    }

    /// Resolves the primary constructor of `class` when it declares a
    /// parameter list; every parameter also becomes a property.
    pub fn resolve_primary_constructor(
        &mut self,
        trace: &mut dyn BindingTrace,
        class: &ClassDecl,
        descriptor: DescriptorId,
    ) -> Result<PrimaryConstructor, AnalysisError> {
        let Some(parameters) = &class.primary_constructor else {
            return Ok(PrimaryConstructor::default());
        };
        let member_scope = self
            .model
            .descriptors
            .class(descriptor)
            .map(|data| data.member_scope)
            .ok_or_else(|| AnalysisError::internal_at(class.id, "class descriptor expected"))?;

        let constructor = self.signature(
            trace,
            member_scope,
            FunctionRole::PrimaryConstructor,
            CONSTRUCTOR_NAME,
            Some(descriptor),
            parameters,
        );
        let class_type = self.model.descriptors.class_default_type(descriptor);
        self.model.descriptors.set_return_type(constructor, class_type)?;

        let types = self.model.descriptors.parameter_types(constructor);
        let mut properties = Vec::with_capacity(parameters.len());
        for (parameter, ty) in parameters.iter().zip(types) {
            let property = self.model.descriptors.alloc(
                &parameter.name,
                Some(descriptor),
                DescriptorKind::Property(PropertyDescriptor {
                    mutable: parameter.mutable,
                    ty: Some(ty),
                    getter: None,
                    setter: None,
                }),
            );
            trace.record_declaration(parameter.id, property);
            properties.push((parameter.name.clone(), property));
        }
        Ok(PrimaryConstructor {
            constructor: Some(constructor),
            properties,
        })
    }

    /// A secondary constructor of `class`, declared in its member scope.
    pub fn resolve_constructor(
        &mut self,
        trace: &mut dyn BindingTrace,
        member_scope: ScopeId,
        class: DescriptorId,
        constructor: &ConstructorDecl,
    ) -> Result<DescriptorId, AnalysisError> {
        let descriptor = self.signature(
            trace,
            member_scope,
            FunctionRole::SecondaryConstructor,
            CONSTRUCTOR_NAME,
            Some(class),
            &constructor.parameters,
        );
        let class_type = self.model.descriptors.class_default_type(class);
        self.model.descriptors.set_return_type(descriptor, class_type)?;
        trace.record_declaration(constructor.id, descriptor);
        Ok(descriptor)
    }

    /// A function signature; the return type stays unset when undeclared.
    pub fn resolve_function(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        container: Option<DescriptorId>,
        function: &FunctionDecl,
    ) -> Result<DescriptorId, AnalysisError> {
        let descriptor = self.signature(
            trace,
            scope,
            FunctionRole::Plain,
            &function.name,
            container,
            &function.parameters,
        );
        if let Some(type_ref) = &function.return_type {
            let ty = self.resolve_type(trace, scope, type_ref);
            self.model.descriptors.set_return_type(descriptor, ty)?;
        }
        trace.record_declaration(function.id, descriptor);
        Ok(descriptor)
    }

    /// A property with its accessors. Types that are not declared are
    /// filled in by body resolution.
    pub fn resolve_property(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        container: Option<DescriptorId>,
        property: &PropertyDecl,
    ) -> Result<DescriptorId, AnalysisError> {
        let ty = property
            .type_ref
            .as_ref()
            .map(|type_ref| self.resolve_type(trace, scope, type_ref));
        let descriptor = self.model.descriptors.alloc(
            &property.name,
            container,
            DescriptorKind::Property(PropertyDescriptor {
                mutable: property.mutable,
                ty: ty.clone(),
                getter: None,
                setter: None,
            }),
        );
        trace.record_declaration(property.id, descriptor);

        let getter = match &property.getter {
            Some(getter) => Some(self.resolve_getter(
                trace,
                scope,
                descriptor,
                property,
                getter,
                ty.as_ref(),
            )?),
            None => None,
        };
        let setter = match &property.setter {
            Some(setter) => Some(self.resolve_setter(
                trace,
                scope,
                descriptor,
                property,
                setter,
                ty.as_ref(),
            )?),
            None => None,
        };
        if let Some(slot) = self.model.descriptors.property_mut(descriptor) {
            slot.getter = getter;
            slot.setter = setter;
        }
        Ok(descriptor)
    }

    fn resolve_getter(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        property: DescriptorId,
        declaration: &PropertyDecl,
        getter: &Accessor,
        property_type: Option<&Type>,
    ) -> Result<DescriptorId, AnalysisError> {
        let descriptor = self.signature(
            trace,
            scope,
            FunctionRole::Getter,
            &format!("<get-{}>", declaration.name),
            Some(property),
            &[],
        );
        let return_type = match &getter.return_type {
            Some(type_ref) => Some(self.resolve_type(trace, scope, type_ref)),
            None => property_type.cloned(),
        };
        if let Some(ty) = return_type {
            self.model.descriptors.set_return_type(descriptor, ty)?;
        }
        trace.record_declaration(getter.id, descriptor);
        Ok(descriptor)
    }

    fn resolve_setter(
        &mut self,
        trace: &mut dyn BindingTrace,
        scope: ScopeId,
        property: DescriptorId,
        declaration: &PropertyDecl,
        setter: &Accessor,
        property_type: Option<&Type>,
    ) -> Result<DescriptorId, AnalysisError> {
        let descriptor = self.signature(
            trace,
            scope,
            FunctionRole::Setter,
            &format!("<set-{}>", declaration.name),
            Some(property),
            &[],
        );

        let (name, ty) = match &setter.parameter {
            Some(parameter) => {
                let ty = match &parameter.type_ref {
                    Some(type_ref) => Some(self.resolve_type(trace, scope, type_ref)),
                    None => property_type.cloned(),
                };
                (parameter.name.as_str(), ty)
            }
            None => ("value", property_type.cloned()),
        };
        let value = self.model.descriptors.alloc(
            name,
            Some(descriptor),
            DescriptorKind::Variable(VariableDescriptor { ty, mutable: false }),
        );
        if let Some(parameter) = &setter.parameter {
            trace.record_declaration(parameter.id, value);
        }
        if let Some(function) = self.model.descriptors.function_mut(descriptor) {
            function.parameters.push(value);
        }
        self.model.descriptors.set_return_type(descriptor, Type::Unit)?;
        trace.record_declaration(setter.id, descriptor);
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCollector;
    use crate::semantic::{BindingContext, ClassBuilder, ClassSlot, ScopeKind};
    use crate::tree::{Declaration, DelegationSpecifier, SourceFile};

    fn declare_class(model: &mut SemanticModel, scope: ScopeId, name: &str) -> DescriptorId {
        let members = model.scopes.create_scope(ScopeKind::Class, Some(scope), None);
        let class = model.descriptors.alloc(
            name,
            None,
            DescriptorKind::Class(ClassSlot::UnderConstruction(ClassBuilder::new(members, scope))),
        );
        model.scopes.set_owner(members, class);
        model.scopes.add_classifier(scope, name, class);
        class
    }

    fn type_ref(name: &str) -> TypeRef {
        TypeRef {
            id: crate::tree::NodeId(100),
            name: name.to_string(),
        }
    }

    #[test]
    fn builtin_and_class_names_resolve() {
        let mut model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();
        let shape = declare_class(&mut model, root, "Shape");

        let int = resolve_type_reference(&model, &mut trace, &mut errors, root, &type_ref("Int"));
        assert_eq!(int, Type::Int);

        let class = TypeRef {
            id: crate::tree::NodeId(101),
            name: "Shape".to_string(),
        };
        let ty = resolve_type_reference(&model, &mut trace, &mut errors, root, &class);
        assert_eq!(ty.descriptor(), Some(shape));
        assert_eq!(trace.type_reference(class.id), Some(&ty));
        assert!(errors.diagnostics().is_empty());
    }

    #[test]
    fn dotted_names_walk_namespaces() {
        let mut model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();
        let members = model.scopes.create_scope(ScopeKind::Namespace, None, None);
        let geometry = model.descriptors.alloc(
            "geometry",
            None,
            DescriptorKind::Namespace(crate::semantic::NamespaceDescriptor {
                member_scope: members,
            }),
        );
        model.scopes.add_namespace(root, "geometry", geometry);
        let point = declare_class(&mut model, members, "Point");

        let ty = resolve_type_reference(
            &model,
            &mut trace,
            &mut errors,
            root,
            &type_ref("geometry.Point"),
        );

        assert_eq!(ty.descriptor(), Some(point));
    }

    #[test]
    fn unresolved_type_is_reported_once() {
        let model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();
        let missing = type_ref("Missing");

        let first = resolve_type_reference(&model, &mut trace, &mut errors, root, &missing);
        let second = resolve_type_reference(&model, &mut trace, &mut errors, root, &missing);

        assert!(first.is_error());
        assert_eq!(first, second);
        assert_eq!(errors.count(DiagnosticCode::UnresolvedReference), 1);
        assert_eq!(errors.diagnostics()[0].message, "Unresolved type: Missing");
    }

    #[test]
    fn class_without_supertypes_extends_any() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Class(ClassDecl {
                name: Some("Plain".to_string()),
                ..Default::default()
            })],
        );
        let Declaration::Class(class) = &file.declarations[0] else {
            unreachable!()
        };
        let mut model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();
        let descriptor = declare_class(&mut model, root, "Plain");

        DescriptorResolver::new(&mut model, &mut errors)
            .resolve_class(&mut trace, root, class, descriptor)
            .unwrap();

        assert_eq!(model.descriptors.class(descriptor).unwrap().supertypes, vec![Type::Any]);
    }

    #[test]
    fn builtin_value_types_cannot_be_supertypes() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Class(ClassDecl {
                name: Some("Odd".to_string()),
                delegation_specifiers: vec![DelegationSpecifier::SuperClass {
                    id: Default::default(),
                    type_ref: TypeRef {
                        id: Default::default(),
                        name: "Int".to_string(),
                    },
                }],
                ..Default::default()
            })],
        );
        let Declaration::Class(class) = &file.declarations[0] else {
            unreachable!()
        };
        let mut model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();
        let descriptor = declare_class(&mut model, root, "Odd");

        DescriptorResolver::new(&mut model, &mut errors)
            .resolve_class(&mut trace, root, class, descriptor)
            .unwrap();

        assert_eq!(errors.count(DiagnosticCode::SemanticError), 1);
        assert!(model.descriptors.class(descriptor).unwrap().supertypes[0].is_error());
    }

    #[test]
    fn setter_gets_an_implicit_value_parameter() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Property(PropertyDecl {
                name: "size".to_string(),
                mutable: true,
                type_ref: Some(TypeRef {
                    id: Default::default(),
                    name: "Int".to_string(),
                }),
                setter: Some(Accessor::default()),
                ..Default::default()
            })],
        );
        let Declaration::Property(property) = &file.declarations[0] else {
            unreachable!()
        };
        let mut model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();

        let descriptor = DescriptorResolver::new(&mut model, &mut errors)
            .resolve_property(&mut trace, root, None, property)
            .unwrap();

        let setter = model.descriptors.property(descriptor).unwrap().setter.unwrap();
        assert_eq!(model.descriptors.get(setter).name, "<set-size>");
        assert_eq!(model.descriptors.parameter_types(setter), vec![Type::Int]);
        assert_eq!(
            model.descriptors.function(setter).unwrap().return_type,
            Some(Type::Unit)
        );
    }

    #[test]
    fn untyped_parameter_is_reported() {
        let file = SourceFile::new(
            "test",
            vec![Declaration::Function(FunctionDecl {
                name: "f".to_string(),
                parameters: vec![Parameter {
                    name: "x".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            })],
        );
        let Declaration::Function(function) = &file.declarations[0] else {
            unreachable!()
        };
        let mut model = SemanticModel::new();
        let mut trace = BindingContext::new();
        let mut errors = DiagnosticCollector::new();
        let root = model.root_scope();

        let descriptor = DescriptorResolver::new(&mut model, &mut errors)
            .resolve_function(&mut trace, root, None, function)
            .unwrap();

        assert!(model.descriptors.parameter_types(descriptor)[0].is_error());
        assert!(!model.descriptors.function(descriptor).unwrap().is_return_type_set());
        assert_eq!(trace.declaration(function.id), Some(descriptor));
    }
}
