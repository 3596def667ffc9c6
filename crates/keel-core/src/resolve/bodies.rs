//! Pass 3: delegation lists, property bodies, function and constructor
//! bodies.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::driver::AnalyzerOptions;
use super::{DeclarationTables, FunctionLike, Services};
use crate::cfg::{ControlFlowData, EmptyFlowInformation, FlowInformationProvider};
use crate::diagnostic::{DiagnosticCode, ErrorHandler};
use crate::error::AnalysisError;
use crate::infer::{CallSite, FunctionBody, InferenceContext};
use crate::resolve::descriptors::resolve_type_reference;
use crate::semantic::{
    BindingTrace, ConstructorFieldGuard, DescriptorId, FieldAccessTracker, ScopeId, ScopeKind,
    SemanticModel,
};
use crate::tree::{
    ClassDecl, ConstructorDecl, DelegationSpecifier, Expression, NodeId, PropertyDecl,
    find_root_elements,
};
use crate::types::Type;

pub struct BodyResolver<'a, 'p> {
    model: &'p mut SemanticModel,
    tables: &'p DeclarationTables<'a>,
    errors: &'p mut dyn ErrorHandler,
    services: Services<'p>,
    options: &'p AnalyzerOptions,
}

impl<'a, 'p> BodyResolver<'a, 'p> {
    pub fn new(
        model: &'p mut SemanticModel,
        tables: &'p DeclarationTables<'a>,
        errors: &'p mut dyn ErrorHandler,
        services: Services<'p>,
        options: &'p AnalyzerOptions,
    ) -> Self {
        Self {
            model,
            tables,
            errors,
            services,
            options,
        }
    }

    pub fn resolve(&mut self, trace: &mut dyn BindingTrace) -> Result<(), AnalysisError> {
        let tables = self.tables;
        for &(class, descriptor) in &tables.classes {
            self.resolve_delegation_specifiers(trace, class, descriptor)?;
        }
        for &(property, descriptor) in &tables.properties {
            self.resolve_property(trace, property, descriptor)?;
        }
        for &(function, descriptor) in &tables.functions {
            let scope = tables.declaring_scope(function.id())?;
            match function {
                FunctionLike::Function(declaration) => self.resolve_function_body(
                    trace,
                    declaration.id,
                    declaration.body.as_ref(),
                    descriptor,
                    scope,
                )?,
                FunctionLike::Constructor(declaration) => {
                    self.resolve_constructor_body(trace, declaration, descriptor, scope)?
                }
            }
            let resolved = self
                .model
                .descriptors
                .function(descriptor)
                .is_some_and(|f| f.is_return_type_set());
            if !resolved {
                return Err(AnalysisError::internal_at(
                    function.id(),
                    "return type unset after body resolution",
                ));
            }
        }
        Ok(())
    }

    fn context<'c>(
        &'c mut self,
        trace: &'c mut dyn BindingTrace,
        flow: &'c dyn FlowInformationProvider,
    ) -> InferenceContext<'c> {
        InferenceContext {
            model: &mut *self.model,
            trace,
            errors: &mut *self.errors,
            flow,
            checker: self.services.checker,
        }
    }

    fn resolve_delegation_specifiers(
        &mut self,
        trace: &mut dyn BindingTrace,
        class: &ClassDecl,
        descriptor: DescriptorId,
    ) -> Result<(), AnalysisError> {
        let members = self
            .model
            .descriptors
            .class(descriptor)
            .map(|data| data.member_scope)
            .ok_or_else(|| AnalysisError::internal_at(class.id, "class descriptor expected"))?;
        let inferrer = self.services.inferrer;

        for specifier in &class.delegation_specifiers {
            match specifier {
                DelegationSpecifier::ByExpression {
                    type_ref,
                    delegate: Some(delegate),
                    ..
                } => {
                    let mut cx = self.context(trace, &EmptyFlowInformation);
                    let Some(actual) = inferrer.infer_type(&mut cx, members, delegate)? else {
                        continue;
                    };
                    let supertype = resolve_type_reference(
                        &*cx.model,
                        &mut *cx.trace,
                        &mut *cx.errors,
                        members,
                        type_ref,
                    );
                    if !cx.is_subtype(&actual, &supertype) {
                        cx.errors.type_mismatch(delegate.id, &supertype, &actual);
                    }
                }
                DelegationSpecifier::ByExpression { delegate: None, .. } => {}
                DelegationSpecifier::SuperCall {
                    id,
                    type_ref: Some(type_ref),
                    arguments,
                } => {
                    let mut cx = self.context(trace, &EmptyFlowInformation);
                    inferrer.check_constructor_call(
                        &mut cx,
                        members,
                        type_ref,
                        CallSite {
                            node: *id,
                            arguments,
                        },
                    )?;
                }
                DelegationSpecifier::SuperCall { type_ref: None, .. } => {}
                DelegationSpecifier::SuperClass { id, .. } => {
                    if class.primary_constructor.is_some() {
                        self.errors.generic_error(
                            DiagnosticCode::ConstructorParametersRequired,
                            *id,
                            "Constructor parameters required in initializer",
                        );
                    }
                }
                DelegationSpecifier::ThisCall { id, .. } => {
                    return Err(AnalysisError::internal_at(
                        *id,
                        "this-call in a class delegation list",
                    ));
                }
            }
        }
        Ok(())
    }

    fn resolve_property(
        &mut self,
        trace: &mut dyn BindingTrace,
        declaration: &PropertyDecl,
        property: DescriptorId,
    ) -> Result<(), AnalysisError> {
        let declaring_scope = self.tables.declaring_scope(declaration.id)?;
        let inferrer = self.services.inferrer;
        let (getter, setter) = self
            .model
            .descriptors
            .property(property)
            .map(|p| (p.getter, p.setter))
            .ok_or_else(|| AnalysisError::internal_at(declaration.id, "property descriptor expected"))?;

        if let Some(initializer) = &declaration.initializer {
            let flow = ControlFlowData::build(declaration.id, initializer)?;
            let mut cx = self.context(trace, &flow);
            let inferred = inferrer.infer_type(&mut cx, declaring_scope, initializer)?;

            let expected = match setter {
                Some(setter) => self.setter_value_type(setter),
                None => self.model.descriptors.value_type(property).cloned(),
            };
            if let (Some(actual), Some(expected)) = (&inferred, &expected) {
                if !self.is_convertible(actual, expected) {
                    self.errors.type_mismatch(initializer.id, expected, actual);
                }
            }
            if let Some(actual) = inferred {
                self.fill_property_type(property, actual);
            }
        }

        let accessor_scope =
            self.model
                .scopes
                .create_scope(ScopeKind::Accessor, Some(declaring_scope), None);
        self.model
            .scopes
            .add_field(accessor_scope, &declaration.name, property);

        {
            let mut tracker = FieldAccessTracker::new(&mut *trace, property);
            if let (Some(accessor), Some(descriptor)) = (&declaration.getter, getter) {
                self.resolve_function_body(
                    &mut tracker,
                    accessor.id,
                    accessor.body.as_ref(),
                    descriptor,
                    accessor_scope,
                )?;
                if let Some(ty) = self.return_type(descriptor) {
                    self.fill_property_type(property, ty);
                }
            }
            if let (Some(accessor), Some(descriptor)) = (&declaration.setter, setter) {
                self.resolve_function_body(
                    &mut tracker,
                    accessor.id,
                    accessor.body.as_ref(),
                    descriptor,
                    accessor_scope,
                )?;
            }
        }

        if self.model.descriptors.value_type(property).is_none() {
            let message = "This property must either have a type annotation or be initialized";
            self.errors
                .generic_error(DiagnosticCode::SemanticError, declaration.id, message);
            self.fill_property_type(property, Type::error(message));
        }

        let has_accessor_body = [&declaration.getter, &declaration.setter]
            .into_iter()
            .flatten()
            .any(|accessor| accessor.body.is_some());
        if !has_accessor_body {
            trace.record_backing_field(property);
        }

        if let Some(initializer) = &declaration.initializer {
            if !declaration.mutable && !trace.has_backing_field(property) {
                self.errors.generic_error(
                    DiagnosticCode::InitializerNotAllowed,
                    initializer.id,
                    "Initializer is not allowed here because this property has no setter and no backing field either",
                );
            }
        }
        trace!(property = %declaration.name, "resolved property body");
        Ok(())
    }

    fn is_convertible(&self, actual: &Type, expected: &Type) -> bool {
        self.services
            .checker
            .is_convertible_to(&*self.model, actual, expected)
    }

    fn return_type(&self, function: DescriptorId) -> Option<Type> {
        self.model
            .descriptors
            .function(function)
            .and_then(|f| f.return_type.clone())
    }

    fn setter_value(&self, setter: DescriptorId) -> Option<DescriptorId> {
        let function = self.model.descriptors.function(setter)?;
        function.parameters.first().copied()
    }

    fn setter_value_type(&self, setter: DescriptorId) -> Option<Type> {
        let value = self.setter_value(setter)?;
        self.model.descriptors.value_type(value).cloned()
    }

    /// Sets the property type, and the accessor types derived from it,
    /// wherever they are still unknown.
    fn fill_property_type(&mut self, property: DescriptorId, ty: Type) {
        let descriptors = &mut self.model.descriptors;
        let Some(slot) = descriptors.property_mut(property) else {
            return;
        };
        if slot.ty.is_none() {
            slot.ty = Some(ty.clone());
        }
        let (getter, setter) = (slot.getter, slot.setter);

        if let Some(getter) = getter {
            if let Some(function) = descriptors.function_mut(getter) {
                function.return_type.get_or_insert_with(|| ty.clone());
            }
        }
        let Some(value) = setter.and_then(|s| self.setter_value(s)) else {
            return;
        };
        if let Some(variable) = self.model.descriptors.variable_mut(value) {
            variable.ty.get_or_insert(ty);
        }
    }

    fn resolve_function_body(
        &mut self,
        trace: &mut dyn BindingTrace,
        node: NodeId,
        body: Option<&Expression>,
        function: DescriptorId,
        declaring_scope: ScopeId,
    ) -> Result<(), AnalysisError> {
        let declared = self.return_type(function).is_some();
        let Some(body) = body else {
            if !declared {
                self.errors.generic_error(
                    DiagnosticCode::MissingReturnTypeAndBody,
                    node,
                    "This function must either declare a return type or have a body element",
                );
                self.model
                    .descriptors
                    .set_return_type(function, Type::error("No type, no body"))?;
            }
            return Ok(());
        };

        let flow = ControlFlowData::build(node, body)?;
        let scope = self.model.function_inner_scope(declaring_scope, function)?;
        let inferrer = self.services.inferrer;
        let subject = FunctionBody {
            node,
            body: Some(body),
        };
        let mut cx = self.context(trace, &flow);
        if declared {
            inferrer.check_function_return_type(&mut cx, scope, subject, function)?;
        } else {
            let inferred = inferrer
                .infer_function_return_type(&mut cx, scope, subject)?
                .unwrap_or_else(|| Type::error("Unable to infer body type"));
            self.model.descriptors.set_return_type(function, inferred)?;
        }

        self.report_unreachable(&flow, node, body)
    }

    /// Reports the topmost expressions of `body` that no path from its start reaches.
    fn report_unreachable(
        &mut self,
        flow: &ControlFlowData,
        subroutine: NodeId,
        body: &Expression,
    ) -> Result<(), AnalysisError> {
        let unreachable: HashSet<NodeId> = flow
            .collect_unreachable_expressions(subroutine)?
            .into_iter()
            .collect();
        let roots = find_root_elements(body, &unreachable);
        debug!(
            subroutine = %subroutine,
            unreachable = roots.len(),
            "resolved body"
        );
        if self.options.report_unreachable {
            for element in roots {
                self.errors.generic_error(
                    DiagnosticCode::UnreachableCode,
                    element,
                    "Unreachable code",
                );
            }
        }
        Ok(())
    }

    fn resolve_constructor_body(
        &mut self,
        trace: &mut dyn BindingTrace,
        declaration: &ConstructorDecl,
        constructor: DescriptorId,
        declaring_scope: ScopeId,
    ) -> Result<(), AnalysisError> {
        let class = self
            .model
            .descriptors
            .get(constructor)
            .container
            .ok_or_else(|| AnalysisError::internal_at(declaration.id, "constructor without a class"))?;

        let constructor_scope =
            self.model
                .scopes
                .create_scope(ScopeKind::Constructor, Some(declaring_scope), None);
        let tables = self.tables;
        let siblings = tables
            .properties_by_container
            .get(&class)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for &property in siblings {
            let name = self.model.descriptors.get(property).name.clone();
            self.model.scopes.add_field(constructor_scope, &name, property);
        }
        let scope = self
            .model
            .function_inner_scope(constructor_scope, constructor)?;

        let inferrer = self.services.inferrer;
        let mut guard = ConstructorFieldGuard::new(&mut *trace);
        for initializer in &declaration.initializers {
            match initializer {
                DelegationSpecifier::SuperCall {
                    id,
                    type_ref: Some(type_ref),
                    arguments,
                } => {
                    let mut cx = self.context(&mut guard, &EmptyFlowInformation);
                    inferrer.check_constructor_call(
                        &mut cx,
                        scope,
                        type_ref,
                        CallSite {
                            node: *id,
                            arguments,
                        },
                    )?;
                }
                DelegationSpecifier::SuperCall { type_ref: None, .. } => {}
                DelegationSpecifier::ThisCall { id, arguments } => {
                    let class_type = self.model.descriptors.class_default_type(class);
                    let mut cx = self.context(&mut guard, &EmptyFlowInformation);
                    inferrer.check_class_constructor_call(
                        &mut cx,
                        scope,
                        class,
                        &class_type,
                        CallSite {
                            node: *id,
                            arguments,
                        },
                    )?;
                }
                DelegationSpecifier::ByExpression { id, .. } => {
                    self.errors.generic_error(
                        DiagnosticCode::SemanticError,
                        *id,
                        "'by'-clause is only supported for primary constructors",
                    );
                }
                DelegationSpecifier::SuperClass { id, .. } => {
                    self.errors.generic_error(
                        DiagnosticCode::ConstructorParametersRequired,
                        *id,
                        "Constructor parameters required",
                    );
                }
            }
        }

        if let Some(body) = &declaration.body {
            let flow = ControlFlowData::build(declaration.id, body)?;
            let mut cx = self.context(&mut guard, &flow);
            inferrer.infer_type(&mut cx, scope, body)?;
            self.report_unreachable(&flow, declaration.id, body)?;
        }

        for node in guard.into_violations() {
            self.errors.generic_error(
                DiagnosticCode::BackingFieldMisuse,
                node,
                "This property does not have a backing field",
            );
        }
        Ok(())
    }
}
