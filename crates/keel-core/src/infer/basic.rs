use tracing::trace;

use super::{CallSite, FunctionBody, InferenceContext, TypeInferrer};
use crate::diagnostic::DiagnosticCode;
use crate::error::AnalysisError;
use crate::resolve::descriptors::resolve_type_reference;
use crate::semantic::{
    DescriptorId, DescriptorKind, ReferenceKind, ScopeId, ScopeKind, VariableDescriptor,
};
use crate::tree::{BinaryOperator, Expression, ExpressionKind, Literal, NodeId, TypeRef};
use crate::types::Type;

/// Bottom-up typing of the expression language.
///
/// Every typed subexpression is recorded in the binding trace; names are
/// recorded as references. Problems are reported and typed as error types.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTypeInferrer;

impl BasicTypeInferrer {
    pub fn new() -> Self {
        Self
    }

    fn infer(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        expression: &Expression,
    ) -> Result<Option<Type>, AnalysisError> {
        let node = expression.id;
        let ty = match &expression.kind {
            ExpressionKind::Constant { value } => Some(match value {
                Literal::Int(_) => Type::Int,
                Literal::Double(_) => Type::Double,
                Literal::String(_) => Type::String,
                Literal::Bool(_) => Type::Boolean,
            }),
            ExpressionKind::Name { name } => Some(self.infer_name(cx, scope, node, name)),
            ExpressionKind::Dot { receiver, name } => {
                let receiver_type = self.infer(cx, scope, receiver)?;
                receiver_type.map(|ty| self.infer_member(cx, node, &ty, name))
            }
            ExpressionKind::Block { statements } => {
                let block = cx
                    .model
                    .scopes
                    .create_scope(ScopeKind::Block, Some(scope), None);
                let mut last = Some(Type::Unit);
                for statement in statements {
                    last = self.infer(cx, block, statement)?;
                }
                last
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(cx, scope, condition)?;
                let then_type = self.infer(cx, scope, then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let else_type = self.infer(cx, scope, else_branch)?;
                        match (then_type, else_type) {
                            (Some(a), Some(b)) => Some(self.join(cx, a, b)),
                            _ => None,
                        }
                    }
                    None => Some(Type::Unit),
                }
            }
            ExpressionKind::While { condition, body } => {
                self.check_condition(cx, scope, condition)?;
                self.infer(cx, scope, body)?;
                Some(Type::Unit)
            }
            ExpressionKind::DoWhile { body, condition } => {
                self.infer(cx, scope, body)?;
                self.check_condition(cx, scope, condition)?;
                Some(Type::Unit)
            }
            ExpressionKind::Break | ExpressionKind::Continue => Some(Type::Nothing),
            ExpressionKind::Return { value } => {
                if let Some(value) = value {
                    self.infer(cx, scope, value)?;
                }
                Some(Type::Nothing)
            }
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => {
                let left_type = self.infer(cx, scope, left)?;
                let right_type = self.infer(cx, scope, right)?;
                match (left_type, right_type) {
                    (Some(l), Some(r)) => Some(self.binary_type(cx, node, *operator, &l, &r)),
                    _ => None,
                }
            }
            ExpressionKind::Assign { target, value } => {
                self.infer_assignment(cx, scope, target, value)?;
                Some(Type::Unit)
            }
            ExpressionKind::Call { callee, arguments } => {
                Some(self.infer_call(cx, scope, node, callee, arguments)?)
            }
            ExpressionKind::LocalVariable {
                name,
                mutable,
                type_ref,
                initializer,
            } => {
                self.declare_local(
                    cx,
                    scope,
                    node,
                    name,
                    *mutable,
                    type_ref.as_ref(),
                    initializer.as_deref(),
                )?;
                Some(Type::Unit)
            }
            ExpressionKind::Lambda { .. } => None,
        };

        if let Some(ty) = &ty {
            cx.trace.record_expression_type(node, ty.clone());
        }
        Ok(ty)
    }

    fn infer_name(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        node: NodeId,
        name: &str,
    ) -> Type {
        let scopes = &cx.model.scopes;
        let descriptors = &cx.model.descriptors;

        if let Some(field) = name.strip_prefix('$') {
            return match scopes.get_field(scope, field) {
                Some(property) => {
                    cx.trace
                        .record_reference(node, ReferenceKind::FieldIdentifier, property);
                    descriptors
                        .value_type(property)
                        .cloned()
                        .unwrap_or_else(|| Type::error(format!("Type of {name} is not known yet")))
                }
                None => self.unresolved(cx, node, name),
            };
        }

        if let Some(variable) = scopes.get_variable(scope, name) {
            cx.trace
                .record_reference(node, ReferenceKind::Identifier, variable);
            return descriptors
                .value_type(variable)
                .cloned()
                .unwrap_or_else(|| Type::error(format!("Type of {name} is not known yet")));
        }
        if let Some(namespace) = scopes.get_namespace(scope, name) {
            cx.trace
                .record_reference(node, ReferenceKind::Identifier, namespace);
            return descriptors.namespace_type(namespace);
        }
        self.unresolved(cx, node, name)
    }

    fn infer_member(
        &self,
        cx: &mut InferenceContext<'_>,
        node: NodeId,
        receiver: &Type,
        name: &str,
    ) -> Type {
        if receiver.is_error() {
            return receiver.clone();
        }
        let Some(members) = cx.model.descriptors.member_scope(receiver) else {
            cx.errors.generic_error(
                DiagnosticCode::SemanticError,
                node,
                &format!("Type {receiver} has no members"),
            );
            return Type::error(format!("Type {receiver} has no members"));
        };
        let scopes = &cx.model.scopes;
        if let Some(variable) = scopes.get_member_variable(members, name) {
            cx.trace
                .record_reference(node, ReferenceKind::Identifier, variable);
            return cx
                .model
                .descriptors
                .value_type(variable)
                .cloned()
                .unwrap_or_else(|| Type::error(format!("Type of {name} is not known yet")));
        }
        if let Some(namespace) = scopes.get_member_namespace(members, name) {
            cx.trace
                .record_reference(node, ReferenceKind::Identifier, namespace);
            return cx.model.descriptors.namespace_type(namespace);
        }
        self.unresolved(cx, node, name)
    }

    fn unresolved(&self, cx: &mut InferenceContext<'_>, node: NodeId, name: &str) -> Type {
        let message = format!("Unresolved reference: {name}");
        cx.errors
            .generic_error(DiagnosticCode::UnresolvedReference, node, &message);
        Type::error(message)
    }

    fn check_condition(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        condition: &Expression,
    ) -> Result<(), AnalysisError> {
        if let Some(actual) = self.infer(cx, scope, condition)? {
            if !cx.is_convertible(&actual, &Type::Boolean) {
                cx.errors
                    .type_mismatch(condition.id, &Type::Boolean, &actual);
            }
        }
        Ok(())
    }

    fn binary_type(
        &self,
        cx: &mut InferenceContext<'_>,
        node: NodeId,
        operator: BinaryOperator,
        left: &Type,
        right: &Type,
    ) -> Type {
        if left.is_error() {
            return left.clone();
        }
        if right.is_error() {
            return right.clone();
        }
        let result = match operator {
            BinaryOperator::Plus if *left == Type::String => Some(Type::String),
            BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Times
            | BinaryOperator::Div
            | BinaryOperator::Rem => (left.is_numeric() && right.is_numeric()).then(|| {
                if *left == Type::Double || *right == Type::Double {
                    Type::Double
                } else {
                    Type::Int
                }
            }),
            BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::LtEq
            | BinaryOperator::GtEq => {
                (left.is_numeric() && right.is_numeric()).then_some(Type::Boolean)
            }
            BinaryOperator::Eq | BinaryOperator::NotEq => Some(Type::Boolean),
            BinaryOperator::And | BinaryOperator::Or => {
                (*left == Type::Boolean && *right == Type::Boolean).then_some(Type::Boolean)
            }
        };
        result.unwrap_or_else(|| {
            let message = format!(
                "Operator '{}' cannot be applied to '{left}' and '{right}'",
                operator.symbol()
            );
            cx.errors
                .generic_error(DiagnosticCode::SemanticError, node, &message);
            Type::error(message)
        })
    }

    fn infer_assignment(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        target: &Expression,
        value: &Expression,
    ) -> Result<(), AnalysisError> {
        let target_type = match &target.kind {
            ExpressionKind::Name { .. } | ExpressionKind::Dot { .. } => {
                self.infer(cx, scope, target)?
            }
            _ => {
                cx.errors.generic_error(
                    DiagnosticCode::SemanticError,
                    target.id,
                    "Invalid assignment target",
                );
                None
            }
        };

        let is_field = matches!(&target.kind, ExpressionKind::Name { name } if name.starts_with('$'));
        if let Some(descriptor) = cx.trace.reference(target.id) {
            if !is_field && !cx.model.descriptors.is_mutable_value(descriptor) {
                let name = cx.model.descriptors.get(descriptor).name.clone();
                cx.errors.generic_error(
                    DiagnosticCode::SemanticError,
                    target.id,
                    &format!("Val cannot be reassigned: {name}"),
                );
            }
        }

        let value_type = self.infer(cx, scope, value)?;
        if let (Some(expected), Some(actual)) = (&target_type, &value_type) {
            if !cx.is_convertible(actual, expected) {
                cx.errors.type_mismatch(value.id, expected, actual);
            }
        }
        Ok(())
    }

    fn infer_arguments(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        arguments: &[Expression],
    ) -> Result<Vec<Option<Type>>, AnalysisError> {
        arguments
            .iter()
            .map(|argument| self.infer(cx, scope, argument))
            .collect()
    }

    /// First candidate whose parameters accept `arguments`.
    fn select_candidate(
        &self,
        cx: &InferenceContext<'_>,
        candidates: &[DescriptorId],
        arguments: &[Option<Type>],
    ) -> Option<DescriptorId> {
        candidates.iter().copied().find(|&candidate| {
            let parameters = cx.model.descriptors.parameter_types(candidate);
            parameters.len() == arguments.len()
                && parameters.iter().zip(arguments).all(|(expected, actual)| {
                    actual
                        .as_ref()
                        .is_none_or(|actual| cx.is_convertible(actual, expected))
                })
        })
    }

    fn infer_call(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        node: NodeId,
        callee: &str,
        arguments: &[Expression],
    ) -> Result<Type, AnalysisError> {
        let argument_types = self.infer_arguments(cx, scope, arguments)?;

        let functions = cx.model.scopes.get_functions(scope, callee);
        if !functions.is_empty() {
            return Ok(match self.select_candidate(cx, &functions, &argument_types) {
                Some(function) => {
                    cx.trace
                        .record_reference(node, ReferenceKind::Identifier, function);
                    cx.model
                        .descriptors
                        .function(function)
                        .and_then(|f| f.return_type.clone())
                        .unwrap_or_else(|| {
                            Type::error(format!("Return type of {callee} is not known yet"))
                        })
                }
                None => {
                    let message =
                        format!("None of the functions named '{callee}' accept the given arguments");
                    cx.errors
                        .generic_error(DiagnosticCode::SemanticError, node, &message);
                    Type::error(message)
                }
            });
        }

        if let Some(class) = cx.model.scopes.get_classifier(scope, callee) {
            let class_type = cx.model.descriptors.class_default_type(class);
            self.match_constructor(cx, node, class, &class_type, &argument_types);
            return Ok(class_type);
        }

        Ok(self.unresolved(cx, node, callee))
    }

    fn match_constructor(
        &self,
        cx: &mut InferenceContext<'_>,
        node: NodeId,
        class: DescriptorId,
        class_type: &Type,
        arguments: &[Option<Type>],
    ) {
        let constructors = cx
            .model
            .descriptors
            .class(class)
            .map(|data| data.constructors.clone())
            .unwrap_or_default();
        if constructors.is_empty() && arguments.is_empty() {
            return;
        }
        match self.select_candidate(cx, &constructors, arguments) {
            Some(constructor) => {
                cx.trace
                    .record_reference(node, ReferenceKind::Identifier, constructor);
            }
            None => cx.errors.generic_error(
                DiagnosticCode::SemanticError,
                node,
                &format!("None of the constructors of '{class_type}' accept the given arguments"),
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_local(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        node: NodeId,
        name: &str,
        mutable: bool,
        type_ref: Option<&TypeRef>,
        initializer: Option<&Expression>,
    ) -> Result<(), AnalysisError> {
        let declared = type_ref.map(|type_ref| {
            resolve_type_reference(&*cx.model, &mut *cx.trace, &mut *cx.errors, scope, type_ref)
        });
        let initialized = match initializer {
            Some(initializer) => self.infer(cx, scope, initializer)?,
            None => None,
        };
        if let (Some(expected), Some(actual), Some(initializer)) =
            (&declared, &initialized, initializer)
        {
            if !cx.is_convertible(actual, expected) {
                cx.errors.type_mismatch(initializer.id, expected, actual);
            }
        }

        let ty = declared.or(initialized).unwrap_or_else(|| {
            let message = "This variable must either have a type annotation or be initialized";
            cx.errors
                .generic_error(DiagnosticCode::SemanticError, node, message);
            Type::error(message)
        });
        let container = cx.model.scopes.containing_declaration(scope);
        let variable = cx.model.descriptors.alloc(
            name,
            container,
            DescriptorKind::Variable(VariableDescriptor {
                ty: Some(ty),
                mutable,
            }),
        );
        cx.model.scopes.add_variable(scope, name, variable);
        cx.trace.record_declaration(node, variable);
        Ok(())
    }

    fn join(&self, cx: &InferenceContext<'_>, a: Type, b: Type) -> Type {
        if cx.is_subtype(&a, &b) {
            b
        } else if cx.is_subtype(&b, &a) {
            a
        } else {
            Type::Any
        }
    }
}

impl TypeInferrer for BasicTypeInferrer {
    fn infer_type(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        expression: &Expression,
    ) -> Result<Option<Type>, AnalysisError> {
        self.infer(cx, scope, expression)
    }

    fn check_constructor_call(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        type_ref: &TypeRef,
        call: CallSite<'_>,
    ) -> Result<(), AnalysisError> {
        let ty = match cx.trace.type_reference(type_ref.id) {
            Some(ty) => ty.clone(),
            None => resolve_type_reference(
                &*cx.model,
                &mut *cx.trace,
                &mut *cx.errors,
                scope,
                type_ref,
            ),
        };
        match &ty {
            Type::Class { descriptor, .. } => {
                self.check_class_constructor_call(cx, scope, *descriptor, &ty, call)
            }
            _ => {
                self.infer_arguments(cx, scope, call.arguments)?;
                if !ty.is_error() {
                    cx.errors.generic_error(
                        DiagnosticCode::SemanticError,
                        call.node,
                        &format!("'{ty}' is not a class and has no constructors"),
                    );
                }
                Ok(())
            }
        }
    }

    fn check_class_constructor_call(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        class: DescriptorId,
        class_type: &Type,
        call: CallSite<'_>,
    ) -> Result<(), AnalysisError> {
        let arguments = self.infer_arguments(cx, scope, call.arguments)?;
        self.match_constructor(cx, call.node, class, class_type, &arguments);
        Ok(())
    }

    fn check_function_return_type(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        function: FunctionBody<'_>,
        descriptor: DescriptorId,
    ) -> Result<(), AnalysisError> {
        let expected = cx
            .model
            .descriptors
            .function(descriptor)
            .and_then(|f| f.return_type.clone())
            .ok_or_else(|| {
                AnalysisError::internal_at(function.node, "return type checked before it was set")
            })?;
        let Some(body) = function.body else {
            return Ok(());
        };

        self.infer(cx, scope, body)?;
        let returned = cx
            .flow
            .collect_returned_information(function.node, &mut *cx.errors)?;

        for element in returned.returned_expressions {
            let Some(actual) = cx.trace.expression_type(element).cloned() else {
                continue;
            };
            if !cx.is_convertible(&actual, &expected) {
                cx.errors.type_mismatch(element, &expected, &actual);
            }
        }
        if !cx.is_convertible(&Type::Unit, &expected) {
            for element in returned.unit_returning {
                cx.errors.type_mismatch(element, &expected, &Type::Unit);
            }
        }
        Ok(())
    }

    fn infer_function_return_type(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        function: FunctionBody<'_>,
    ) -> Result<Option<Type>, AnalysisError> {
        let Some(body) = function.body else {
            return Ok(None);
        };

        self.infer(cx, scope, body)?;
        let returned = cx
            .flow
            .collect_returned_information(function.node, &mut *cx.errors)?;

        let mut types: Vec<Type> = returned
            .returned_expressions
            .iter()
            .filter_map(|&element| cx.trace.expression_type(element).cloned())
            .collect();
        if !returned.unit_returning.is_empty() {
            types.push(Type::Unit);
        }
        trace!(function = %function.node, candidates = types.len(), "inferring return type");

        let mut types = types.into_iter();
        Ok(types
            .next()
            .map(|first| types.fold(first, |joined, ty| self.join(cx, joined, ty))))
    }
}
