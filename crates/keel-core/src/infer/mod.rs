//! Expression typing collaborators used by the resolution passes.
//!
//! The passes only talk to [`TypeInferrer`] and [`TypeChecker`]; the
//! [`BasicTypeInferrer`] and [`NominalTypeChecker`] implementations cover the
//! expression language of [`crate::tree`].

mod basic;
mod checker;

pub use basic::BasicTypeInferrer;
pub use checker::NominalTypeChecker;

use crate::cfg::FlowInformationProvider;
use crate::diagnostic::ErrorHandler;
use crate::error::AnalysisError;
use crate::semantic::{BindingTrace, DescriptorId, ScopeId, SemanticModel};
use crate::tree::{Expression, NodeId, TypeRef};
use crate::types::Type;

/// Everything an inference call may read or record.
pub struct InferenceContext<'a> {
    pub model: &'a mut SemanticModel,
    pub trace: &'a mut dyn BindingTrace,
    pub errors: &'a mut dyn ErrorHandler,
    pub flow: &'a dyn FlowInformationProvider,
    pub checker: &'a dyn TypeChecker,
}

impl InferenceContext<'_> {
    pub fn is_convertible(&self, actual: &Type, expected: &Type) -> bool {
        self.checker.is_convertible_to(&*self.model, actual, expected)
    }

    pub fn is_subtype(&self, subtype: &Type, supertype: &Type) -> bool {
        self.checker.is_subtype_of(&*self.model, subtype, supertype)
    }
}

/// A function-like declaration: function, accessor or constructor.
#[derive(Debug, Clone, Copy)]
pub struct FunctionBody<'a> {
    pub node: NodeId,
    pub body: Option<&'a Expression>,
}

/// Arguments passed to a constructor at `node`.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub node: NodeId,
    pub arguments: &'a [Expression],
}

pub trait TypeInferrer {
    /// Types `expression` in `scope`, recording every subexpression type.
    fn infer_type(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        expression: &Expression,
    ) -> Result<Option<Type>, AnalysisError>;

    /// Checks a constructor call against the class named by `type_ref`.
    fn check_constructor_call(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        type_ref: &TypeRef,
        call: CallSite<'_>,
    ) -> Result<(), AnalysisError>;

    /// Checks a call to one of `class`'s own constructors (`this(...)`).
    fn check_class_constructor_call(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        class: DescriptorId,
        class_type: &Type,
        call: CallSite<'_>,
    ) -> Result<(), AnalysisError>;

    /// Checks every returned expression against the declared return type.
    fn check_function_return_type(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        function: FunctionBody<'_>,
        descriptor: DescriptorId,
    ) -> Result<(), AnalysisError>;

    /// Joins the types of every reachable return point.
    fn infer_function_return_type(
        &self,
        cx: &mut InferenceContext<'_>,
        scope: ScopeId,
        function: FunctionBody<'_>,
    ) -> Result<Option<Type>, AnalysisError>;
}

pub trait TypeChecker {
    fn is_subtype_of(&self, model: &SemanticModel, subtype: &Type, supertype: &Type) -> bool;
    fn is_convertible_to(&self, model: &SemanticModel, actual: &Type, expected: &Type) -> bool;
}
