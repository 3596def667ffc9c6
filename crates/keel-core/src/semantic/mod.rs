//! Semantic model: scopes, descriptors and the binding trace.

pub mod binding;
pub mod descriptor;
pub mod scope;

pub use binding::{
    BindingContext, BindingTrace, ConstructorFieldGuard, FieldAccessTracker, ReferenceKind,
};
pub use descriptor::{
    ClassBuilder, ClassData, ClassDescriptor, ClassSlot, Descriptor, DescriptorId, DescriptorKind,
    DescriptorTable, FunctionDescriptor, FunctionRole, NamespaceDescriptor, PropertyDescriptor,
    VariableDescriptor,
};
pub use scope::{AncestorIter, Scope, ScopeId, ScopeKind, ScopeTree};

use crate::error::AnalysisError;

/// Scope tree plus descriptor table for one analysis run.
pub struct SemanticModel {
    pub scopes: ScopeTree,
    pub descriptors: DescriptorTable,
    root: ScopeId,
}

impl Default for SemanticModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticModel {
    pub fn new() -> Self {
        let mut scopes = ScopeTree::new();
        let root = scopes.create_scope(ScopeKind::Root, None, None);
        Self {
            scopes,
            descriptors: DescriptorTable::new(),
            root,
        }
    }

    pub fn root_scope(&self) -> ScopeId {
        self.root
    }

    /// Scope for a function body: parameters bound over `outer`.
    pub fn function_inner_scope(
        &mut self,
        outer: ScopeId,
        function: DescriptorId,
    ) -> Result<ScopeId, AnalysisError> {
        let parameters = self
            .descriptors
            .function(function)
            .map(|f| f.parameters.clone())
            .ok_or_else(|| {
                AnalysisError::internal(format!(
                    "`{}` has no function signature",
                    self.descriptors.get(function).name
                ))
            })?;
        let scope = self
            .scopes
            .create_scope(ScopeKind::Function, Some(outer), Some(function));
        for parameter in parameters {
            let name = self.descriptors.get(parameter).name.clone();
            self.scopes.add_variable(scope, &name, parameter);
        }
        Ok(scope)
    }

    /// Nearest class enclosing `scope`, if any.
    pub fn containing_class(&self, scope: ScopeId) -> Option<DescriptorId> {
        self.scopes
            .ancestors(scope)
            .filter_map(|s| s.owner)
            .find(|&id| self.descriptors.class(id).is_some())
    }
}
