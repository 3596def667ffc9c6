//! The top-down resolution passes.
//!
//! [`TopDownAnalyzer`] runs them in a fixed order over one [`SourceFile`]:
//!
//! 1. [`collector`] registers classes and namespaces so any later lookup of
//!    a type name succeeds regardless of declaration order;
//! 2. [`descriptors`] resolves class supertypes, then [`signatures`]
//!    registers functions, properties and constructors and every class is
//!    finalized;
//! 3. [`bodies`] type-checks initializers, accessors and function bodies
//!    against the now complete signatures.
//!
//! [`SourceFile`]: crate::tree::SourceFile

pub mod bodies;
pub mod collector;
pub mod descriptors;
pub mod driver;
pub mod signatures;

pub use driver::{AnalyzerOptions, ResolvedModel, TopDownAnalyzer};

use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::infer::{TypeChecker, TypeInferrer};
use crate::semantic::{DescriptorId, ScopeId};
use crate::tree::{ClassDecl, ConstructorDecl, FunctionDecl, NodeId, PropertyDecl};

/// Name given to namespaces and classes declared without one.
pub const NO_NAME_PROVIDED: &str = "<no name provided>";

#[derive(Debug, Clone, Copy)]
pub enum FunctionLike<'a> {
    Function(&'a FunctionDecl),
    Constructor(&'a ConstructorDecl),
}

impl FunctionLike<'_> {
    pub fn id(&self) -> NodeId {
        match self {
            FunctionLike::Function(function) => function.id,
            FunctionLike::Constructor(constructor) => constructor.id,
        }
    }
}

/// What pass 1 and pass 2 learn about the tree, kept for the later passes.
///
/// Every list is in declaration order.
#[derive(Debug, Default)]
pub struct DeclarationTables<'a> {
    pub classes: Vec<(&'a ClassDecl, DescriptorId)>,
    pub namespace_scopes: HashMap<NodeId, ScopeId>,
    /// Scope each class, function, property and constructor was declared in.
    pub declaring_scopes: HashMap<NodeId, ScopeId>,
    pub functions: Vec<(FunctionLike<'a>, DescriptorId)>,
    pub properties: Vec<(&'a PropertyDecl, DescriptorId)>,
    pub properties_by_container: HashMap<DescriptorId, Vec<DescriptorId>>,
}

impl DeclarationTables<'_> {
    pub fn declaring_scope(&self, node: NodeId) -> Result<ScopeId, AnalysisError> {
        self.declaring_scopes
            .get(&node)
            .copied()
            .ok_or_else(|| AnalysisError::internal_at(node, "declaration has no declaring scope"))
    }
}

/// The typing collaborators shared by every pass.
#[derive(Clone, Copy)]
pub struct Services<'s> {
    pub inferrer: &'s dyn TypeInferrer,
    pub checker: &'s dyn TypeChecker,
}
