//! Fatal analysis outcomes.
//!
//! Problems in the analyzed program are never errors here: they go to an
//! [`ErrorHandler`](crate::diagnostic::ErrorHandler) and analysis continues.
//! An [`AnalysisError`] aborts the whole run.

use thiserror::Error;

use crate::tree::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A broken invariant between passes.
    #[error("internal error{}: {message}", node_suffix(.node))]
    Internal {
        node: Option<NodeId>,
        message: String,
    },

    /// A construct the analyzer deliberately does not handle yet.
    #[error("not implemented: {construct} (node {node})")]
    NotImplemented { node: NodeId, construct: String },
}

impl AnalysisError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            node: None,
            message: message.into(),
        }
    }

    pub fn internal_at(node: NodeId, message: impl Into<String>) -> Self {
        Self::Internal {
            node: Some(node),
            message: message.into(),
        }
    }

    pub fn not_implemented(node: NodeId, construct: impl Into<String>) -> Self {
        Self::NotImplemented {
            node,
            construct: construct.into(),
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Internal { node, .. } => *node,
            Self::NotImplemented { node, .. } => Some(*node),
        }
    }
}

fn node_suffix(node: &Option<NodeId>) -> String {
    node.map(|n| format!(" at node {n}")).unwrap_or_default()
}
