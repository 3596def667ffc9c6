//! The binding trace: everything resolution learns about the tree.
//!
//! One trace exists per run and is handed to every pass as
//! `&mut dyn BindingTrace`. Decorators wrap an inner trace to observe
//! specific recordings (backing-field access) while forwarding everything.

use std::collections::{HashMap, HashSet};

use crate::semantic::descriptor::{DescriptorId, DescriptorTable};
use crate::tree::NodeId;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Identifier,
    /// `$name` access to a property's backing field.
    FieldIdentifier,
}

pub trait BindingTrace {
    fn record_declaration(&mut self, node: NodeId, descriptor: DescriptorId);
    fn record_reference(&mut self, node: NodeId, kind: ReferenceKind, descriptor: DescriptorId);
    fn record_expression_type(&mut self, node: NodeId, ty: Type);
    fn record_type_reference(&mut self, node: NodeId, ty: Type);
    fn record_backing_field(&mut self, property: DescriptorId);

    fn declaration(&self, node: NodeId) -> Option<DescriptorId>;
    fn reference(&self, node: NodeId) -> Option<DescriptorId>;
    fn expression_type(&self, node: NodeId) -> Option<&Type>;
    fn type_reference(&self, node: NodeId) -> Option<&Type>;
    fn has_backing_field(&self, property: DescriptorId) -> bool;
}

#[derive(Debug, Default)]
pub struct BindingContext {
    declarations: HashMap<NodeId, DescriptorId>,
    references: HashMap<NodeId, (ReferenceKind, DescriptorId)>,
    expression_types: HashMap<NodeId, Type>,
    type_references: HashMap<NodeId, Type>,
    backing_fields: HashSet<DescriptorId>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference_kind(&self, node: NodeId) -> Option<ReferenceKind> {
        self.references.get(&node).map(|(kind, _)| *kind)
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    /// Declaration nodes and their descriptors, ordered by node.
    pub fn declarations(&self) -> Vec<(NodeId, DescriptorId)> {
        let mut entries: Vec<_> = self.declarations.iter().map(|(n, d)| (*n, *d)).collect();
        entries.sort_by_key(|(node, _)| *node);
        entries
    }

    /// Typed expression nodes, ordered by node.
    pub fn expression_types(&self) -> Vec<(NodeId, &Type)> {
        let mut entries: Vec<_> = self.expression_types.iter().map(|(n, t)| (*n, t)).collect();
        entries.sort_by_key(|(node, _)| *node);
        entries
    }

    /// Names of the properties with a backing field, sorted.
    pub fn backing_field_names<'a>(&self, descriptors: &'a DescriptorTable) -> Vec<&'a str> {
        let mut names: Vec<&str> = self
            .backing_fields
            .iter()
            .map(|&id| descriptors.get(id).name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl BindingTrace for BindingContext {
    fn record_declaration(&mut self, node: NodeId, descriptor: DescriptorId) {
        self.declarations.insert(node, descriptor);
    }

    fn record_reference(&mut self, node: NodeId, kind: ReferenceKind, descriptor: DescriptorId) {
        self.references.insert(node, (kind, descriptor));
    }

    fn record_expression_type(&mut self, node: NodeId, ty: Type) {
        self.expression_types.insert(node, ty);
    }

    fn record_type_reference(&mut self, node: NodeId, ty: Type) {
        self.type_references.insert(node, ty);
    }

    fn record_backing_field(&mut self, property: DescriptorId) {
        self.backing_fields.insert(property);
    }

    fn declaration(&self, node: NodeId) -> Option<DescriptorId> {
        self.declarations.get(&node).copied()
    }

    fn reference(&self, node: NodeId) -> Option<DescriptorId> {
        self.references.get(&node).map(|(_, descriptor)| *descriptor)
    }

    fn expression_type(&self, node: NodeId) -> Option<&Type> {
        self.expression_types.get(&node)
    }

    fn type_reference(&self, node: NodeId) -> Option<&Type> {
        self.type_references.get(&node)
    }

    fn has_backing_field(&self, property: DescriptorId) -> bool {
        self.backing_fields.contains(&property)
    }
}

macro_rules! forward_binding_trace {
    () => {
        fn record_declaration(&mut self, node: NodeId, descriptor: DescriptorId) {
            self.inner.record_declaration(node, descriptor);
        }

        fn record_expression_type(&mut self, node: NodeId, ty: Type) {
            self.inner.record_expression_type(node, ty);
        }

        fn record_type_reference(&mut self, node: NodeId, ty: Type) {
            self.inner.record_type_reference(node, ty);
        }

        fn record_backing_field(&mut self, property: DescriptorId) {
            self.inner.record_backing_field(property);
        }

        fn declaration(&self, node: NodeId) -> Option<DescriptorId> {
            self.inner.declaration(node)
        }

        fn reference(&self, node: NodeId) -> Option<DescriptorId> {
            self.inner.reference(node)
        }

        fn expression_type(&self, node: NodeId) -> Option<&Type> {
            self.inner.expression_type(node)
        }

        fn type_reference(&self, node: NodeId) -> Option<&Type> {
            self.inner.type_reference(node)
        }

        fn has_backing_field(&self, property: DescriptorId) -> bool {
            self.inner.has_backing_field(property)
        }
    };
}

/// Marks `property` as having a backing field when an accessor body reads
/// or writes `$property`.
pub struct FieldAccessTracker<'t> {
    inner: &'t mut dyn BindingTrace,
    property: DescriptorId,
}

impl<'t> FieldAccessTracker<'t> {
    pub fn new(inner: &'t mut dyn BindingTrace, property: DescriptorId) -> Self {
        Self { inner, property }
    }
}

impl BindingTrace for FieldAccessTracker<'_> {
    fn record_reference(&mut self, node: NodeId, kind: ReferenceKind, descriptor: DescriptorId) {
        if kind == ReferenceKind::FieldIdentifier && descriptor == self.property {
            self.inner.record_backing_field(descriptor);
        }
        self.inner.record_reference(node, kind, descriptor);
    }

    forward_binding_trace!();
}

/// Collects `$name` accesses, inside a constructor body, to properties that
/// have no backing field.
pub struct ConstructorFieldGuard<'t> {
    inner: &'t mut dyn BindingTrace,
    violations: Vec<NodeId>,
}

impl<'t> ConstructorFieldGuard<'t> {
    pub fn new(inner: &'t mut dyn BindingTrace) -> Self {
        Self {
            inner,
            violations: Vec::new(),
        }
    }

    pub fn into_violations(self) -> Vec<NodeId> {
        self.violations
    }
}

impl BindingTrace for ConstructorFieldGuard<'_> {
    fn record_reference(&mut self, node: NodeId, kind: ReferenceKind, descriptor: DescriptorId) {
        if kind == ReferenceKind::FieldIdentifier && !self.inner.has_backing_field(descriptor) {
            self.violations.push(node);
        }
        self.inner.record_reference(node, kind, descriptor);
    }

    forward_binding_trace!();
}
