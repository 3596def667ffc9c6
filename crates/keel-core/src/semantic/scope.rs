//! Lexical scopes mapping names to descriptors
//!
//! Scopes live in an arena and form a tree through their read parent. A
//! write-through scope reads through its parent chain but stores every new
//! binding in a target scope, which is how a namespace body populates the
//! namespace's member scope while still seeing the enclosing file.

use std::collections::HashMap;

use id_arena::{Arena, Id};

use super::descriptor::DescriptorId;

pub type ScopeId = Id<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Toplevel,
    Namespace,
    WriteThrough,
    Class,
    Function,
    Accessor,
    Constructor,
    Block,
}

#[derive(Debug, Default)]
struct Bindings {
    classifiers: HashMap<String, DescriptorId>,
    namespaces: HashMap<String, DescriptorId>,
    functions: HashMap<String, Vec<DescriptorId>>,
    variables: HashMap<String, DescriptorId>,
    fields: HashMap<String, DescriptorId>,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Declaration this scope belongs to, if any.
    pub owner: Option<DescriptorId>,
    pub write_target: Option<ScopeId>,
    imports: Vec<ScopeId>,
    bindings: Bindings,
}

pub struct ScopeTree {
    arena: Arena<Scope>,
    root: Option<ScopeId>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        owner: Option<DescriptorId>,
    ) -> ScopeId {
        let id = self.arena.alloc_with_id(|id| Scope {
            id,
            kind,
            parent,
            children: Vec::new(),
            owner,
            write_target: None,
            imports: Vec::new(),
            bindings: Bindings::default(),
        });

        if let Some(parent_id) = parent {
            self.arena[parent_id].children.push(id);
        }

        if self.root.is_none() {
            self.root = Some(id);
        }

        id
    }

    /// Reads through `outer`, writes into `target`.
    pub fn create_write_through(&mut self, outer: ScopeId, target: ScopeId) -> ScopeId {
        let owner = self.arena[target].owner;
        let id = self.create_scope(ScopeKind::WriteThrough, Some(outer), owner);
        self.arena[id].write_target = Some(target);
        id
    }

    pub fn root(&self) -> Option<ScopeId> {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.arena[id]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.arena[id]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub fn parent(&self, id: ScopeId) -> Option<&Scope> {
        self.arena[id].parent.map(|p| &self.arena[p])
    }

    pub fn children(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        self.arena[id].children.iter().map(|&c| &self.arena[c])
    }

    pub fn ancestors(&self, id: ScopeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            current: Some(id),
        }
    }

    pub fn is_descendant_of(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        self.ancestors(scope).any(|s| s.id == ancestor)
    }

    /// Nearest declaration owning `scope` or one of its ancestors.
    pub fn containing_declaration(&self, scope: ScopeId) -> Option<DescriptorId> {
        self.ancestors(scope).find_map(|s| s.owner)
    }

    pub fn set_owner(&mut self, scope: ScopeId, owner: DescriptorId) {
        self.arena[scope].owner = Some(owner);
    }

    /// Scope that actually stores bindings written to `scope`.
    fn storage(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let Some(target) = self.arena[current].write_target {
            current = target;
        }
        current
    }

    fn bindings_mut(&mut self, scope: ScopeId) -> &mut Bindings {
        let storage = self.storage(scope);
        &mut self.arena[storage].bindings
    }

    pub fn add_classifier(&mut self, scope: ScopeId, name: &str, descriptor: DescriptorId) {
        self.bindings_mut(scope)
            .classifiers
            .insert(name.to_string(), descriptor);
    }

    pub fn add_namespace(&mut self, scope: ScopeId, name: &str, descriptor: DescriptorId) {
        self.bindings_mut(scope)
            .namespaces
            .insert(name.to_string(), descriptor);
    }

    pub fn add_function(&mut self, scope: ScopeId, name: &str, descriptor: DescriptorId) {
        self.bindings_mut(scope)
            .functions
            .entry(name.to_string())
            .or_default()
            .push(descriptor);
    }

    /// Variables and properties share one namespace of names.
    pub fn add_variable(&mut self, scope: ScopeId, name: &str, descriptor: DescriptorId) {
        self.bindings_mut(scope)
            .variables
            .insert(name.to_string(), descriptor);
    }

    /// Binds a `$name` backing-field identifier to its property.
    pub fn add_field(&mut self, scope: ScopeId, name: &str, property: DescriptorId) {
        self.bindings_mut(scope)
            .fields
            .insert(name.to_string(), property);
    }

    pub fn import_scope(&mut self, scope: ScopeId, imported: ScopeId) {
        self.arena[scope].imports.push(imported);
    }

    /// Namespace declared directly in `scope` (no parent lookup).
    pub fn declared_namespace(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.local(scope, |b| b.namespaces.get(name).copied())
    }

    pub fn get_classifier(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.lookup(scope, |b| b.classifiers.get(name).copied())
    }

    pub fn get_namespace(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.lookup(scope, |b| b.namespaces.get(name).copied())
    }

    /// Overloads from the nearest scope that declares any function `name`.
    pub fn get_functions(&self, scope: ScopeId, name: &str) -> Vec<DescriptorId> {
        self.lookup(scope, |b| b.functions.get(name).cloned())
            .unwrap_or_default()
    }

    pub fn get_variable(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.lookup(scope, |b| b.variables.get(name).copied())
    }

    pub fn get_field(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.lookup(scope, |b| b.fields.get(name).copied())
    }

    /// Member lookup: the scope's own bindings and imports, no parents.
    pub fn get_member_variable(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.local(scope, |b| b.variables.get(name).copied())
    }

    pub fn get_member_namespace(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.local(scope, |b| b.namespaces.get(name).copied())
    }

    pub fn get_member_classifier(&self, scope: ScopeId, name: &str) -> Option<DescriptorId> {
        self.local(scope, |b| b.classifiers.get(name).copied())
    }

    pub fn get_member_functions(&self, scope: ScopeId, name: &str) -> Vec<DescriptorId> {
        self.local(scope, |b| b.functions.get(name).cloned())
            .unwrap_or_default()
    }

    /// Names of variables bound directly in `scope`, sorted.
    pub fn variable_names(&self, scope: ScopeId) -> Vec<&str> {
        let storage = self.storage(scope);
        let mut names: Vec<&str> = self.arena[storage]
            .bindings
            .variables
            .keys()
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    fn local<T>(&self, scope: ScopeId, pick: impl Fn(&Bindings) -> Option<T>) -> Option<T> {
        let storage = self.storage(scope);
        pick(&self.arena[storage].bindings).or_else(|| {
            self.arena[scope]
                .imports
                .iter()
                .find_map(|&imported| pick(&self.arena[self.storage(imported)].bindings))
        })
    }

    fn lookup<T>(&self, scope: ScopeId, pick: impl Fn(&Bindings) -> Option<T>) -> Option<T> {
        self.ancestors(scope).find_map(|s| self.local(s.id, &pick))
    }
}

pub struct AncestorIter<'a> {
    tree: &'a ScopeTree,
    current: Option<ScopeId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a Scope;

    fn next(&mut self) -> Option<Self::Item> {
        let current_id = self.current?;
        let scope = &self.tree.arena[current_id];
        self.current = scope.parent;
        Some(scope)
    }
}
