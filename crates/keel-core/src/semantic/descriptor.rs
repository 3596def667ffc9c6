//! Descriptors: the resolved entities the analyzer produces.
//!
//! All descriptors live in one [`DescriptorTable`] arena and refer to each
//! other by [`DescriptorId`]. Classes start out as a [`ClassBuilder`] while
//! supertypes and constructors are being attached and are frozen into a
//! [`ClassDescriptor`] by [`DescriptorTable::finalize_classes`] before any
//! body is resolved.

use id_arena::{Arena, Id};

use super::scope::ScopeId;
use crate::error::AnalysisError;
use crate::types::Type;

pub type DescriptorId = Id<Descriptor>;

#[derive(Debug, Clone)]
pub struct Descriptor {
    pub id: DescriptorId,
    pub name: String,
    pub container: Option<DescriptorId>,
    pub kind: DescriptorKind,
}

#[derive(Debug, Clone)]
pub enum DescriptorKind {
    Namespace(NamespaceDescriptor),
    Class(ClassSlot),
    Constructor(FunctionDescriptor),
    Function(FunctionDescriptor),
    Property(PropertyDescriptor),
    Variable(VariableDescriptor),
}

impl DescriptorKind {
    pub fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Namespace(_) => "namespace",
            DescriptorKind::Class(_) => "class",
            DescriptorKind::Constructor(_) => "constructor",
            DescriptorKind::Function(_) => "function",
            DescriptorKind::Property(_) => "property",
            DescriptorKind::Variable(_) => "variable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamespaceDescriptor {
    pub member_scope: ScopeId,
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub member_scope: ScopeId,
    pub declaring_scope: ScopeId,
    pub supertypes: Vec<Type>,
    pub constructors: Vec<DescriptorId>,
    pub primary_constructor: Option<DescriptorId>,
}

#[derive(Debug, Clone)]
pub struct ClassBuilder {
    data: ClassData,
}

impl ClassBuilder {
    pub fn new(member_scope: ScopeId, declaring_scope: ScopeId) -> Self {
        Self {
            data: ClassData {
                member_scope,
                declaring_scope,
                supertypes: Vec::new(),
                constructors: Vec::new(),
                primary_constructor: None,
            },
        }
    }

    pub fn set_supertypes(&mut self, supertypes: Vec<Type>) {
        self.data.supertypes = supertypes;
    }

    pub fn add_constructor(&mut self, constructor: DescriptorId) {
        self.data.constructors.push(constructor);
    }

    pub fn set_primary_constructor(&mut self, constructor: DescriptorId) {
        self.data.primary_constructor = Some(constructor);
        self.data.constructors.push(constructor);
    }

    pub fn data(&self) -> &ClassData {
        &self.data
    }

    pub fn build(self) -> ClassDescriptor {
        ClassDescriptor { data: self.data }
    }
}

/// Immutable class descriptor; only readable.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    data: ClassData,
}

impl ClassDescriptor {
    pub fn data(&self) -> &ClassData {
        &self.data
    }
}

#[derive(Debug, Clone)]
pub enum ClassSlot {
    UnderConstruction(ClassBuilder),
    Finalized(ClassDescriptor),
}

impl ClassSlot {
    pub fn data(&self) -> &ClassData {
        match self {
            ClassSlot::UnderConstruction(builder) => builder.data(),
            ClassSlot::Finalized(class) => class.data(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, ClassSlot::Finalized(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    Plain,
    Getter,
    Setter,
    PrimaryConstructor,
    SecondaryConstructor,
}

#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub role: FunctionRole,
    pub parameters: Vec<DescriptorId>,
    /// Declared, or filled in by body resolution.
    pub return_type: Option<Type>,
}

impl FunctionDescriptor {
    pub fn new(role: FunctionRole) -> Self {
        Self {
            role,
            parameters: Vec::new(),
            return_type: None,
        }
    }

    pub fn is_return_type_set(&self) -> bool {
        self.return_type.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub mutable: bool,
    pub ty: Option<Type>,
    pub getter: Option<DescriptorId>,
    pub setter: Option<DescriptorId>,
}

#[derive(Debug, Clone)]
pub struct VariableDescriptor {
    pub ty: Option<Type>,
    pub mutable: bool,
}

#[derive(Debug, Default)]
pub struct DescriptorTable {
    arena: Arena<Descriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(
        &mut self,
        name: impl Into<String>,
        container: Option<DescriptorId>,
        kind: DescriptorKind,
    ) -> DescriptorId {
        let name = name.into();
        self.arena.alloc_with_id(|id| Descriptor {
            id,
            name,
            container,
            kind,
        })
    }

    pub fn get(&self, id: DescriptorId) -> &Descriptor {
        &self.arena[id]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.arena.iter().map(|(_, descriptor)| descriptor)
    }

    pub fn namespace(&self, id: DescriptorId) -> Option<&NamespaceDescriptor> {
        match &self.arena[id].kind {
            DescriptorKind::Namespace(namespace) => Some(namespace),
            _ => None,
        }
    }

    pub fn class(&self, id: DescriptorId) -> Option<&ClassData> {
        match &self.arena[id].kind {
            DescriptorKind::Class(slot) => Some(slot.data()),
            _ => None,
        }
    }

    pub fn class_slot(&self, id: DescriptorId) -> Option<&ClassSlot> {
        match &self.arena[id].kind {
            DescriptorKind::Class(slot) => Some(slot),
            _ => None,
        }
    }

    /// Mutable access to a class that has not been finalized yet.
    pub fn class_builder_mut(&mut self, id: DescriptorId) -> Result<&mut ClassBuilder, AnalysisError> {
        let name = self.arena[id].name.clone();
        match &mut self.arena[id].kind {
            DescriptorKind::Class(ClassSlot::UnderConstruction(builder)) => Ok(builder),
            DescriptorKind::Class(ClassSlot::Finalized(_)) => Err(AnalysisError::internal(
                format!("class `{name}` modified after finalization"),
            )),
            other => Err(AnalysisError::internal(format!(
                "`{name}` is a {}, not a class",
                other.name()
            ))),
        }
    }

    /// Freezes every class builder. Idempotent.
    pub fn finalize_classes(&mut self) -> usize {
        let mut finalized = 0;
        for (_, descriptor) in self.arena.iter_mut() {
            if let DescriptorKind::Class(slot) = &mut descriptor.kind {
                if let ClassSlot::UnderConstruction(builder) = slot {
                    *slot = ClassSlot::Finalized(builder.clone().build());
                    finalized += 1;
                }
            }
        }
        finalized
    }

    /// The type of a class used without type arguments.
    pub fn class_default_type(&self, id: DescriptorId) -> Type {
        Type::Class {
            descriptor: id,
            name: self.arena[id].name.clone(),
        }
    }

    pub fn namespace_type(&self, id: DescriptorId) -> Type {
        Type::Namespace {
            descriptor: id,
            name: self.arena[id].name.clone(),
        }
    }

    /// Scope holding the members of a class or namespace type.
    pub fn member_scope(&self, ty: &Type) -> Option<ScopeId> {
        let id = ty.descriptor()?;
        match &self.arena[id].kind {
            DescriptorKind::Namespace(namespace) => Some(namespace.member_scope),
            DescriptorKind::Class(slot) => Some(slot.data().member_scope),
            _ => None,
        }
    }

    pub fn function(&self, id: DescriptorId) -> Option<&FunctionDescriptor> {
        match &self.arena[id].kind {
            DescriptorKind::Function(function) | DescriptorKind::Constructor(function) => {
                Some(function)
            }
            _ => None,
        }
    }

    pub fn function_mut(&mut self, id: DescriptorId) -> Option<&mut FunctionDescriptor> {
        match &mut self.arena[id].kind {
            DescriptorKind::Function(function) | DescriptorKind::Constructor(function) => {
                Some(function)
            }
            _ => None,
        }
    }

    pub fn property(&self, id: DescriptorId) -> Option<&PropertyDescriptor> {
        match &self.arena[id].kind {
            DescriptorKind::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn property_mut(&mut self, id: DescriptorId) -> Option<&mut PropertyDescriptor> {
        match &mut self.arena[id].kind {
            DescriptorKind::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn variable(&self, id: DescriptorId) -> Option<&VariableDescriptor> {
        match &self.arena[id].kind {
            DescriptorKind::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn variable_mut(&mut self, id: DescriptorId) -> Option<&mut VariableDescriptor> {
        match &mut self.arena[id].kind {
            DescriptorKind::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    /// Type of a variable, property or parameter; `None` while still unknown.
    pub fn value_type(&self, id: DescriptorId) -> Option<&Type> {
        match &self.arena[id].kind {
            DescriptorKind::Variable(variable) => variable.ty.as_ref(),
            DescriptorKind::Property(property) => property.ty.as_ref(),
            _ => None,
        }
    }

    pub fn is_mutable_value(&self, id: DescriptorId) -> bool {
        match &self.arena[id].kind {
            DescriptorKind::Variable(variable) => variable.mutable,
            DescriptorKind::Property(property) => property.mutable,
            _ => false,
        }
    }

    pub fn set_return_type(&mut self, id: DescriptorId, ty: Type) -> Result<(), AnalysisError> {
        let name = self.arena[id].name.clone();
        let function = self
            .function_mut(id)
            .ok_or_else(|| AnalysisError::internal(format!("`{name}` is not a function")))?;
        function.return_type = Some(ty);
        Ok(())
    }

    /// Parameter types of a function or constructor, `Any` when unknown.
    pub fn parameter_types(&self, id: DescriptorId) -> Vec<Type> {
        self.function(id)
            .map(|function| {
                function
                    .parameters
                    .iter()
                    .map(|&p| self.value_type(p).cloned().unwrap_or(Type::Any))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::scope::{ScopeKind, ScopeTree};

    fn class_fixture() -> (DescriptorTable, DescriptorId) {
        let mut scopes = ScopeTree::new();
        let root = scopes.create_scope(ScopeKind::Root, None, None);
        let members = scopes.create_scope(ScopeKind::Class, Some(root), None);
        let mut table = DescriptorTable::new();
        let class = table.alloc(
            "Point",
            None,
            DescriptorKind::Class(ClassSlot::UnderConstruction(ClassBuilder::new(members, root))),
        );
        (table, class)
    }

    #[test]
    fn class_builder_collects_constructors_until_finalized() {
        let (mut table, class) = class_fixture();
        let constructor = table.alloc(
            "<init>",
            Some(class),
            DescriptorKind::Constructor(FunctionDescriptor::new(FunctionRole::PrimaryConstructor)),
        );

        let builder = table.class_builder_mut(class).unwrap();
        builder.set_supertypes(vec![Type::Any]);
        builder.set_primary_constructor(constructor);

        assert_eq!(table.finalize_classes(), 1);
        assert_eq!(table.finalize_classes(), 0);

        let data = table.class(class).unwrap();
        assert_eq!(data.constructors, vec![constructor]);
        assert_eq!(data.primary_constructor, Some(constructor));
        assert_eq!(data.supertypes, vec![Type::Any]);
        assert!(table.class_slot(class).unwrap().is_finalized());
    }

    #[test]
    fn finalized_class_rejects_mutation() {
        let (mut table, class) = class_fixture();
        table.finalize_classes();

        let err = table.class_builder_mut(class).unwrap_err();
        assert!(matches!(err, AnalysisError::Internal { .. }));
        assert!(err.to_string().contains("modified after finalization"));
    }

    #[test]
    fn default_type_points_back_at_class() {
        let (table, class) = class_fixture();
        let ty = table.class_default_type(class);

        assert_eq!(ty.to_string(), "Point");
        assert_eq!(ty.descriptor(), Some(class));
        assert!(table.member_scope(&ty).is_some());
        assert_eq!(table.member_scope(&Type::Int), None);
    }

    #[test]
    fn return_type_can_only_be_set_on_functions() {
        let mut table = DescriptorTable::new();
        let function = table.alloc(
            "f",
            None,
            DescriptorKind::Function(FunctionDescriptor::new(FunctionRole::Plain)),
        );
        let variable = table.alloc(
            "x",
            None,
            DescriptorKind::Variable(VariableDescriptor {
                ty: Some(Type::Int),
                mutable: true,
            }),
        );

        table.set_return_type(function, Type::Unit).unwrap();
        assert!(table.function(function).unwrap().is_return_type_set());
        assert!(table.set_return_type(variable, Type::Unit).is_err());
        assert_eq!(table.value_type(variable), Some(&Type::Int));
        assert!(table.is_mutable_value(variable));
    }
}
