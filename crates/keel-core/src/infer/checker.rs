use std::collections::HashSet;

use super::TypeChecker;
use crate::semantic::{DescriptorId, SemanticModel};
use crate::types::Type;

/// Subtyping by declared supertypes.
///
/// `Nothing` is below every type and `Any` above every type; error types
/// are compatible in both directions. The only implicit conversion widens
/// `Int` to `Double`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NominalTypeChecker;

impl NominalTypeChecker {
    pub fn new() -> Self {
        Self
    }

    fn class_inherits(
        &self,
        model: &SemanticModel,
        class: DescriptorId,
        target: DescriptorId,
    ) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![class];
        while let Some(current) = pending.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(data) = model.descriptors.class(current) {
                pending.extend(data.supertypes.iter().filter_map(|t| match t {
                    Type::Class { descriptor, .. } => Some(*descriptor),
                    _ => None,
                }));
            }
        }
        false
    }
}

impl TypeChecker for NominalTypeChecker {
    fn is_subtype_of(&self, model: &SemanticModel, subtype: &Type, supertype: &Type) -> bool {
        if subtype.is_error() || supertype.is_error() || subtype == supertype {
            return true;
        }
        match (subtype, supertype) {
            (Type::Nothing, _) | (_, Type::Any) => true,
            (Type::Class { descriptor: sub, .. }, Type::Class { descriptor: sup, .. }) => {
                self.class_inherits(model, *sub, *sup)
            }
            _ => false,
        }
    }

    fn is_convertible_to(&self, model: &SemanticModel, actual: &Type, expected: &Type) -> bool {
        self.is_subtype_of(model, actual, expected)
            || matches!((actual, expected), (Type::Int, Type::Double))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{ClassBuilder, ClassSlot, DescriptorKind, ScopeKind};

    fn class(model: &mut SemanticModel, name: &str, supertypes: Vec<Type>) -> Type {
        let root = model.root_scope();
        let members = model.scopes.create_scope(ScopeKind::Class, Some(root), None);
        let mut builder = ClassBuilder::new(members, root);
        builder.set_supertypes(supertypes);
        let id = model.descriptors.alloc(
            name,
            None,
            DescriptorKind::Class(ClassSlot::UnderConstruction(builder)),
        );
        model.descriptors.class_default_type(id)
    }

    #[test]
    fn nothing_and_any_bound_every_type() {
        let model = SemanticModel::new();
        let checker = NominalTypeChecker::new();

        assert!(checker.is_subtype_of(&model, &Type::Nothing, &Type::Int));
        assert!(checker.is_subtype_of(&model, &Type::String, &Type::Any));
        assert!(!checker.is_subtype_of(&model, &Type::Any, &Type::String));
        assert!(!checker.is_subtype_of(&model, &Type::Int, &Type::Boolean));
    }

    #[test]
    fn classes_are_subtypes_of_transitive_supertypes() {
        let mut model = SemanticModel::new();
        let checker = NominalTypeChecker::new();
        let shape = class(&mut model, "Shape", vec![Type::Any]);
        let polygon = class(&mut model, "Polygon", vec![shape.clone()]);
        let square = class(&mut model, "Square", vec![polygon.clone()]);
        let circle = class(&mut model, "Circle", vec![shape.clone()]);

        assert!(checker.is_subtype_of(&model, &square, &shape));
        assert!(checker.is_subtype_of(&model, &square, &polygon));
        assert!(!checker.is_subtype_of(&model, &circle, &polygon));
        assert!(!checker.is_subtype_of(&model, &shape, &square));
    }

    #[test]
    fn error_types_are_compatible_with_everything() {
        let model = SemanticModel::new();
        let checker = NominalTypeChecker::new();
        let error = Type::error("Unresolved type: Missing");

        assert!(checker.is_subtype_of(&model, &error, &Type::Int));
        assert!(checker.is_convertible_to(&model, &Type::String, &error));
    }

    #[test]
    fn int_widens_to_double_but_not_back() {
        let model = SemanticModel::new();
        let checker = NominalTypeChecker::new();

        assert!(checker.is_convertible_to(&model, &Type::Int, &Type::Double));
        assert!(!checker.is_convertible_to(&model, &Type::Double, &Type::Int));
        assert!(!checker.is_subtype_of(&model, &Type::Int, &Type::Double));
    }
}
