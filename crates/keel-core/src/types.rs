//! Type values attached to expressions, properties and signatures.

use std::fmt;

use crate::semantic::descriptor::DescriptorId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    Nothing,
    Unit,
    Int,
    Double,
    Boolean,
    String,
    /// Default type of a class.
    Class {
        descriptor: DescriptorId,
        name: String,
    },
    /// Type of a namespace used as an expression (`import ns.*`).
    Namespace {
        descriptor: DescriptorId,
        name: String,
    },
    /// Stands in for a type that could not be determined; compatible with
    /// everything so one failure does not cascade.
    Error(String),
}

impl Type {
    pub const BUILTIN_NAMES: [&'static str; 7] =
        ["Any", "Nothing", "Unit", "Int", "Double", "Boolean", "String"];

    pub fn error(message: impl Into<String>) -> Self {
        Type::Error(message.into())
    }

    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "Any" => Some(Type::Any),
            "Nothing" => Some(Type::Nothing),
            "Unit" => Some(Type::Unit),
            "Int" => Some(Type::Int),
            "Double" => Some(Type::Double),
            "Boolean" => Some(Type::Boolean),
            "String" => Some(Type::String),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    /// The class or namespace behind this type, if it has members.
    pub fn descriptor(&self) -> Option<DescriptorId> {
        match self {
            Type::Class { descriptor, .. } | Type::Namespace { descriptor, .. } => {
                Some(*descriptor)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => f.write_str("Any"),
            Type::Nothing => f.write_str("Nothing"),
            Type::Unit => f.write_str("Unit"),
            Type::Int => f.write_str("Int"),
            Type::Double => f.write_str("Double"),
            Type::Boolean => f.write_str("Boolean"),
            Type::String => f.write_str("String"),
            Type::Class { name, .. } => f.write_str(name),
            Type::Namespace { name, .. } => write!(f, "namespace {name}"),
            Type::Error(message) => write!(f, "[ERROR : {message}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_builtin_name() {
        for name in Type::BUILTIN_NAMES {
            let ty = Type::builtin(name).unwrap();
            assert_eq!(ty.to_string(), name);
        }
        assert_eq!(Type::builtin("Circle"), None);
    }

    #[test]
    fn error_type_displays_its_message() {
        let ty = Type::error("Unable to infer body type");
        assert!(ty.is_error());
        assert_eq!(ty.to_string(), "[ERROR : Unable to infer body type]");
    }

    #[test]
    fn only_int_and_double_are_numeric() {
        assert!(Type::Int.is_numeric());
        assert!(Type::Double.is_numeric());
        assert!(!Type::String.is_numeric());
        assert!(!Type::error("x").is_numeric());
    }
}
