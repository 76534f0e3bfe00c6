use std::fmt;

use serde::Serialize;

/// A resolved Patakha type.
///
/// Primitives plus named record types (struct / kaksha, equivalent by name)
/// and fixed-length arrays. `Unknown` is the pre-analysis placeholder and the
/// type of error nodes; semantic analysis replaces it on every well-formed
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Ty {
    /// `bhai` -- 64-bit signed integer.
    Int,
    /// `decimal` -- 64-bit float.
    Float,
    /// `bool`.
    Bool,
    /// `text`.
    Str,
    /// `khali` -- void, only valid as a return type.
    Void,
    /// A named struct / kaksha type.
    Record(String),
    /// Fixed-length array, e.g. `bhai[5]`.
    Array(Box<Ty>, u32),
    /// Not yet analyzed, or part of an erroneous subtree.
    Unknown,
}

impl Ty {
    /// Whether this is `bhai` or `decimal`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float)
    }

    /// Whether values of this type can be compared with `==` / `!=`.
    pub fn is_equatable(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float | Ty::Bool | Ty::Str)
    }

    /// Whether this type is usable as a `switch` discriminant or case label.
    pub fn is_switchable(&self) -> bool {
        matches!(self, Ty::Int | Ty::Bool | Ty::Str)
    }

    /// Unknown types poison whatever contains them; checks short-circuit on
    /// them instead of cascading errors.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Ty::Unknown)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "bhai"),
            Ty::Float => write!(f, "decimal"),
            Ty::Bool => write!(f, "bool"),
            Ty::Str => write!(f, "text"),
            Ty::Void => write!(f, "khali"),
            Ty::Record(name) => write!(f, "{name}"),
            Ty::Array(elem, len) => write!(f, "{elem}[{len}]"),
            Ty::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_surface_names() {
        assert_eq!(Ty::Int.to_string(), "bhai");
        assert_eq!(Ty::Float.to_string(), "decimal");
        assert_eq!(Ty::Str.to_string(), "text");
        assert_eq!(Ty::Void.to_string(), "khali");
        assert_eq!(Ty::Record("Point".into()).to_string(), "Point");
        assert_eq!(Ty::Array(Box::new(Ty::Int), 5).to_string(), "bhai[5]");
    }

    #[test]
    fn classification() {
        assert!(Ty::Int.is_numeric());
        assert!(Ty::Float.is_numeric());
        assert!(!Ty::Bool.is_numeric());
        assert!(Ty::Str.is_equatable());
        assert!(!Ty::Record("P".into()).is_equatable());
        assert!(Ty::Str.is_switchable());
        assert!(!Ty::Float.is_switchable());
    }
}
