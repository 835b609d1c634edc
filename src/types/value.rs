use std::hash::{Hash, Hasher};

use crate::types::structure::StructValue;

/// Native value form handled by the marshaling layer.
///
/// Collection members are plain `Value`s; struct members live behind a
/// [`StructValue`] so field lookup goes through the owning definition's
/// name table.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    List(Vec<Value>),
    Bag(Vec<Value>),
    Struct(StructValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short kind label used in decode error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Bag(_) => "bag",
            Value::Struct(_) => "struct",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

// Reals are compared and hashed by bit pattern so Value has a total
// equivalence usable as a map key (struct values hash their members).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Bag(a), Value::Bag(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Real(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
            Value::List(v) | Value::Bag(v) => v.hash(state),
            Value::Struct(v) => v.hash(state),
        }
    }
}

/// Size-accountable string form of a value.
///
/// Mirrors the shape of the source value: primitives and custom values
/// become atoms, collections become a same-shaped sequence, and an absent
/// nullable becomes an explicit absence marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringForm {
    /// Absent nullable value
    Absent,
    /// Rendered primitive or custom value
    Atom(String),
    /// Same-shaped collection or struct member forms
    Seq(Vec<StringForm>),
}

impl StringForm {
    /// Additive cost of this form: atom length, sum over members, 0 for absent
    pub fn size(&self) -> u64 {
        match self {
            StringForm::Absent => 0,
            StringForm::Atom(s) => s.len() as u64,
            StringForm::Seq(members) => members.iter().map(StringForm::size).sum(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            StringForm::Absent => "absent",
            StringForm::Atom(_) => "atom",
            StringForm::Seq(_) => "sequence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_real_equality_by_bits() {
        assert_eq!(Value::Real(1.5), Value::Real(1.5));
        assert_ne!(Value::Real(0.0), Value::Real(-0.0));
        assert_eq!(Value::Real(f64::NAN), Value::Real(f64::NAN));
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        let a = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        let b = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_string_form_size() {
        let form = StringForm::Seq(vec![
            StringForm::Atom("ab".into()),
            StringForm::Absent,
            StringForm::Seq(vec![StringForm::Atom("cde".into())]),
        ]);
        assert_eq!(form.size(), 5);
        assert_eq!(StringForm::Absent.size(), 0);
        assert_eq!(StringForm::Seq(vec![]).size(), 0);
    }
}
