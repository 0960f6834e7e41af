mod name;

pub use name::{Name, PATH_SEPARATOR, SIGNATURE_SEPARATOR};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique identifier of a schema object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored (reduced) representation of a single schema field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Name(Name),
    ObjectRef(ObjectId),
    ObjectList(Vec<ObjectId>),
    ObjectDict(Vec<(String, ObjectId)>),
    Expression { text: String, refs: Vec<ObjectId> },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Identifiers of every object this value refers to.
    pub fn object_refs(&self) -> Vec<ObjectId> {
        match self {
            Value::ObjectRef(id) => vec![*id],
            Value::ObjectList(ids) => ids.clone(),
            Value::ObjectDict(entries) => entries.iter().map(|(_, id)| *id).collect(),
            Value::Expression { refs, .. } => refs.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Name> for Value {
    fn from(value: Name) -> Self {
        Value::Name(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_refs_cover_every_reference_shape() {
        let a = ObjectId::from_u128(1);
        let b = ObjectId::from_u128(2);

        assert_eq!(Value::ObjectRef(a).object_refs(), vec![a]);
        assert_eq!(Value::ObjectList(vec![a, b]).object_refs(), vec![a, b]);
        assert_eq!(
            Value::ObjectDict(vec![("x".into(), b)]).object_refs(),
            vec![b]
        );
        assert_eq!(
            Value::Expression {
                text: "a + b".into(),
                refs: vec![a]
            }
            .object_refs(),
            vec![a]
        );
        assert!(Value::Text("a".into()).object_refs().is_empty());
        assert!(Value::Null.object_refs().is_empty());
    }

    #[test]
    fn values_serialize_through_json() {
        let value = Value::Name(Name::qualified("std", "str"));
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
