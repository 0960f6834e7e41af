//! Fixed registry of schema object classes and their field layouts.
//!
//! Every class has a static descriptor: its display name, naming rule, layer
//! routing, and the ordered field tuple. Field positions are stable; new fields
//! are only ever appended so that older tuples can be padded (see
//! [`crate::upgrade_schema`]).

use std::fmt;

use common::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use types::{ObjectId, Value};

/// Index of the `name` field, shared by every class.
pub const NAME_FIELD: usize = 0;

/// Closed set of schema object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaClass {
    Module,
    PseudoType,
    ScalarType,
    ObjectType,
    Function,
    Operator,
    Cast,
    Constraint,
    Link,
    Property,
    Index,
    Annotation,
    GlobalVariable,
    Migration,
    Extension,
    ExtensionPackage,
    Role,
}

/// Field metadata: stable position, reducibility, and whether it holds references.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub index: usize,
    pub reducible: bool,
    pub object_ref: bool,
}

const fn plain(name: &'static str, index: usize) -> FieldDescriptor {
    FieldDescriptor {
        name,
        index,
        reducible: false,
        object_ref: false,
    }
}

const fn reference(name: &'static str, index: usize) -> FieldDescriptor {
    FieldDescriptor {
        name,
        index,
        reducible: true,
        object_ref: true,
    }
}

/// Static description of one class.
#[derive(Debug)]
pub struct ClassDescriptor {
    pub class: SchemaClass,
    pub display_name: &'static str,
    /// Named `module::name` and unique store-wide; otherwise unique per `(class, name)`.
    pub qualified: bool,
    /// Lives in the session-wide global layer of a layered view.
    pub layer_global: bool,
    /// Hidden from object listings by default.
    pub internal: bool,
    /// Participates in the short-name overload index.
    pub overloaded: bool,
    pub fields: &'static [FieldDescriptor],
}

impl ClassDescriptor {
    pub fn field(&self, name: &str) -> SchemaResult<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name).ok_or_else(|| {
            SchemaError::internal(format!(
                "{} has no field '{name}'",
                self.display_name
            ))
        })
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn reference_fields(&self) -> impl Iterator<Item = &'static FieldDescriptor> + use<> {
        self.fields.iter().filter(|f| f.object_ref)
    }
}

static MODULE_FIELDS: [FieldDescriptor; 2] = [plain("name", 0), plain("builtin", 1)];

static PSEUDO_TYPE_FIELDS: [FieldDescriptor; 2] = [plain("name", 0), plain("builtin", 1)];

static SCALAR_TYPE_FIELDS: [FieldDescriptor; 6] = [
    plain("name", 0),
    plain("builtin", 1),
    plain("abstract", 2),
    reference("bases", 3),
    reference("ancestors", 4),
    reference("default", 5),
];

static OBJECT_TYPE_FIELDS: [FieldDescriptor; 6] = [
    plain("name", 0),
    plain("builtin", 1),
    plain("abstract", 2),
    reference("bases", 3),
    reference("ancestors", 4),
    reference("pointers", 5),
];

static FUNCTION_FIELDS: [FieldDescriptor; 6] = [
    plain("name", 0),
    plain("builtin", 1),
    reference("params", 2),
    reference("return_type", 3),
    plain("volatility", 4),
    reference("body", 5),
];

static OPERATOR_FIELDS: [FieldDescriptor; 5] = [
    plain("name", 0),
    plain("builtin", 1),
    reference("params", 2),
    reference("return_type", 3),
    plain("operator_kind", 4),
];

static CAST_FIELDS: [FieldDescriptor; 6] = [
    plain("name", 0),
    plain("builtin", 1),
    reference("from_type", 2),
    reference("to_type", 3),
    plain("allow_implicit", 4),
    plain("allow_assignment", 5),
];

static CONSTRAINT_FIELDS: [FieldDescriptor; 7] = [
    plain("name", 0),
    plain("builtin", 1),
    plain("abstract", 2),
    reference("bases", 3),
    reference("ancestors", 4),
    reference("subject", 5),
    reference("expr", 6),
];

static POINTER_FIELDS: [FieldDescriptor; 8] = [
    plain("name", 0),
    plain("builtin", 1),
    plain("abstract", 2),
    reference("bases", 3),
    reference("ancestors", 4),
    reference("source", 5),
    reference("target", 6),
    plain("cardinality", 7),
];

static INDEX_FIELDS: [FieldDescriptor; 4] = [
    plain("name", 0),
    plain("builtin", 1),
    reference("subject", 2),
    reference("expr", 3),
];

static ANNOTATION_FIELDS: [FieldDescriptor; 3] =
    [plain("name", 0), plain("builtin", 1), plain("inheritable", 2)];

static GLOBAL_VARIABLE_FIELDS: [FieldDescriptor; 4] = [
    plain("name", 0),
    plain("builtin", 1),
    reference("target", 2),
    reference("default", 3),
];

static MIGRATION_FIELDS: [FieldDescriptor; 5] = [
    plain("name", 0),
    plain("builtin", 1),
    reference("parents", 2),
    plain("script", 3),
    plain("message", 4),
];

static EXTENSION_FIELDS: [FieldDescriptor; 3] =
    [plain("name", 0), plain("builtin", 1), reference("package", 2)];

static EXTENSION_PACKAGE_FIELDS: [FieldDescriptor; 4] = [
    plain("name", 0),
    plain("builtin", 1),
    plain("version", 2),
    plain("script", 3),
];

static ROLE_FIELDS: [FieldDescriptor; 4] = [
    plain("name", 0),
    plain("builtin", 1),
    plain("superuser", 2),
    reference("member_of", 3),
];

macro_rules! descriptor {
    ($static_name:ident, $class:ident, $display:literal, $fields:ident,
     qualified: $q:literal, layer_global: $g:literal, internal: $i:literal, overloaded: $o:literal) => {
        static $static_name: ClassDescriptor = ClassDescriptor {
            class: SchemaClass::$class,
            display_name: $display,
            qualified: $q,
            layer_global: $g,
            internal: $i,
            overloaded: $o,
            fields: &$fields,
        };
    };
}

descriptor!(MODULE, Module, "module", MODULE_FIELDS,
    qualified: false, layer_global: false, internal: false, overloaded: false);
descriptor!(PSEUDO_TYPE, PseudoType, "pseudo type", PSEUDO_TYPE_FIELDS,
    qualified: false, layer_global: false, internal: false, overloaded: false);
descriptor!(SCALAR_TYPE, ScalarType, "scalar type", SCALAR_TYPE_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(OBJECT_TYPE, ObjectType, "object type", OBJECT_TYPE_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(FUNCTION, Function, "function", FUNCTION_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: true);
descriptor!(OPERATOR, Operator, "operator", OPERATOR_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: true);
descriptor!(CAST, Cast, "cast", CAST_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(CONSTRAINT, Constraint, "constraint", CONSTRAINT_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(LINK, Link, "link", POINTER_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(PROPERTY, Property, "property", POINTER_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(INDEX, Index, "index", INDEX_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(ANNOTATION, Annotation, "annotation", ANNOTATION_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(GLOBAL_VARIABLE, GlobalVariable, "global", GLOBAL_VARIABLE_FIELDS,
    qualified: true, layer_global: false, internal: false, overloaded: false);
descriptor!(MIGRATION, Migration, "migration", MIGRATION_FIELDS,
    qualified: false, layer_global: false, internal: false, overloaded: false);
descriptor!(EXTENSION, Extension, "extension", EXTENSION_FIELDS,
    qualified: false, layer_global: false, internal: false, overloaded: false);
descriptor!(EXTENSION_PACKAGE, ExtensionPackage, "extension package", EXTENSION_PACKAGE_FIELDS,
    qualified: false, layer_global: true, internal: true, overloaded: false);
descriptor!(ROLE, Role, "role", ROLE_FIELDS,
    qualified: false, layer_global: true, internal: false, overloaded: false);

impl SchemaClass {
    pub const ALL: [SchemaClass; 17] = [
        SchemaClass::Module,
        SchemaClass::PseudoType,
        SchemaClass::ScalarType,
        SchemaClass::ObjectType,
        SchemaClass::Function,
        SchemaClass::Operator,
        SchemaClass::Cast,
        SchemaClass::Constraint,
        SchemaClass::Link,
        SchemaClass::Property,
        SchemaClass::Index,
        SchemaClass::Annotation,
        SchemaClass::GlobalVariable,
        SchemaClass::Migration,
        SchemaClass::Extension,
        SchemaClass::ExtensionPackage,
        SchemaClass::Role,
    ];

    pub fn descriptor(self) -> &'static ClassDescriptor {
        match self {
            SchemaClass::Module => &MODULE,
            SchemaClass::PseudoType => &PSEUDO_TYPE,
            SchemaClass::ScalarType => &SCALAR_TYPE,
            SchemaClass::ObjectType => &OBJECT_TYPE,
            SchemaClass::Function => &FUNCTION,
            SchemaClass::Operator => &OPERATOR,
            SchemaClass::Cast => &CAST,
            SchemaClass::Constraint => &CONSTRAINT,
            SchemaClass::Link => &LINK,
            SchemaClass::Property => &PROPERTY,
            SchemaClass::Index => &INDEX,
            SchemaClass::Annotation => &ANNOTATION,
            SchemaClass::GlobalVariable => &GLOBAL_VARIABLE,
            SchemaClass::Migration => &MIGRATION,
            SchemaClass::Extension => &EXTENSION,
            SchemaClass::ExtensionPackage => &EXTENSION_PACKAGE,
            SchemaClass::Role => &ROLE,
        }
    }

    pub fn display_name(self) -> &'static str {
        self.descriptor().display_name
    }

    pub fn is_qualified(self) -> bool {
        self.descriptor().qualified
    }

    pub fn is_layer_global(self) -> bool {
        self.descriptor().layer_global
    }

    pub fn field(self, name: &str) -> SchemaResult<&'static FieldDescriptor> {
        self.descriptor().field(name)
    }
}

impl fmt::Display for SchemaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Live handle to a schema object: its identity and class, no data.
///
/// Field data is always read through a schema snapshot, so the same handle is
/// valid against every snapshot that contains the object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Object {
    pub id: ObjectId,
    pub class: SchemaClass,
}

impl Object {
    pub fn new(id: ObjectId, class: SchemaClass) -> Self {
        Self { id, class }
    }

    /// Rebuild a handle from its stored identity.
    pub fn restore(class: SchemaClass, id: ObjectId) -> Self {
        Self { id, class }
    }

    pub fn descriptor(&self) -> &'static ClassDescriptor {
        self.class.descriptor()
    }
}

/// In-memory form of a field value before reduction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveValue {
    Plain(Value),
    Object(Object),
    Objects(Vec<Object>),
    NamedObjects(Vec<(String, Object)>),
    Expression { text: String, refs: Vec<Object> },
}

impl LiveValue {
    pub fn null() -> Self {
        LiveValue::Plain(Value::Null)
    }

    /// Collapse object handles into stored identifiers.
    pub fn reduce(self) -> Value {
        match self {
            LiveValue::Plain(value) => value,
            LiveValue::Object(obj) => Value::ObjectRef(obj.id),
            LiveValue::Objects(objs) => Value::ObjectList(objs.iter().map(|o| o.id).collect()),
            LiveValue::NamedObjects(entries) => Value::ObjectDict(
                entries
                    .into_iter()
                    .map(|(name, obj)| (name, obj.id))
                    .collect(),
            ),
            LiveValue::Expression { text, refs } => Value::Expression {
                text,
                refs: refs.iter().map(|o| o.id).collect(),
            },
        }
    }

    /// Value for a field that is stored as-is.
    pub(crate) fn into_plain(self, field: &FieldDescriptor) -> SchemaResult<Value> {
        match self {
            LiveValue::Plain(value) => Ok(value),
            other => Err(SchemaError::internal(format!(
                "field '{}' is not reducible, got {other:?}",
                field.name
            ))),
        }
    }

    /// Store-ready value for `field`.
    pub(crate) fn prepare(self, field: &FieldDescriptor) -> SchemaResult<Value> {
        if field.reducible {
            Ok(self.reduce())
        } else {
            self.into_plain(field)
        }
    }
}

impl From<Value> for LiveValue {
    fn from(value: Value) -> Self {
        LiveValue::Plain(value)
    }
}

impl From<Object> for LiveValue {
    fn from(value: Object) -> Self {
        LiveValue::Object(value)
    }
}

impl From<Vec<Object>> for LiveValue {
    fn from(value: Vec<Object>) -> Self {
        LiveValue::Objects(value)
    }
}

impl From<bool> for LiveValue {
    fn from(value: bool) -> Self {
        LiveValue::Plain(Value::Bool(value))
    }
}

impl From<&str> for LiveValue {
    fn from(value: &str) -> Self {
        LiveValue::Plain(Value::Text(value.to_string()))
    }
}

impl From<types::Name> for LiveValue {
    fn from(value: types::Name) -> Self {
        LiveValue::Plain(Value::Name(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_starts_with_name_field() {
        for class in SchemaClass::ALL {
            let desc = class.descriptor();
            assert_eq!(desc.class, class);
            assert_eq!(desc.fields[NAME_FIELD].name, "name");
            for (pos, field) in desc.fields.iter().enumerate() {
                assert_eq!(field.index, pos, "{class}: {}", field.name);
            }
        }
    }

    #[test]
    fn routing_tags_match_class_kinds() {
        assert!(SchemaClass::Function.descriptor().overloaded);
        assert!(SchemaClass::Function.is_qualified());
        assert!(!SchemaClass::Module.is_qualified());
        assert!(SchemaClass::Role.is_layer_global());
        assert!(!SchemaClass::Migration.is_layer_global());
    }

    #[test]
    fn reduce_collapses_handles_to_ids() {
        let a = Object::new(ObjectId::from_u128(1), SchemaClass::ScalarType);
        let b = Object::new(ObjectId::from_u128(2), SchemaClass::ScalarType);
        assert_eq!(LiveValue::from(a).reduce(), Value::ObjectRef(a.id));
        assert_eq!(
            LiveValue::from(vec![a, b]).reduce(),
            Value::ObjectList(vec![a.id, b.id])
        );
    }

    #[test]
    fn plain_fields_reject_object_handles() {
        let field = SchemaClass::Cast.field("allow_implicit").unwrap();
        let obj = Object::new(ObjectId::from_u128(1), SchemaClass::Cast);
        let err = LiveValue::from(obj).prepare(field).unwrap_err();
        assert!(err.is_internal());
    }
}
