//! Common catalog fixtures and tuple builders.
//!
//! Tuple builders produce field tuples in the stored layout of each class.
//! [`SchemaBuilder`] inserts them with fresh ids and panics on failure, which
//! keeps test setup short. [`std_schema`] bootstraps a small standard library.

use catalog::{Object, Schema, SchemaClass};
use types::{Name, ObjectId, Value};

fn name(text: &str) -> Value {
    Value::Name(Name::parse(text))
}

fn refs(objs: &[Object]) -> Value {
    if objs.is_empty() {
        Value::Null
    } else {
        Value::ObjectList(objs.iter().map(|o| o.id).collect())
    }
}

fn reference(obj: Option<Object>) -> Value {
    obj.map_or(Value::Null, |o| Value::ObjectRef(o.id))
}

/// Tuple for a module.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let data = module_data("default");
/// assert_eq!(data.len(), 2);
/// ```
pub fn module_data(module: &str) -> Vec<Value> {
    vec![Value::Name(Name::unqualified(module)), Value::Bool(false)]
}

pub fn pseudo_type_data(ty: &str) -> Vec<Value> {
    vec![Value::Name(Name::unqualified(ty)), Value::Bool(true)]
}

pub fn scalar_data(qualified: &str, bases: &[Object]) -> Vec<Value> {
    vec![
        name(qualified),
        Value::Bool(false),
        Value::Bool(false),
        refs(bases),
        refs(bases),
        Value::Null,
    ]
}

pub fn object_type_data(qualified: &str, bases: &[Object], pointers: &[Object]) -> Vec<Value> {
    vec![
        name(qualified),
        Value::Bool(false),
        Value::Bool(false),
        refs(bases),
        refs(bases),
        refs(pointers),
    ]
}

/// Tuple for a function overload named `module::short@signature`.
pub fn function_data(fullname: &str, params: &[Object], return_type: Object) -> Vec<Value> {
    vec![
        name(fullname),
        Value::Bool(false),
        refs(params),
        Value::ObjectRef(return_type.id),
        Value::Text("Immutable".into()),
        Value::Null,
    ]
}

pub fn operator_data(fullname: &str, params: &[Object], return_type: Object) -> Vec<Value> {
    vec![
        name(fullname),
        Value::Bool(false),
        refs(params),
        Value::ObjectRef(return_type.id),
        Value::Text("Infix".into()),
    ]
}

pub fn cast_data(
    qualified: &str,
    from: Object,
    to: Object,
    implicit: bool,
    assignment: bool,
) -> Vec<Value> {
    vec![
        name(qualified),
        Value::Bool(false),
        Value::ObjectRef(from.id),
        Value::ObjectRef(to.id),
        Value::Bool(implicit),
        Value::Bool(assignment),
    ]
}

pub fn property_data(qualified: &str, source: Option<Object>, target: Option<Object>) -> Vec<Value> {
    vec![
        name(qualified),
        Value::Bool(false),
        Value::Bool(false),
        Value::Null,
        Value::Null,
        reference(source),
        reference(target),
        Value::Text("One".into()),
    ]
}

pub fn annotation_data(qualified: &str) -> Vec<Value> {
    vec![name(qualified), Value::Bool(false), Value::Bool(false)]
}

pub fn migration_data(migration: &str, parents: &[Object]) -> Vec<Value> {
    vec![
        Value::Name(Name::unqualified(migration)),
        Value::Bool(false),
        refs(parents),
        Value::Text(String::new()),
        Value::Null,
    ]
}

pub fn role_data(role: &str, member_of: &[Object]) -> Vec<Value> {
    vec![
        Value::Name(Name::unqualified(role)),
        Value::Bool(false),
        Value::Bool(false),
        refs(member_of),
    ]
}

pub fn extension_package_data(package: &str, version: &str) -> Vec<Value> {
    vec![
        Value::Name(Name::unqualified(package)),
        Value::Bool(false),
        Value::Text(version.into()),
        Value::Null,
    ]
}

/// Fluent wrapper that inserts objects with fresh ids.
///
/// # Example
///
/// ```
/// use catalog::{FlatSchema, Schema, SchemaClass};
/// use testsupport::prelude::*;
///
/// let mut b = SchemaBuilder::new(FlatSchema::new());
/// b.module("default");
/// let ty = b.add(SchemaClass::ScalarType, scalar_data("default::Code", &[]));
/// assert!(b.schema().has_object(ty.id));
/// ```
#[derive(Clone, Debug)]
pub struct SchemaBuilder<S> {
    schema: S,
}

impl<S: Schema> SchemaBuilder<S> {
    pub fn new(schema: S) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn finish(self) -> S {
        self.schema
    }

    /// Insert `data` as a new object of `class`.
    pub fn add(&mut self, class: SchemaClass, data: Vec<Value>) -> Object {
        let id = ObjectId::new();
        self.add_with_id(id, class, data)
    }

    pub fn add_with_id(&mut self, id: ObjectId, class: SchemaClass, data: Vec<Value>) -> Object {
        self.schema = self
            .schema
            .insert_raw(id, class, data)
            .unwrap_or_else(|err| panic!("fixture insert of {class} failed: {err}"));
        Object::new(id, class)
    }

    pub fn module(&mut self, module: &str) -> Object {
        self.add(SchemaClass::Module, module_data(module))
    }

    pub fn scalar(&mut self, qualified: &str, bases: &[Object]) -> Object {
        self.add(SchemaClass::ScalarType, scalar_data(qualified, bases))
    }

    pub fn object_type(&mut self, qualified: &str, bases: &[Object]) -> Object {
        self.add(SchemaClass::ObjectType, object_type_data(qualified, bases, &[]))
    }

    pub fn function(&mut self, fullname: &str, params: &[Object], return_type: Object) -> Object {
        self.add(SchemaClass::Function, function_data(fullname, params, return_type))
    }

    pub fn operator(&mut self, fullname: &str, params: &[Object], return_type: Object) -> Object {
        self.add(SchemaClass::Operator, operator_data(fullname, params, return_type))
    }

    pub fn cast(
        &mut self,
        qualified: &str,
        from: Object,
        to: Object,
        implicit: bool,
        assignment: bool,
    ) -> Object {
        self.add(
            SchemaClass::Cast,
            cast_data(qualified, from, to, implicit, assignment),
        )
    }

    pub fn migration(&mut self, migration: &str, parents: &[Object]) -> Object {
        self.add(SchemaClass::Migration, migration_data(migration, parents))
    }
}

/// Handles into the bootstrap standard library built by [`std_schema`].
#[derive(Clone, Debug)]
pub struct StdObjects {
    pub std: Object,
    pub default: Object,
    pub anytype: Object,
    pub str_type: Object,
    pub int64: Object,
    pub float64: Object,
    pub len_str: Object,
    pub len_array: Object,
    pub abs_int64: Object,
    pub plus_int64: Object,
    pub int64_to_float64: Object,
    pub int64_to_str: Object,
    pub str_to_int64: Object,
}

/// Modules registered by [`std_schema`].
pub const STD_FIXTURE_MODULES: &[&str] =
    &["std", "std::math", "schema", "sys", "cfg", "ext", "default"];

/// A small standard library plus an empty `default` module.
///
/// # Example
///
/// ```
/// use catalog::{FlatSchema, Schema};
/// use testsupport::prelude::*;
///
/// let (schema, std) = std_schema(FlatSchema::new());
/// assert!(schema.has_module("std::math"));
/// assert!(schema.has_object(std.int64.id));
/// ```
pub fn std_schema<S: Schema>(schema: S) -> (S, StdObjects) {
    let mut b = SchemaBuilder::new(schema);
    let std = b.module("std");
    for module in STD_FIXTURE_MODULES.iter().filter(|m| !matches!(**m, "std" | "default")) {
        b.module(module);
    }
    let default = b.module("default");

    let anytype = b.add(SchemaClass::PseudoType, pseudo_type_data("anytype"));
    let str_type = b.scalar("std::str", &[]);
    let int64 = b.scalar("std::int64", &[]);
    let float64 = b.scalar("std::float64", &[]);

    let len_str = b.function("std::len@str", &[str_type], int64);
    let len_array = b.function("std::len@array", &[anytype], int64);
    let abs_int64 = b.function("std::math::abs@int64", &[int64], int64);
    let plus_int64 = b.operator("std::+@int64", &[int64, int64], int64);

    let int64_to_float64 = b.cast("std::cast_int64_float64", int64, float64, true, true);
    let int64_to_str = b.cast("std::cast_int64_str", int64, str_type, false, true);
    let str_to_int64 = b.cast("std::cast_str_int64", str_type, int64, false, false);

    let objects = StdObjects {
        std,
        default,
        anytype,
        str_type,
        int64,
        float64,
        len_str,
        len_array,
        abs_int64,
        plus_int64,
        int64_to_float64,
        int64_to_str,
        str_to_int64,
    };
    (b.finish(), objects)
}
