//! Integration tests demonstrating testsupport usage.

use catalog::{ChainedSchema, FlatSchema, LookupOptions, Schema, SchemaClass};
use common::SchemaResult;
use proptest::prelude::*;
use testsupport::{prelude::*, proptest_generators::*};
use types::{Name, ObjectId, Value};

#[test]
fn std_schema_registers_every_fixture_module() {
    let (schema, std) = std_schema(FlatSchema::new());
    for module in STD_FIXTURE_MODULES {
        assert!(schema.has_module(module), "missing module {module}");
    }
    assert_eq!(schema.get_modules().len(), STD_FIXTURE_MODULES.len());
    assert!(schema.has_object(std.len_str.id));
    assert_reverse_index_consistent(&schema);
}

#[test]
fn std_schema_works_through_a_layered_view() -> SchemaResult<()> {
    let (chained, std) = std_schema(ChainedSchema::over(FlatSchema::new()));
    assert!(chained.base().is_empty());
    assert!(chained.top().has_object(std.int64.id));

    let found = chained.get(&Name::parse("int64"), &LookupOptions::new())?;
    assert_eq!(found, std.int64);
    Ok(())
}

#[test]
fn builder_inserts_with_fresh_ids() {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    b.module("default");
    let a = b.scalar("default::A", &[]);
    let c = b.scalar("default::C", &[a]);
    assert_ne!(a.id, c.id);

    let schema = b.finish();
    assert_eq!(schema.get_children(a).unwrap().to_vec(), vec![c]);
}

#[test]
#[should_panic(expected = "fixture insert of scalar type failed")]
fn builder_panics_on_conflicts() {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    b.module("default");
    b.scalar("default::A", &[]);
    b.scalar("default::A", &[]);
}

#[test]
fn tuple_builders_match_class_layouts() {
    let anchor = catalog::Object::new(ObjectId::new(), SchemaClass::ScalarType);
    let cases = [
        (SchemaClass::Module, module_data("m")),
        (SchemaClass::PseudoType, pseudo_type_data("anytype")),
        (SchemaClass::ScalarType, scalar_data("m::s", &[])),
        (SchemaClass::ObjectType, object_type_data("m::o", &[], &[])),
        (SchemaClass::Function, function_data("m::f@x", &[], anchor)),
        (SchemaClass::Operator, operator_data("m::+@x", &[], anchor)),
        (SchemaClass::Cast, cast_data("m::c", anchor, anchor, false, false)),
        (SchemaClass::Property, property_data("m::p", None, None)),
        (SchemaClass::Annotation, annotation_data("m::a")),
        (SchemaClass::Migration, migration_data("m1", &[])),
        (SchemaClass::Role, role_data("admin", &[])),
        (SchemaClass::ExtensionPackage, extension_package_data("pkg", "1.0")),
    ];
    for (class, data) in cases {
        assert_eq!(data.len(), class.descriptor().field_count(), "{class}");
        assert!(matches!(data[0], Value::Name(_)), "{class}");
    }
}

#[test]
fn error_assertions_classify_failures() {
    let (schema, std) = std_schema(FlatSchema::new());

    let dup = schema.insert_raw(std.int64.id, SchemaClass::ScalarType, scalar_data("std::x", &[]));
    let err = assert_integrity_violation(dup);
    assert!(err.to_string().contains("already present"));

    assert_error_contains(
        schema.get(&Name::parse("default::missing"), &LookupOptions::new()),
        "'default::missing' does not exist",
    );
    assert_internal_error(schema.get_by_id(ObjectId::new(), None), "non-existent");
}

#[test]
fn init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

proptest! {
    #[test]
    fn random_edit_sequences_leave_a_consistent_index(ops in arb_catalog_ops(24)) {
        let mut schema = empty_pool_schema();
        for op in &ops {
            schema = apply_op(&schema, op);
        }
        assert_reverse_index_consistent(&schema);
        prop_assert!(schema.len() <= POOL_SIZE + 1);
    }
}
