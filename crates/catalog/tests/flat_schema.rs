//! Integration tests for single-store writes, indices and snapshot isolation.

use catalog::{FlatSchema, LiveValue, LookupOptions, Object, Schema, SchemaClass};
use common::{SchemaError, SchemaResult};
use pretty_assertions::assert_eq;
use testsupport::prelude::*;
use types::{Name, ObjectId, Value};

fn with_default_module() -> SchemaBuilder<FlatSchema> {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    b.module("default");
    b
}

#[test]
fn inserted_tuple_reads_back() -> SchemaResult<()> {
    let mut b = with_default_module();
    let base = b.scalar("default::Base", &[]);
    let child = b.scalar("default::Child", &[base]);
    let schema = b.finish();

    assert_eq!(schema.get_by_id(child.id, Some(SchemaClass::ScalarType))?, child);
    assert_eq!(schema.name_of(child)?, &Name::parse("default::Child"));
    assert_eq!(
        schema.get_field(child, "bases")?,
        &Value::ObjectList(vec![base.id])
    );
    assert_eq!(schema.get_data_raw(child)?.len(), 6);
    Ok(())
}

#[test]
fn insert_reduces_live_values() -> SchemaResult<()> {
    let mut b = with_default_module();
    let base = b.scalar("default::Base", &[]);
    let schema = b.finish();

    let id = ObjectId::new();
    let schema = schema.insert(
        id,
        SchemaClass::ScalarType,
        vec![
            Name::parse("default::Derived").into(),
            false.into(),
            true.into(),
            vec![base].into(),
            vec![base].into(),
            LiveValue::null(),
        ],
    )?;
    let derived = Object::new(id, SchemaClass::ScalarType);

    assert_eq!(schema.get_field(derived, "abstract")?, &Value::Bool(true));
    assert_eq!(
        schema.get_field_live(derived, "bases")?,
        LiveValue::Objects(vec![base])
    );
    assert_eq!(schema.get_descendants(base)?.to_vec(), vec![derived]);
    Ok(())
}

#[test]
fn insert_rejects_wrong_arity() {
    let schema = with_default_module().finish();
    let result = schema.insert(
        ObjectId::new(),
        SchemaClass::ScalarType,
        vec![Name::parse("default::X").into()],
    );
    assert_internal_error(result, "expects 6 fields, got 1");
}

#[test]
fn qualified_names_are_unique_across_classes() {
    let mut b = with_default_module();
    b.scalar("default::Thing", &[]);
    let schema = b.finish();

    let result = schema.insert_raw(
        ObjectId::new(),
        SchemaClass::ObjectType,
        object_type_data("default::Thing", &[], &[]),
    );
    let err = assert_integrity_violation(result);
    assert_eq!(
        err,
        SchemaError::AlreadyExists("scalar type 'default::Thing'".into())
    );
}

#[test]
fn global_names_are_unique_per_class() -> SchemaResult<()> {
    let schema = with_default_module().finish();
    assert_error_contains(
        schema.insert_raw(ObjectId::new(), SchemaClass::Module, module_data("default")),
        "module 'default' already exists",
    );

    let schema = schema
        .insert_raw(ObjectId::new(), SchemaClass::Role, role_data("default", &[]))?
        .insert_raw(ObjectId::new(), SchemaClass::Migration, migration_data("default", &[]))?;
    assert!(schema.maybe_get_global(SchemaClass::Role, "default").is_some());
    assert!(schema.has_migration("default"));
    Ok(())
}

#[test]
fn qualified_names_need_a_known_module() {
    let schema = with_default_module().finish();
    let result = schema.insert_raw(
        ObjectId::new(),
        SchemaClass::ScalarType,
        scalar_data("app::Thing", &[]),
    );
    assert_eq!(result.unwrap_err(), SchemaError::UnknownModule("app".into()));
}

#[test]
fn duplicate_ids_are_rejected_before_names() {
    let mut b = with_default_module();
    let existing = b.scalar("default::A", &[]);
    let schema = b.finish();

    let result = schema.insert_raw(
        existing.id,
        SchemaClass::ScalarType,
        scalar_data("default::A", &[]),
    );
    let err = assert_integrity_violation(result);
    assert!(matches!(err, SchemaError::DuplicateId { id, .. } if id == existing.id));
}

#[test]
fn old_snapshots_never_change() -> SchemaResult<()> {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let before = b.finish();

    let after = before
        .set_field(a, "abstract", true)?
        .set_field(a, "name", Name::parse("default::Renamed"))?;

    assert_eq!(before.get_field(a, "abstract")?, &Value::Bool(false));
    assert_eq!(before.name_of(a)?, &Name::parse("default::A"));
    assert_eq!(after.name_of(a)?, &Name::parse("default::Renamed"));
    assert!(after.generation() > before.generation());

    let opts = LookupOptions::new();
    assert_eq!(before.lookup(&Name::parse("default::A"), &opts)?, Some(a));
    assert_eq!(after.lookup(&Name::parse("default::A"), &opts)?, None);
    assert_eq!(after.lookup(&Name::parse("default::Renamed"), &opts)?, Some(a));
    Ok(())
}

#[test]
fn rename_onto_a_taken_name_fails() {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    b.scalar("default::B", &[]);
    let schema = b.finish();

    assert_error_contains(
        schema.set_field(a, "name", Name::parse("default::B")),
        "scalar type 'default::B' already exists",
    );
}

#[test]
fn set_field_moves_reverse_references() -> SchemaResult<()> {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let other = b.scalar("default::B", &[]);
    let child = b.scalar("default::C", &[a]);
    let schema = b.finish();

    let moved = schema.set_field(child, "bases", vec![other])?;
    assert!(moved.get_children(a)?.is_empty());
    assert_eq!(moved.get_children(other)?.to_vec(), vec![child]);
    assert_eq!(schema.get_children(a)?.to_vec(), vec![child]);
    assert_reverse_index_consistent(&moved);
    Ok(())
}

#[test]
fn update_applies_the_net_change_of_all_fields() -> SchemaResult<()> {
    let mut b = with_default_module();
    let a = b.object_type("default::A", &[]);
    let p = b.object_type("default::P", &[]);
    let obj = b.object_type("default::Obj", &[a]);
    let schema = b.finish();

    let next = schema.update(
        obj,
        vec![
            ("bases", LiveValue::Objects(vec![p])),
            ("ancestors", LiveValue::Objects(vec![p, a])),
            ("pointers", LiveValue::Objects(vec![a])),
        ],
    )?;

    let grouped = next.get_referrers_grouped(a, None)?;
    let keys: Vec<_> = grouped.keys().map(|(_, field)| *field).collect();
    assert_eq!(keys, vec!["ancestors", "pointers"]);
    assert_eq!(next.get_children(p)?.to_vec(), vec![obj]);
    assert_reverse_index_consistent(&next);
    Ok(())
}

#[test]
fn clear_field_drops_references() -> SchemaResult<()> {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let child = b.scalar("default::C", &[a]);
    let schema = b.finish();

    let cleared = schema.clear_field(child, "bases")?;
    assert_eq!(cleared.get_field(child, "bases")?, &Value::Null);
    assert!(cleared.get_children(a)?.is_empty());
    assert_eq!(cleared.get_descendants(a)?.to_vec(), vec![child]);
    Ok(())
}

#[test]
fn unknown_fields_are_internal_errors() {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let schema = b.finish();

    assert_internal_error(schema.set_field(a, "volatility", true), "has no field 'volatility'");
    assert_internal_error(schema.get_field(a, "params"), "has no field 'params'");
}

#[test]
fn delete_removes_the_object_and_its_outgoing_references() -> SchemaResult<()> {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let child = b.scalar("default::C", &[a]);
    let schema = b.finish();

    let next = schema.delete(child)?;
    assert!(!next.has_object(child.id));
    assert!(next.get_children(a)?.is_empty());
    assert_eq!(next.lookup(&Name::parse("default::C"), &LookupOptions::new())?, None);
    assert_reverse_index_consistent(&next);

    // The name is free again.
    next.insert_raw(ObjectId::new(), SchemaClass::ScalarType, scalar_data("default::C", &[]))?;
    Ok(())
}

#[test]
fn delete_keeps_references_into_the_deleted_object() -> SchemaResult<()> {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let child = b.scalar("default::C", &[a]);
    let schema = b.finish();

    let next = schema.delete(a)?;
    assert_eq!(next.get_field(child, "bases")?, &Value::ObjectList(vec![a.id]));
    assert!(next.reverse_index().referrers(&a.id).is_some());
    Ok(())
}

#[test]
fn delete_of_a_missing_object_fails_but_discard_does_not() -> SchemaResult<()> {
    let schema = with_default_module().finish();
    let ghost = Object::new(ObjectId::new(), SchemaClass::ScalarType);

    assert_internal_error(schema.delete(ghost), "cannot delete");
    assert_internal_error(schema.set_field(ghost, "abstract", true), "cannot update");

    let same = schema.discard(ghost)?;
    assert_eq!(same.generation(), schema.generation());
    Ok(())
}

#[test]
fn get_by_id_checks_the_class() {
    let mut b = with_default_module();
    let a = b.scalar("default::A", &[]);
    let schema = b.finish();

    assert_internal_error(
        schema.get_by_id(a.id, Some(SchemaClass::ObjectType)),
        "exists, but is a scalar type, not an object type",
    );
    assert_internal_error(schema.get_by_id(ObjectId::new(), None), "non-existent schema item");
}

#[test]
fn get_global_reports_a_bad_reference() {
    let schema = with_default_module().finish();
    assert_error_contains(
        schema.get_global(SchemaClass::Module, "app"),
        "module 'app' does not exist",
    );
}

#[test]
fn modules_are_listed_by_name() -> SchemaResult<()> {
    let (schema, std) = std_schema(FlatSchema::new());
    let names = schema
        .get_modules()
        .into_iter()
        .map(|m| schema.name_of(m).map(ToString::to_string))
        .collect::<SchemaResult<Vec<_>>>()?;
    assert_eq!(
        names,
        vec!["cfg", "default", "ext", "schema", "std", "std::math", "sys"]
    );
    assert!(schema.get_modules().contains(&std.std));
    Ok(())
}
