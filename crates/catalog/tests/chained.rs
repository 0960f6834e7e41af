//! Integration tests for the layered base/top/global view.

use catalog::{ChainedSchema, FlatSchema, LookupOptions, ObjectFilter, Schema, SchemaClass};
use common::SchemaResult;
use pretty_assertions::assert_eq;
use testsupport::prelude::*;
use types::{Name, ObjectId, Value};

fn committed() -> (FlatSchema, StdObjects) {
    std_schema(FlatSchema::new())
}

#[test]
fn writes_land_in_top() -> SchemaResult<()> {
    let (base, _) = committed();
    let view = ChainedSchema::over(base.clone());

    let id = ObjectId::new();
    let view = view.insert_raw(id, SchemaClass::ScalarType, scalar_data("default::Money", &[]))?;

    assert!(view.top().has_object(id));
    assert!(!view.base().has_object(id));
    assert_eq!(view.base().generation(), base.generation());
    assert!(view.has_object(id));
    Ok(())
}

#[test]
fn updating_a_base_object_shadows_it_in_top() -> SchemaResult<()> {
    let (base, std) = committed();
    let view = ChainedSchema::over(base.clone());

    let view = view.set_field(std.int64, "abstract", true)?;

    assert_eq!(view.get_field(std.int64, "abstract")?, &Value::Bool(true));
    assert_eq!(base.get_field(std.int64, "abstract")?, &Value::Bool(false));
    assert!(view.top().has_object(std.int64.id));
    assert_eq!(view.top().name_of(std.int64)?, &Name::parse("std::int64"));

    // A second update works on the existing shadow.
    let view = view.set_field(std.int64, "abstract", false)?;
    assert_eq!(view.get_field(std.int64, "abstract")?, &Value::Bool(false));
    Ok(())
}

#[test]
fn clearing_a_null_base_field_does_not_shadow() -> SchemaResult<()> {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    b.module("default");
    let parent = b.scalar("default::Parent", &[]);
    let child = b.scalar("default::Child", &[parent]);
    let view = ChainedSchema::over(b.finish());

    let same = view.clear_field(child, "default")?;
    assert!(same.top().is_empty());

    let cleared = view.clear_field(child, "bases")?;
    assert!(cleared.top().has_object(child.id));
    assert_eq!(cleared.get_field(child, "bases")?, &Value::Null);
    assert_eq!(view.get_field(child, "bases")?, &Value::ObjectList(vec![parent.id]));
    Ok(())
}

#[test]
fn shadowed_objects_are_listed_once() -> SchemaResult<()> {
    let (base, std) = committed();
    let view = ChainedSchema::over(base.clone())
        .set_field(std.int64, "abstract", true)?
        .set_field(std.str_type, "abstract", true)?;

    let ids: Vec<ObjectId> = view.object_ids().collect();
    assert_eq!(ids.len(), base.len());
    assert_eq!(view.get_objects(ObjectFilter::all()).count(), base.len());
    assert_eq!(view.get_modules().len(), base.get_modules().len());
    Ok(())
}

#[test]
fn layer_global_classes_route_to_global() -> SchemaResult<()> {
    let (base, _) = committed();
    let view = ChainedSchema::over(base);

    let id = ObjectId::new();
    let view = view.insert_raw(id, SchemaClass::Role, role_data("admin", &[]))?;
    let pkg = ObjectId::new();
    let view = view.insert_raw(
        pkg,
        SchemaClass::ExtensionPackage,
        extension_package_data("pgvector", "0.7"),
    )?;

    assert!(view.global().has_object(id));
    assert!(view.global().has_object(pkg));
    assert!(view.top().is_empty());

    let role = view.get_global(SchemaClass::Role, "admin")?;
    assert_eq!(role.id, id);
    let view = view.set_field(role, "superuser", true)?;
    assert_eq!(view.get_field(role, "superuser")?, &Value::Bool(true));

    let view = view.delete(role)?;
    assert!(!view.has_object(id));
    Ok(())
}

#[test]
fn base_objects_cannot_be_deleted_through_the_view() -> SchemaResult<()> {
    let (base, std) = committed();
    let view = ChainedSchema::over(base);

    assert_internal_error(view.delete(std.float64), "cannot delete");
    let same = view.discard(std.float64)?;
    assert!(same.has_object(std.float64.id));
    Ok(())
}

#[test]
fn top_modules_block_the_std_fallback_in_base() -> SchemaResult<()> {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    b.module("std");
    b.module("std::app");
    let hidden = b.scalar("std::app::Thing", &[]);
    let base = b.finish();

    let view = ChainedSchema::over(base);
    let name = Name::parse("app::Thing");
    assert_eq!(view.lookup(&name, &LookupOptions::new())?, Some(hidden));

    let view = view.insert_raw(ObjectId::new(), SchemaClass::Module, module_data("app"))?;
    assert_eq!(view.lookup(&name, &LookupOptions::new())?, None);
    Ok(())
}

#[test]
fn top_names_win_over_base_names() -> SchemaResult<()> {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    let default = b.module("default");
    let committed_fn = b.function("default::area@circle", &[], default);
    let base = b.finish();

    let view = ChainedSchema::over(base);
    let module = view.get_global(SchemaClass::Module, "default")?;
    let staged = ObjectId::new();
    let view = view.insert_raw(
        staged,
        SchemaClass::Function,
        function_data("default::area@square", &[], module),
    )?;

    let found = view.get_functions(&Name::parse("default::area"), &LookupOptions::new())?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, staged);
    assert!(!found.contains(&committed_fn));
    Ok(())
}

#[test]
fn referrers_and_casts_span_layers() -> SchemaResult<()> {
    let (base, std) = committed();
    let view = ChainedSchema::over(base);

    let mut b = SchemaBuilder::new(view);
    let money = b.scalar("default::Money", &[std.int64]);
    let to_money = b.cast("default::cast_int64_money", std.int64, money, true, true);
    let view = b.finish();

    let from_int64 = view.get_casts_from_type(std.int64, false, false)?;
    assert_eq!(from_int64.len(), 3);
    assert!(from_int64.contains(&to_money));
    assert!(from_int64.contains(&std.int64_to_float64));

    let implicit = view.get_casts_from_type(std.int64, true, false)?;
    let mut expected = vec![std.int64_to_float64, to_money];
    expected.sort();
    assert_eq!(implicit.to_vec(), expected);

    let children = view.get_children(std.int64)?;
    assert_eq!(children.to_vec(), vec![money]);

    let referrers = view.get_referrers(std.int64, None, None)?;
    assert!(referrers.contains(&std.abs_int64));
    assert!(referrers.contains(&money));

    let grouped = view.get_referrers_grouped(std.int64, Some(SchemaClass::Cast))?;
    let from = grouped
        .get(&(SchemaClass::Cast, "from_type"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(from.len(), 3);
    Ok(())
}

#[test]
fn last_migration_prefers_top() -> SchemaResult<()> {
    let mut b = SchemaBuilder::new(FlatSchema::new());
    let m1 = b.migration("m1", &[]);
    let m2 = b.migration("m2", &[m1]);
    let base = b.finish();

    let view = ChainedSchema::over(base);
    assert_eq!(view.get_last_migration()?, Some(m2));
    assert!(view.has_migration("m1"));

    let staged = ObjectId::new();
    let view = view.insert_raw(staged, SchemaClass::Migration, migration_data("n1", &[]))?;
    assert_eq!(view.get_last_migration()?.map(|m| m.id), Some(staged));
    Ok(())
}

#[test]
fn into_parts_returns_each_layer() -> SchemaResult<()> {
    let (base, _) = committed();
    let view = ChainedSchema::over(base.clone())
        .insert_raw(ObjectId::new(), SchemaClass::Role, role_data("admin", &[]))?;
    let (b, top, global) = view.into_parts();
    assert_eq!(b.len(), base.len());
    assert!(top.is_empty());
    assert_eq!(global.len(), 1);
    Ok(())
}
