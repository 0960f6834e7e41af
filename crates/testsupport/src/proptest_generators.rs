//! Property-based test generators using proptest.
//!
//! Random edit sequences run against a fixed pool of object-type slots.
//! Every slot has a stable id and name, so operations may target slots whose
//! object does not exist (yet, or any more); those must fail cleanly.

use catalog::{FlatSchema, LiveValue, Object, Schema, SchemaClass};
use proptest::prelude::*;
use types::{Name, ObjectId};

use crate::fixtures::{module_data, object_type_data};

/// Number of object slots an edit sequence can touch.
pub const POOL_SIZE: usize = 8;

/// Object-reference field of an object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefField {
    Bases,
    Ancestors,
    Pointers,
}

impl RefField {
    pub fn name(self) -> &'static str {
        match self {
            RefField::Bases => "bases",
            RefField::Ancestors => "ancestors",
            RefField::Pointers => "pointers",
        }
    }
}

/// One random catalog edit.
#[derive(Clone, Debug)]
pub enum CatalogOp {
    Insert {
        slot: usize,
        bases: Vec<usize>,
        pointers: Vec<usize>,
    },
    SetField {
        slot: usize,
        field: RefField,
        targets: Vec<usize>,
    },
    Update {
        slot: usize,
        bases: Vec<usize>,
        pointers: Vec<usize>,
    },
    Clear {
        slot: usize,
        field: RefField,
    },
    Delete {
        slot: usize,
    },
}

pub fn slot_id(slot: usize) -> ObjectId {
    ObjectId::from_u128(0x1000 + slot as u128)
}

pub fn slot_object(slot: usize) -> Object {
    Object::new(slot_id(slot), SchemaClass::ObjectType)
}

pub fn slot_name(slot: usize) -> Name {
    Name::qualified("default", format!("T{slot}"))
}

fn slot_objects(slots: &[usize]) -> Vec<Object> {
    slots.iter().copied().map(slot_object).collect()
}

pub fn arb_ref_field() -> impl Strategy<Value = RefField> {
    prop_oneof![
        Just(RefField::Bases),
        Just(RefField::Ancestors),
        Just(RefField::Pointers),
    ]
}

fn arb_slot() -> impl Strategy<Value = usize> {
    0..POOL_SIZE
}

fn arb_targets() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(arb_slot(), 0..4)
}

/// Strategy for a single edit, weighted towards inserts.
pub fn arb_catalog_op() -> impl Strategy<Value = CatalogOp> {
    prop_oneof![
        3 => (arb_slot(), arb_targets(), arb_targets())
            .prop_map(|(slot, bases, pointers)| CatalogOp::Insert { slot, bases, pointers }),
        2 => (arb_slot(), arb_ref_field(), arb_targets())
            .prop_map(|(slot, field, targets)| CatalogOp::SetField { slot, field, targets }),
        2 => (arb_slot(), arb_targets(), arb_targets())
            .prop_map(|(slot, bases, pointers)| CatalogOp::Update { slot, bases, pointers }),
        1 => (arb_slot(), arb_ref_field()).prop_map(|(slot, field)| CatalogOp::Clear { slot, field }),
        1 => arb_slot().prop_map(|slot| CatalogOp::Delete { slot }),
    ]
}

/// Strategy for an edit sequence of up to `max_len` operations.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::*;
///
/// proptest! {
///     #[test]
///     fn sequences_apply(ops in arb_catalog_ops(10)) {
///         let mut schema = empty_pool_schema();
///         for op in &ops {
///             schema = apply_op(&schema, op);
///         }
///         prop_assert!(schema.len() <= POOL_SIZE + 1);
///     }
/// }
/// ```
pub fn arb_catalog_ops(max_len: usize) -> impl Strategy<Value = Vec<CatalogOp>> {
    prop::collection::vec(arb_catalog_op(), 0..max_len)
}

/// A store holding only the `default` module that pool objects live in.
pub fn empty_pool_schema() -> FlatSchema {
    FlatSchema::new()
        .insert_raw(ObjectId::from_u128(1), SchemaClass::Module, module_data("default"))
        .unwrap_or_else(|err| panic!("bootstrap failed: {err}"))
}

/// Apply `op`, checking that edits of absent slots are rejected.
pub fn apply_op(schema: &FlatSchema, op: &CatalogOp) -> FlatSchema {
    let present = |slot: usize| schema.has_object(slot_id(slot));
    let unwrap = |result: common::SchemaResult<FlatSchema>, slot: usize| match result {
        Ok(next) => next,
        Err(err) => panic!("{op:?} on slot {slot} failed: {err}"),
    };
    let expect_rejected = |result: common::SchemaResult<FlatSchema>| {
        let err = result.err().unwrap_or_else(|| panic!("{op:?} should have been rejected"));
        assert!(
            err.is_internal() || err.is_integrity_violation(),
            "{op:?} failed with an unexpected error: {err}"
        );
        schema.clone()
    };

    match op {
        CatalogOp::Insert {
            slot,
            bases,
            pointers,
        } => {
            let data = object_type_data(
                &slot_name(*slot).to_string(),
                &slot_objects(bases),
                &slot_objects(pointers),
            );
            let result = schema.insert_raw(slot_id(*slot), SchemaClass::ObjectType, data);
            if present(*slot) {
                expect_rejected(result)
            } else {
                unwrap(result, *slot)
            }
        }
        CatalogOp::SetField {
            slot,
            field,
            targets,
        } => {
            let value = LiveValue::Objects(slot_objects(targets));
            let result = schema.set_field(slot_object(*slot), field.name(), value);
            if present(*slot) {
                unwrap(result, *slot)
            } else {
                expect_rejected(result)
            }
        }
        CatalogOp::Update {
            slot,
            bases,
            pointers,
        } => {
            let updates = vec![
                ("bases", LiveValue::Objects(slot_objects(bases))),
                ("pointers", LiveValue::Objects(slot_objects(pointers))),
            ];
            let result = schema.update(slot_object(*slot), updates);
            if present(*slot) {
                unwrap(result, *slot)
            } else {
                expect_rejected(result)
            }
        }
        CatalogOp::Clear { slot, field } => {
            let result = schema.clear_field(slot_object(*slot), field.name());
            if present(*slot) {
                unwrap(result, *slot)
            } else {
                expect_rejected(result)
            }
        }
        CatalogOp::Delete { slot } => {
            let result = schema.delete(slot_object(*slot));
            if present(*slot) {
                unwrap(result, *slot)
            } else {
                expect_rejected(result)
            }
        }
    }
}
