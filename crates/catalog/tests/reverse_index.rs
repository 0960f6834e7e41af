//! Property tests: the incrementally maintained reverse index always equals a
//! full rescan, and earlier snapshots keep their own index.

use catalog::{FlatSchema, LiveValue, Schema};
use proptest::prelude::*;
use testsupport::{prelude::*, proptest_generators::*};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn index_matches_full_scan_after_every_edit(ops in arb_catalog_ops(40)) {
        let mut schema = empty_pool_schema();
        for op in &ops {
            schema = apply_op(&schema, op);
            assert_reverse_index_consistent(&schema);
        }
    }

    #[test]
    fn earlier_snapshots_keep_their_index(ops in arb_catalog_ops(20), extra in arb_catalog_ops(20)) {
        let mut before = empty_pool_schema();
        for op in &ops {
            before = apply_op(&before, op);
        }
        let expected = before.reverse_index().to_sorted();

        let mut after = before.clone();
        for op in &extra {
            after = apply_op(&after, op);
        }
        prop_assert_eq!(before.reverse_index().to_sorted(), expected);
        assert_reverse_index_consistent(&after);
    }

    #[test]
    fn children_follow_the_bases_field(slot in 0..POOL_SIZE, targets in prop::collection::vec(0..POOL_SIZE, 1..4)) {
        let schema = apply_op(
            &empty_pool_schema(),
            &CatalogOp::Insert { slot, bases: Vec::new(), pointers: Vec::new() },
        );
        let schema = schema
            .set_field(slot_object(slot), "bases", LiveValue::Objects(targets.iter().copied().map(slot_object).collect()))
            .unwrap();
        for target in &targets {
            let children = schema.get_children(slot_object(*target)).unwrap();
            prop_assert_eq!(children.to_vec(), vec![slot_object(slot)]);
        }
    }
}

#[test]
fn empty_reference_lists_leave_no_entries() {
    let schema = apply_op(
        &empty_pool_schema(),
        &CatalogOp::Insert {
            slot: 0,
            bases: vec![1],
            pointers: Vec::new(),
        },
    );
    assert_eq!(schema.reverse_index().len(), 1);

    let cleared = apply_op(
        &schema,
        &CatalogOp::SetField {
            slot: 0,
            field: RefField::Bases,
            targets: Vec::new(),
        },
    );
    // `ancestors` still points at slot 1.
    assert_eq!(cleared.reverse_index().len(), 1);

    let cleared = apply_op(&cleared, &CatalogOp::Clear { slot: 0, field: RefField::Ancestors });
    assert!(cleared.reverse_index().is_empty());
    assert_reverse_index_consistent(&cleared);
}

#[test]
fn pool_schema_starts_with_only_the_module() {
    let schema: FlatSchema = empty_pool_schema();
    assert_eq!(schema.len(), 1);
    assert!(schema.has_module("default"));
}
