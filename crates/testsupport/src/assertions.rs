//! Custom assertion helpers for catalog tests.

use std::collections::{BTreeMap, BTreeSet};

use catalog::{FlatSchema, RefKey, Schema};
use common::{SchemaError, SchemaResult};
use pretty_assertions::assert_eq;
use types::ObjectId;

/// Reverse-reference index computed by scanning every stored object.
pub fn brute_force_reverse_index(
    schema: &FlatSchema,
) -> BTreeMap<ObjectId, BTreeMap<RefKey, BTreeSet<ObjectId>>> {
    let mut index: BTreeMap<ObjectId, BTreeMap<RefKey, BTreeSet<ObjectId>>> = BTreeMap::new();
    for id in schema.object_ids() {
        let obj = schema
            .get_by_id(id, None)
            .unwrap_or_else(|err| panic!("listed id {id} is missing: {err}"));
        let data = schema
            .get_data_raw(obj)
            .unwrap_or_else(|err| panic!("object {id} has no data: {err}"));
        for field in obj.descriptor().reference_fields() {
            let Some(value) = data.get(field.index) else {
                continue;
            };
            for target in value.object_refs() {
                index
                    .entry(target)
                    .or_default()
                    .entry((obj.class, field.name))
                    .or_default()
                    .insert(id);
            }
        }
    }
    index
}

/// Assert that the incrementally maintained index equals a full rescan.
///
/// # Example
///
/// ```
/// use catalog::FlatSchema;
/// use testsupport::prelude::*;
///
/// let (schema, _) = std_schema(FlatSchema::new());
/// assert_reverse_index_consistent(&schema);
/// ```
pub fn assert_reverse_index_consistent(schema: &FlatSchema) {
    assert_eq!(
        schema.reverse_index().to_sorted(),
        brute_force_reverse_index(schema),
        "reverse-reference index diverged from a full scan of {schema}"
    );
}

/// Assert that an operation failed with a message containing `expected_msg`.
///
/// # Example
///
/// ```
/// use common::SchemaError;
/// use testsupport::prelude::*;
///
/// let result: Result<(), SchemaError> = Err(SchemaError::UnknownModule("app".into()));
/// assert_error_contains(result, "module 'app'");
/// ```
pub fn assert_error_contains<T>(result: SchemaResult<T>, expected_msg: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{expected_msg}', but got Ok"),
        Err(e) => {
            let error_string = e.to_string();
            assert!(
                error_string.contains(expected_msg),
                "Expected error to contain '{expected_msg}', but got: {error_string}"
            );
        }
    }
}

/// Assert that an operation was rejected as an integrity violation.
pub fn assert_integrity_violation<T>(result: SchemaResult<T>) -> SchemaError {
    match result {
        Ok(_) => panic!("Expected an integrity violation, but got Ok"),
        Err(e) => {
            assert!(e.is_integrity_violation(), "Expected an integrity violation, got: {e}");
            e
        }
    }
}

/// Assert that an operation failed with an internal invariant violation.
pub fn assert_internal_error<T>(result: SchemaResult<T>, expected_msg: &str) {
    match result {
        Ok(_) => panic!("Expected internal error '{expected_msg}', but got Ok"),
        Err(SchemaError::Internal(msg)) => {
            assert!(
                msg.contains(expected_msg),
                "Expected internal error to contain '{expected_msg}', but got: {msg}"
            );
        }
        Err(other) => panic!(
            "Expected internal error '{expected_msg}', but got different error: {other}"
        ),
    }
}
