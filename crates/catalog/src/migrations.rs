//! Linear migration history.

use std::collections::BTreeMap;

use common::{SchemaError, SchemaResult};
use tracing::debug;
use types::ObjectId;

use crate::{registry::Object, schema::Schema};

/// Tail of the migration chain formed by `migrations` and their parents.
///
/// The history must be a single line: exactly one migration without parents,
/// and at most one child per migration.
pub fn last_migration<S: Schema>(
    schema: &S,
    migrations: &[Object],
) -> SchemaResult<Option<Object>> {
    if migrations.is_empty() {
        return Ok(None);
    }

    let mut children: BTreeMap<ObjectId, Vec<Object>> = BTreeMap::new();
    let mut root = None;
    for migration in migrations {
        let parents = schema.get_field(*migration, "parents")?.object_refs();
        if parents.is_empty() {
            if root.is_some() {
                return Err(SchemaError::internal("multiple migration roots found"));
            }
            root = Some(*migration);
        }
        for parent in parents {
            children.entry(parent).or_default().push(*migration);
        }
    }

    let Some(root) = root else {
        return Err(SchemaError::internal("cannot find migration root"));
    };

    let mut latest = root;
    let mut steps = 0;
    while let Some(next) = children.get(&latest.id) {
        if next.len() > 1 {
            return Err(SchemaError::internal("nonlinear migration history detected"));
        }
        latest = next[0];
        steps += 1;
        if steps > migrations.len() {
            return Err(SchemaError::internal("cycle in migration history"));
        }
    }

    debug!(root = %root.id, last = %latest.id, length = steps + 1, "resolved migration chain");
    Ok(Some(latest))
}
