//! Serializable snapshot form of a store and the tuple-length repair.

use common::{CatalogConfig, SchemaResult};
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{ObjectId, Value};

use crate::{flat::FlatSchema, registry::SchemaClass};

/// One stored object as written to a dump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedObject {
    pub id: ObjectId,
    pub class: SchemaClass,
    pub data: Vec<Value>,
}

/// Every object of a store, modules first so that a reload can check
/// qualified names against them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDump {
    pub objects: Vec<DumpedObject>,
}

impl FlatSchema {
    pub fn dump(&self) -> SchemaDump {
        let mut objects: Vec<DumpedObject> = self
            .raw_objects()
            .map(|(obj, data)| DumpedObject {
                id: obj.id,
                class: obj.class,
                data: data.to_vec(),
            })
            .collect();
        objects.sort_by_key(|obj| (obj.class != SchemaClass::Module, obj.id));
        SchemaDump { objects }
    }

    /// Rebuild a store, including every index, from a dump.
    ///
    /// Tuples recorded before fields were appended to their class are padded
    /// by [`upgrade_schema`].
    pub fn from_dump(dump: SchemaDump, config: CatalogConfig) -> SchemaResult<Self> {
        let mut objects = dump.objects;
        objects.sort_by_key(|obj| obj.class != SchemaClass::Module);

        let count = objects.len();
        let mut schema = FlatSchema::with_config(config);
        for obj in objects {
            schema = schema.insert_loaded(obj.id, obj.class, obj.data)?;
        }
        debug!(objects = count, "loaded schema dump");
        Ok(upgrade_schema(&schema))
    }
}

/// Pad every tuple shorter than its class's field layout with nulls.
///
/// Existing entries are left untouched; a store with nothing to repair is
/// returned as-is.
pub fn upgrade_schema(schema: &FlatSchema) -> FlatSchema {
    let fixes: Vec<(ObjectId, Vec<Value>)> = schema
        .raw_objects()
        .filter_map(|(obj, data)| {
            let expected = obj.class.descriptor().field_count();
            (data.len() < expected).then(|| {
                let mut padded = data.to_vec();
                padded.resize(expected, Value::Null);
                (obj.id, padded)
            })
        })
        .collect();

    if fixes.is_empty() {
        return schema.clone();
    }
    debug!(repaired = fixes.len(), "upgraded stored field tuples");
    schema.with_replaced_data(fixes)
}
