//! Persistent schema catalog.
//!
//! The catalog stores schema objects (modules, types, functions, casts,
//! migrations, ...) as immutable snapshots:
//! - [`FlatSchema`]: one store with name indices and a reverse-reference index
//! - [`ChainedSchema`]: a base/top/global overlay with copy-on-first-write
//! - [`Schema`]: the read/write interface both implement
//!
//! Every write returns a new snapshot; older snapshots stay valid and share
//! unchanged structure with newer ones.
//!
//! # Example
//!
//! ```
//! use catalog::{FlatSchema, LookupOptions, ModuleAliases, Schema, SchemaClass};
//! use types::{Name, ObjectId, Value};
//!
//! let module = ObjectId::new();
//! let scalar = ObjectId::new();
//!
//! let schema = FlatSchema::new()
//!     .insert_raw(module, SchemaClass::Module, vec![Name::unqualified("default").into(), Value::Bool(false)])
//!     .unwrap();
//! let next = schema
//!     .insert_raw(
//!         scalar,
//!         SchemaClass::ScalarType,
//!         vec![
//!             Name::parse("default::Temperature").into(),
//!             Value::Bool(false),
//!             Value::Bool(false),
//!             Value::Null,
//!             Value::Null,
//!             Value::Null,
//!         ],
//!     )
//!     .unwrap();
//!
//! let aliases = ModuleAliases::with_default("default");
//! let opts = LookupOptions::new().with_aliases(&aliases);
//! let found = next.get(&Name::parse("Temperature"), &opts).unwrap();
//! assert_eq!(found.id, scalar);
//!
//! // The earlier snapshot is unaffected.
//! assert!(!schema.has_object(scalar));
//! ```

mod chained;
pub mod describe;
mod dump;
mod flat;
mod iter;
mod memo;
pub mod migrations;
pub mod pmap;
mod refs;
mod registry;
pub mod resolve;
mod schema;

pub use chained::ChainedSchema;
pub use dump::{DumpedObject, SchemaDump, upgrade_schema};
pub use flat::FlatSchema;
pub use iter::{ObjectFilter, SchemaIterator};
pub use memo::SnapshotId;
pub use refs::{RefEntry, RefKey, ReverseIndex};
pub use registry::{
    ClassDescriptor, FieldDescriptor, LiveValue, NAME_FIELD, Object, SchemaClass,
};
pub use resolve::{LookupOptions, ModuleAliases};
pub use schema::Schema;
