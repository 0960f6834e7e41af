//! Test support utilities for the schema catalog workspace.
//!
//! This crate provides:
//! - Tuple builders and a small bootstrap standard library
//! - Property-based generators for random catalog edit sequences
//! - Custom assertion helpers, including a brute-force reverse-index check
//! - One-shot tracing setup for tests
//!
//! # Example Usage
//!
//! ```
//! use catalog::{FlatSchema, LookupOptions, Schema};
//! use testsupport::prelude::*;
//! use types::Name;
//!
//! let (schema, std) = std_schema(FlatSchema::new());
//! let found = schema
//!     .get(&Name::parse("int64"), &LookupOptions::new())
//!     .unwrap();
//! assert_eq!(found, std.int64);
//! assert_reverse_index_consistent(&schema);
//! ```

pub mod assertions;
pub mod fixtures;
pub mod logging;
pub mod proptest_generators;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::*;
    pub use crate::logging::init_tracing;
}
