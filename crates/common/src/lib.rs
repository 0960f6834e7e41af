
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use types::{Name, ObjectId, Value};

/// Location of the source text that triggered a lookup.
/// Examples:
/// - `let span = Span::new(10, 14);`
/// - `let span = Span::new(0, 3).with_filename("default.esdl");`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub filename: Option<String>,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(file) => write!(f, "{file}:{}..{}", self.start, self.end),
            None => write!(f, "{}..{}", self.start, self.end),
        }
    }
}

/// Canonical error type raised by the schema catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A name is already taken; carries the verbose name of the existing object.
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{class} ({id}) is already present in the schema")]
    DuplicateId { class: String, id: ObjectId },
    #[error("module '{0}' is not in this schema")]
    UnknownModule(String),
    #[error("{label} '{name}' does not exist")]
    InvalidReference {
        label: String,
        name: String,
        span: Option<Span>,
    },
    #[error("'{name}' exists, but is {actual}, not {expected}")]
    WrongType {
        name: String,
        actual: String,
        expected: String,
        span: Option<Span>,
    },
    /// Broken catalog invariant; a compiler bug rather than a user mistake.
    #[error("internal: {0}")]
    Internal(String),
}

impl SchemaError {
    pub fn internal(msg: impl Into<String>) -> Self {
        SchemaError::Internal(msg.into())
    }

    /// Duplicate names, duplicate ids and unknown modules.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            SchemaError::AlreadyExists(_)
                | SchemaError::DuplicateId { .. }
                | SchemaError::UnknownModule(_)
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, SchemaError::Internal(_))
    }

    pub fn span(&self) -> Option<&Span> {
        match self {
            SchemaError::InvalidReference { span, .. } | SchemaError::WrongType { span, .. } => {
                span.as_ref()
            }
            _ => None,
        }
    }
}

/// Result alias that carries a `SchemaError`.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Prefix a noun with the matching indefinite article.
pub fn with_article(noun: &str) -> String {
    match noun.chars().next() {
        Some(c) if "aeiouAEIOU".contains(c) => format!("an {noun}"),
        _ => format!("a {noun}"),
    }
}

fn default_std_modules() -> Vec<String> {
    [
        "std",
        "schema",
        "std::math",
        "sys",
        "sys::perm",
        "cfg",
        "cfg::perm",
        "std::cal",
        "std::net",
        "std::net::http",
        "std::net::perm",
        "std::pg",
        "std::_test",
        "std::fts",
        "std::lang",
        "std::lang::go",
        "std::lang::js",
        "std::lang::py",
        "std::lang::rs",
        "ext",
        "std::enc",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_special_modules() -> Vec<String> {
    ["__derived__", "__ext_casts__", "__ext_index_matches__"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Naming conventions and tuning knobs for a catalog store.
///
/// # Example
/// ```
/// use common::CatalogConfig;
///
/// let config = CatalogConfig::builder()
///     .std_module("std".to_string())
///     .memo_capacity(64)
///     .build();
/// assert_eq!(config.current_module_anchor, "__current__");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct CatalogConfig {
    /// Modules that make up the standard library.
    #[builder(default = default_std_modules())]
    pub std_modules: Vec<String>,
    /// Modules that may hold qualified objects without being registered.
    #[builder(default = default_special_modules())]
    pub special_modules: Vec<String>,
    /// Root module searched when a name falls back to the standard library.
    #[builder(default = String::from("std"))]
    pub std_module: String,
    /// Module marker that pins a lookup to the standard library root.
    #[builder(default = String::from("__std__"))]
    pub std_anchor: String,
    /// Module marker expanded to the caller's current module.
    #[builder(default = String::from("__current__"))]
    pub current_module_anchor: String,
    /// Root module of extension-provided objects.
    #[builder(default = String::from("ext"))]
    pub extension_module: String,
    /// Entries kept by each snapshot's query memo; zero disables it.
    #[builder(default = 256)]
    pub memo_capacity: usize,
}

impl CatalogConfig {
    pub fn is_std_module(&self, module: &str) -> bool {
        self.std_modules.iter().any(|m| m == module)
    }

    pub fn is_special_module(&self, module: &str) -> bool {
        self.special_modules.iter().any(|m| m == module)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            std_modules: default_std_modules(),
            special_modules: default_special_modules(),
            std_module: String::from("std"),
            std_anchor: String::from("__std__"),
            current_module_anchor: String::from("__current__"),
            extension_module: String::from("ext"),
            memo_capacity: 256,
        }
    }
}
