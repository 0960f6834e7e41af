use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Separator between module path segments and the short name.
pub const PATH_SEPARATOR: &str = "::";

/// Separator between the short name of an overload and its mangled signature.
pub const SIGNATURE_SEPARATOR: char = '@';

/// Name of a schema object.
///
/// Qualified names live inside a module (`std::math::abs`); unqualified names
/// identify objects such as modules, migrations and roles whose names are only
/// unique per class. Module names are themselves unqualified even when they
/// contain path separators (`std::math`).
///
/// Overloaded objects carry a mangled full name, `module::short@signature`;
/// [`Name::shortname`] strips the signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Name {
    Unqualified(String),
    Qualified { module: String, name: String },
}

impl Name {
    /// Parse a possibly qualified name; the last `::` splits module and name.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once(PATH_SEPARATOR) {
            Some((module, name)) if !module.is_empty() => Name::Qualified {
                module: module.to_string(),
                name: name.to_string(),
            },
            _ => Name::Unqualified(text.to_string()),
        }
    }

    pub fn qualified(module: impl Into<String>, name: impl Into<String>) -> Self {
        Name::Qualified {
            module: module.into(),
            name: name.into(),
        }
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Name::Unqualified(name.into())
    }

    pub fn is_qualified(&self) -> bool {
        matches!(self, Name::Qualified { .. })
    }

    /// Module component of a qualified name.
    pub fn module(&self) -> Option<&str> {
        match self {
            Name::Qualified { module, .. } => Some(module),
            Name::Unqualified(_) => None,
        }
    }

    /// The last path component.
    pub fn name(&self) -> &str {
        match self {
            Name::Qualified { name, .. } => name,
            Name::Unqualified(name) => name,
        }
    }

    /// First segment of the module path (or of the name itself when unqualified).
    ///
    /// `std::math::abs` -> `std`, `ext::auth` -> `ext`.
    pub fn root_module(&self) -> &str {
        let path = match self {
            Name::Qualified { module, .. } => module.as_str(),
            Name::Unqualified(name) => name.as_str(),
        };
        path.split(PATH_SEPARATOR).next().unwrap_or(path)
    }

    /// Strip a mangled overload signature: `default::foo@int64` -> `default::foo`.
    pub fn shortname(&self) -> Name {
        match self {
            Name::Qualified { module, name } => Name::Qualified {
                module: module.clone(),
                name: strip_signature(name).to_string(),
            },
            Name::Unqualified(name) => Name::Unqualified(strip_signature(name).to_string()),
        }
    }
}

fn strip_signature(name: &str) -> &str {
    match name.split_once(SIGNATURE_SEPARATOR) {
        Some((short, _)) => short,
        None => name,
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Qualified { module, name } => write!(f, "{module}{PATH_SEPARATOR}{name}"),
            Name::Unqualified(name) => f.write_str(name),
        }
    }
}

impl FromStr for Name {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Name::parse(s))
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::parse(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::parse(&value)
    }
}

impl From<&Name> for Name {
    fn from(value: &Name) -> Self {
        value.clone()
    }
}
