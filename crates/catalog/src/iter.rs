//! Filtered, restartable enumeration of catalog objects.

use std::collections::BTreeSet;

use types::Name;

use crate::{
    registry::{Object, SchemaClass},
    schema::Schema,
};

/// Declarative part of an object listing.
///
/// # Example
/// ```
/// use catalog::{ObjectFilter, SchemaClass};
///
/// let filter = ObjectFilter::builder()
///     .class(SchemaClass::Function)
///     .exclude_stdlib(true)
///     .build();
/// assert!(filter.exclude_internal);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
pub struct ObjectFilter {
    pub class: Option<SchemaClass>,
    /// Keep only qualified objects from these modules.
    #[builder(default)]
    pub included_modules: BTreeSet<String>,
    /// Drop qualified objects from these modules.
    #[builder(default)]
    pub excluded_modules: BTreeSet<String>,
    #[builder(default)]
    pub included_items: BTreeSet<Name>,
    #[builder(default)]
    pub excluded_items: BTreeSet<Name>,
    /// Drop standard-library modules and pseudo types.
    #[builder(default)]
    pub exclude_stdlib: bool,
    /// Drop layer-global objects such as roles.
    #[builder(default)]
    pub exclude_global: bool,
    /// Drop objects under the extension root module.
    #[builder(default)]
    pub exclude_extensions: bool,
    #[builder(default = true)]
    pub exclude_internal: bool,
}

impl Default for ObjectFilter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ObjectFilter {
    /// Every object, internal ones included.
    pub fn all() -> Self {
        Self::builder().exclude_internal(false).build()
    }

    pub fn of_class(class: SchemaClass) -> Self {
        Self::builder().class(class).build()
    }
}

type ExtraFilter<'a, S> = Box<dyn Fn(&S, Object) -> bool + 'a>;

/// Lazy view over the objects of a schema that pass every filter.
///
/// Iterating never mutates the schema and can be repeated.
pub struct SchemaIterator<'a, S> {
    schema: &'a S,
    filter: ObjectFilter,
    extra: Vec<ExtraFilter<'a, S>>,
}

impl<'a, S: Schema> SchemaIterator<'a, S> {
    pub fn new(schema: &'a S, filter: ObjectFilter) -> Self {
        Self {
            schema,
            filter,
            extra: Vec::new(),
        }
    }

    /// Add a caller predicate; these run after the declarative filters.
    pub fn with_filter(mut self, filter: impl Fn(&S, Object) -> bool + 'a) -> Self {
        self.extra.push(Box::new(filter));
        self
    }

    pub fn filter(&self) -> &ObjectFilter {
        &self.filter
    }

    pub fn iter(&self) -> impl Iterator<Item = Object> + '_ {
        self.schema
            .object_ids()
            .filter_map(|id| self.schema.maybe_get_by_id(id))
            .filter(|obj| self.matches(*obj))
    }

    /// Matching objects ordered by id.
    pub fn to_vec(&self) -> Vec<Object> {
        let mut objs: Vec<Object> = self.iter().collect();
        objs.sort();
        objs
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    fn matches(&self, obj: Object) -> bool {
        let f = &self.filter;
        let config = self.schema.config();
        let desc = obj.descriptor();

        if f.class.is_some_and(|class| class != obj.class) {
            return false;
        }

        let Ok(name) = self.schema.name_of(obj) else {
            return false;
        };
        let module = if desc.qualified { name.module() } else { None };

        if !f.included_modules.is_empty()
            && !module.is_some_and(|m| f.included_modules.contains(m))
        {
            return false;
        }
        if let Some(module) = module
            && (f.excluded_modules.contains(module)
                || (f.exclude_stdlib && config.is_std_module(module)))
        {
            return false;
        }
        if !f.included_items.is_empty() && !f.included_items.contains(name) {
            return false;
        }
        if f.excluded_items.contains(name) {
            return false;
        }
        if f.exclude_stdlib && obj.class == SchemaClass::PseudoType {
            return false;
        }
        if f.exclude_extensions && name.root_module() == config.extension_module {
            return false;
        }
        if f.exclude_global && desc.layer_global {
            return false;
        }
        if f.exclude_internal && desc.internal {
            return false;
        }

        self.extra.iter().all(|extra| extra(self.schema, obj))
    }
}

impl<'s, S: Schema> IntoIterator for &'s SchemaIterator<'_, S> {
    type Item = Object;
    type IntoIter = Box<dyn Iterator<Item = Object> + 's>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
