//! The catalog interface shared by single stores and layered views.

use std::{collections::BTreeMap, sync::Arc};

use common::{CatalogConfig, SchemaError, SchemaResult};
use types::{Name, ObjectId, Value};

use crate::{
    iter::{ObjectFilter, SchemaIterator},
    refs::RefKey,
    registry::{LiveValue, NAME_FIELD, Object, SchemaClass},
    resolve::{self, LookupOptions},
};

/// Read and write access to one immutable catalog snapshot.
///
/// Every write returns a new snapshot and leaves the receiver untouched.
pub trait Schema: Clone + std::fmt::Debug {
    fn config(&self) -> &CatalogConfig;

    /// Add an object from an already reduced field tuple.
    ///
    /// Fails on a duplicate id, a duplicate name, or a qualified name whose
    /// module is not in the catalog.
    fn insert_raw(&self, id: ObjectId, class: SchemaClass, data: Vec<Value>)
    -> SchemaResult<Self>;

    /// Add an object from live values, reducing every reducible field first.
    fn insert(&self, id: ObjectId, class: SchemaClass, data: Vec<LiveValue>) -> SchemaResult<Self> {
        let fields = class.descriptor().fields;
        if data.len() != fields.len() {
            return Err(SchemaError::internal(format!(
                "{class} expects {} fields, got {}",
                fields.len(),
                data.len()
            )));
        }
        let reduced = data
            .into_iter()
            .zip(fields)
            .map(|(value, field)| value.prepare(field))
            .collect::<SchemaResult<Vec<_>>>()?;
        self.insert_raw(id, class, reduced)
    }

    /// Remove an object from every index; fails if it is absent.
    fn delete(&self, obj: Object) -> SchemaResult<Self>;

    /// Like [`Schema::delete`], but an absent object is not an error.
    fn discard(&self, obj: Object) -> SchemaResult<Self> {
        if self.has_object(obj.id) {
            self.delete(obj)
        } else {
            Ok(self.clone())
        }
    }

    /// Drop a qualified name from the name index only.
    fn unlist(&self, name: &Name) -> Self;

    /// Replace several fields at once, applying the net reference change.
    fn update(&self, obj: Object, updates: Vec<(&str, LiveValue)>) -> SchemaResult<Self>;

    fn set_field(&self, obj: Object, field: &str, value: impl Into<LiveValue>) -> SchemaResult<Self> {
        self.update(obj, vec![(field, value.into())])
    }

    fn clear_field(&self, obj: Object, field: &str) -> SchemaResult<Self> {
        self.update(obj, vec![(field, LiveValue::null())])
    }

    fn maybe_get_data_raw(&self, obj: Object) -> Option<&[Value]>;

    fn get_data_raw(&self, obj: Object) -> SchemaResult<&[Value]> {
        self.maybe_get_data_raw(obj).ok_or_else(|| {
            SchemaError::internal(format!(
                "cannot get item data: {} {} is not present in {self:?}",
                obj.class, obj.id
            ))
        })
    }

    fn get_field(&self, obj: Object, field: &str) -> SchemaResult<&Value> {
        let index = obj.class.field(field)?.index;
        let data = self.get_data_raw(obj)?;
        Ok(data.get(index).unwrap_or(&Value::Null))
    }

    /// Field value with stored references restored to object handles.
    fn get_field_live(&self, obj: Object, field: &str) -> SchemaResult<LiveValue> {
        let restore = |id: &ObjectId| self.get_by_id(*id, None);
        Ok(match self.get_field(obj, field)? {
            Value::ObjectRef(id) => LiveValue::Object(restore(id)?),
            Value::ObjectList(ids) => {
                LiveValue::Objects(ids.iter().map(restore).collect::<SchemaResult<_>>()?)
            }
            Value::ObjectDict(entries) => LiveValue::NamedObjects(
                entries
                    .iter()
                    .map(|(key, id)| Ok((key.clone(), restore(id)?)))
                    .collect::<SchemaResult<_>>()?,
            ),
            Value::Expression { text, refs } => LiveValue::Expression {
                text: text.clone(),
                refs: refs.iter().map(restore).collect::<SchemaResult<_>>()?,
            },
            plain => LiveValue::Plain(plain.clone()),
        })
    }

    fn name_of(&self, obj: Object) -> SchemaResult<&Name> {
        let data = self.get_data_raw(obj)?;
        data.get(NAME_FIELD)
            .and_then(Value::as_name)
            .ok_or_else(|| SchemaError::internal(format!("{} {} has no name", obj.class, obj.id)))
    }

    fn maybe_get_by_id(&self, id: ObjectId) -> Option<Object>;

    /// Handle for `id`; a missing id or a class mismatch is an internal error.
    fn get_by_id(&self, id: ObjectId, class: Option<SchemaClass>) -> SchemaResult<Object> {
        let obj = self.maybe_get_by_id(id).ok_or_else(|| {
            SchemaError::internal(format!(
                "reference to a non-existent schema item {id} in {self:?}"
            ))
        })?;
        match class {
            Some(expected) if expected != obj.class => Err(SchemaError::internal(format!(
                "schema object {id} exists, but is {}, not {}",
                common::with_article(obj.class.display_name()),
                common::with_article(expected.display_name())
            ))),
            _ => Ok(obj),
        }
    }

    /// Unqualified object by `(class, name)`.
    fn maybe_get_global(&self, class: SchemaClass, name: &str) -> Option<Object>;

    fn get_global(&self, class: SchemaClass, name: &str) -> SchemaResult<Object> {
        self.maybe_get_global(class, name).ok_or_else(|| {
            resolve::bad_reference(&Name::unqualified(name), &LookupOptions::new().with_class(class))
        })
    }

    /// Resolve a possibly unqualified name; `Ok(None)` when nothing matches.
    fn lookup(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Option<Object>>;

    fn maybe_get(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Option<Object>> {
        self.lookup(name, opts)
    }

    fn get(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Object> {
        self.lookup(name, opts)?
            .ok_or_else(|| resolve::bad_reference(name, opts))
    }

    /// Overload set of a short name; `Ok(None)` when nothing matches.
    fn lookup_overloads(
        &self,
        class: SchemaClass,
        name: &Name,
        opts: &LookupOptions<'_>,
    ) -> SchemaResult<Option<Arc<[Object]>>>;

    fn get_functions(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Arc<[Object]>> {
        self.lookup_overloads(SchemaClass::Function, name, opts)?
            .ok_or_else(|| resolve::bad_reference(name, &opts.with_class(SchemaClass::Function)))
    }

    fn get_operators(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Arc<[Object]>> {
        self.lookup_overloads(SchemaClass::Operator, name, opts)?
            .ok_or_else(|| resolve::bad_reference(name, &opts.with_class(SchemaClass::Operator)))
    }

    /// Objects whose reference fields point at `target`, sorted by id.
    fn get_referrers(
        &self,
        target: Object,
        class: Option<SchemaClass>,
        field: Option<&str>,
    ) -> SchemaResult<Arc<[Object]>>;

    /// Referrers of `target` grouped by referring class and field.
    fn get_referrers_grouped(
        &self,
        target: Object,
        class: Option<SchemaClass>,
    ) -> SchemaResult<BTreeMap<RefKey, Vec<Object>>>;

    fn get_casts_to_type(
        &self,
        ty: Object,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>>;

    fn get_casts_from_type(
        &self,
        ty: Object,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>>;

    /// Objects of the same class that list `obj` among their direct bases.
    fn get_children(&self, obj: Object) -> SchemaResult<Arc<[Object]>> {
        self.get_referrers(obj, Some(obj.class), Some("bases"))
    }

    /// Objects of the same class that list `obj` among their ancestors.
    fn get_descendants(&self, obj: Object) -> SchemaResult<Arc<[Object]>> {
        self.get_referrers(obj, Some(obj.class), Some("ancestors"))
    }

    fn has_object(&self, id: ObjectId) -> bool;

    fn has_module(&self, module: &str) -> bool {
        self.maybe_get_global(SchemaClass::Module, module).is_some()
    }

    fn has_migration(&self, name: &str) -> bool {
        self.maybe_get_global(SchemaClass::Migration, name).is_some()
    }

    /// Every object id, each exactly once.
    fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_>;

    fn get_objects(&self, filter: ObjectFilter) -> SchemaIterator<'_, Self> {
        SchemaIterator::new(self, filter)
    }

    fn get_modules(&self) -> Vec<Object>;

    /// Tail of the migration chain, if any migrations exist.
    fn get_last_migration(&self) -> SchemaResult<Option<Object>>;
}

/// Keep the casts among `candidates` whose flags satisfy the request.
pub(crate) fn filter_casts<S: Schema>(
    schema: &S,
    candidates: &[Object],
    implicit: bool,
    assignment: bool,
) -> SchemaResult<Vec<Object>> {
    let mut casts = Vec::with_capacity(candidates.len());
    for cast in candidates {
        let flag = |field: &str| -> SchemaResult<bool> {
            Ok(schema.get_field(*cast, field)?.as_bool().unwrap_or(false))
        };
        if implicit && !flag("allow_implicit")? {
            continue;
        }
        if assignment && !flag("allow_assignment")? {
            continue;
        }
        casts.push(*cast);
    }
    Ok(casts)
}

/// Sorted union of several result sets.
pub(crate) fn union_objects<'a>(sets: impl IntoIterator<Item = &'a [Object]>) -> Arc<[Object]> {
    let mut all: Vec<Object> = sets.into_iter().flatten().copied().collect();
    all.sort();
    all.dedup();
    Arc::from(all)
}
