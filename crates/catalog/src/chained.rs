//! Layered catalog view.
//!
//! A `ChainedSchema` presents three stores as one catalog:
//! - `base`: the committed catalog, never written through this view;
//! - `top`: the working delta that receives every ordinary write;
//! - `global`: session-wide objects (roles, extension packages).
//!
//! Updating an object that only exists in `base` first copies it into `top`.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use common::{CatalogConfig, SchemaResult};
use tracing::debug;
use types::{Name, ObjectId, Value};

use crate::{
    flat::FlatSchema,
    refs::RefKey,
    registry::{LiveValue, Object, SchemaClass},
    resolve::LookupOptions,
    schema::{Schema, union_objects},
};

#[derive(Clone, Debug)]
pub struct ChainedSchema {
    base: FlatSchema,
    top: FlatSchema,
    global: FlatSchema,
}

impl ChainedSchema {
    pub fn new(base: FlatSchema, top: FlatSchema, global: FlatSchema) -> Self {
        Self { base, top, global }
    }

    /// A view over `base` with empty `top` and `global` layers.
    pub fn over(base: FlatSchema) -> Self {
        let config = Arc::clone(base.shared_config());
        Self {
            top: FlatSchema::with_shared_config(Arc::clone(&config)),
            global: FlatSchema::with_shared_config(config),
            base,
        }
    }

    pub fn base(&self) -> &FlatSchema {
        &self.base
    }

    pub fn top(&self) -> &FlatSchema {
        &self.top
    }

    pub fn global(&self) -> &FlatSchema {
        &self.global
    }

    pub fn into_parts(self) -> (FlatSchema, FlatSchema, FlatSchema) {
        (self.base, self.top, self.global)
    }

    fn with_top(&self, top: FlatSchema) -> Self {
        Self {
            base: self.base.clone(),
            top,
            global: self.global.clone(),
        }
    }

    fn with_global(&self, global: FlatSchema) -> Self {
        Self {
            base: self.base.clone(),
            top: self.top.clone(),
            global,
        }
    }

    fn knows_module(&self, module: &str) -> bool {
        self.base.has_module(module) || self.top.has_module(module)
    }

    /// `top`, with a copy of `obj` taken from `base` if `top` lacks one.
    fn shadowed_top(&self, obj: Object) -> SchemaResult<FlatSchema> {
        if self.top.has_object(obj.id) {
            return Ok(self.top.clone());
        }
        let (Some(base_obj), Some(data)) = (
            self.base.maybe_get_by_id(obj.id),
            self.base.maybe_get_data_raw(obj),
        ) else {
            return Ok(self.top.clone());
        };

        debug!(id = %obj.id, class = %base_obj.class, "materializing shadow copy in top layer");
        self.top.insert_raw_with(
            obj.id,
            base_obj.class,
            data.to_vec(),
            &|m| self.knows_module(m),
        )
    }

    /// `opts` with every module owned by `top` added to the disallowed set.
    fn search_base<T>(
        &self,
        opts: &LookupOptions<'_>,
        search: impl FnOnce(&LookupOptions<'_>) -> SchemaResult<T>,
    ) -> SchemaResult<T> {
        let prev = opts.disallow_module;
        let disallow = |m: &str| prev.is_some_and(|f| f(m)) || self.top.has_module(m);
        let mut base_opts = *opts;
        base_opts.disallow_module = Some(&disallow);
        search(&base_opts)
    }
}

impl Schema for ChainedSchema {
    fn config(&self) -> &CatalogConfig {
        self.top.config()
    }

    fn insert_raw(&self, id: ObjectId, class: SchemaClass, data: Vec<Value>) -> SchemaResult<Self> {
        if class.is_layer_global() {
            Ok(self.with_global(self.global.insert_raw(id, class, data)?))
        } else {
            let top = self
                .top
                .insert_raw_with(id, class, data, &|m| self.knows_module(m))?;
            Ok(self.with_top(top))
        }
    }

    fn delete(&self, obj: Object) -> SchemaResult<Self> {
        if obj.class.is_layer_global() {
            Ok(self.with_global(self.global.delete(obj)?))
        } else {
            Ok(self.with_top(self.top.delete(obj)?))
        }
    }

    fn discard(&self, obj: Object) -> SchemaResult<Self> {
        if obj.class.is_layer_global() {
            Ok(self.with_global(self.global.discard(obj)?))
        } else {
            Ok(self.with_top(self.top.discard(obj)?))
        }
    }

    fn unlist(&self, name: &Name) -> Self {
        self.with_top(self.top.unlist(name))
    }

    fn update(&self, obj: Object, updates: Vec<(&str, LiveValue)>) -> SchemaResult<Self> {
        if obj.class.is_layer_global() {
            return Ok(self.with_global(self.global.update(obj, updates)?));
        }
        let top = self
            .shadowed_top(obj)?
            .update_with(obj, updates, &|m| self.knows_module(m))?;
        Ok(self.with_top(top))
    }

    fn clear_field(&self, obj: Object, field: &str) -> SchemaResult<Self> {
        if self.get_field(obj, field)?.is_null() {
            return Ok(self.clone());
        }
        self.update(obj, vec![(field, LiveValue::null())])
    }

    fn maybe_get_data_raw(&self, obj: Object) -> Option<&[Value]> {
        if obj.class.is_layer_global() {
            self.global.maybe_get_data_raw(obj)
        } else {
            self.top
                .maybe_get_data_raw(obj)
                .or_else(|| self.base.maybe_get_data_raw(obj))
        }
    }

    fn maybe_get_by_id(&self, id: ObjectId) -> Option<Object> {
        self.top
            .maybe_get_by_id(id)
            .or_else(|| self.base.maybe_get_by_id(id))
            .or_else(|| self.global.maybe_get_by_id(id))
    }

    fn maybe_get_global(&self, class: SchemaClass, name: &str) -> Option<Object> {
        if class.is_layer_global() {
            self.global.maybe_get_global(class, name)
        } else {
            self.top
                .maybe_get_global(class, name)
                .or_else(|| self.base.maybe_get_global(class, name))
        }
    }

    fn lookup(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Option<Object>> {
        if let Some(found) = self.top.lookup(name, opts)? {
            return Ok(Some(found));
        }
        self.search_base(opts, |opts| self.base.lookup(name, opts))
    }

    fn lookup_overloads(
        &self,
        class: SchemaClass,
        name: &Name,
        opts: &LookupOptions<'_>,
    ) -> SchemaResult<Option<Arc<[Object]>>> {
        if let Some(found) = self.top.lookup_overloads(class, name, opts)? {
            return Ok(Some(found));
        }
        self.search_base(opts, |opts| self.base.lookup_overloads(class, name, opts))
    }

    fn get_referrers(
        &self,
        target: Object,
        class: Option<SchemaClass>,
        field: Option<&str>,
    ) -> SchemaResult<Arc<[Object]>> {
        let base = self.base.get_referrers(target, class, field)?;
        let top = self.top.get_referrers(target, class, field)?;
        let global = self.global.get_referrers(target, class, field)?;
        Ok(union_objects([&base[..], &top[..], &global[..]]))
    }

    fn get_referrers_grouped(
        &self,
        target: Object,
        class: Option<SchemaClass>,
    ) -> SchemaResult<BTreeMap<RefKey, Vec<Object>>> {
        let mut merged: BTreeMap<RefKey, Vec<Object>> = BTreeMap::new();
        for layer in [&self.base, &self.top, &self.global] {
            for (key, objs) in layer.get_referrers_grouped(target, class)? {
                merged.entry(key).or_default().extend(objs);
            }
        }
        for objs in merged.values_mut() {
            objs.sort();
            objs.dedup();
        }
        Ok(merged)
    }

    fn get_casts_to_type(
        &self,
        ty: Object,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>> {
        let base = self.base.get_casts_to_type(ty, implicit, assignment)?;
        let top = self.top.get_casts_to_type(ty, implicit, assignment)?;
        Ok(union_objects([&base[..], &top[..]]))
    }

    fn get_casts_from_type(
        &self,
        ty: Object,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>> {
        let base = self.base.get_casts_from_type(ty, implicit, assignment)?;
        let top = self.top.get_casts_from_type(ty, implicit, assignment)?;
        Ok(union_objects([&base[..], &top[..]]))
    }

    fn has_object(&self, id: ObjectId) -> bool {
        self.base.has_object(id) || self.top.has_object(id) || self.global.has_object(id)
    }

    fn has_module(&self, module: &str) -> bool {
        self.knows_module(module)
    }

    fn has_migration(&self, name: &str) -> bool {
        self.base.has_migration(name) || self.top.has_migration(name)
    }

    fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        let top = self.top.object_ids();
        let base = self
            .base
            .object_ids()
            .filter(|id| !self.top.has_object(*id));
        let global = self
            .global
            .object_ids()
            .filter(|id| !self.top.has_object(*id) && !self.base.has_object(*id));
        Box::new(top.chain(base).chain(global))
    }

    fn get_modules(&self) -> Vec<Object> {
        let mut seen = HashSet::new();
        self.base
            .get_modules()
            .into_iter()
            .chain(self.top.get_modules())
            .filter(|module| seen.insert(module.id))
            .collect()
    }

    fn get_last_migration(&self) -> SchemaResult<Option<Object>> {
        match self.top.get_last_migration()? {
            Some(migration) => Ok(Some(migration)),
            None => self.base.get_last_migration(),
        }
    }
}
