//! Single-layer catalog store.
//!
//! `FlatSchema` keeps every object's field tuple in persistent maps together
//! with three name indices and the reverse-reference index. Each write builds a
//! successor value that shares all untouched structure with its predecessor.

use std::{collections::BTreeMap, fmt, sync::Arc};

use common::{CatalogConfig, SchemaError, SchemaResult};
use tracing::trace;
use types::{Name, ObjectId, Value};

use crate::{
    memo::{MemoKey, SnapshotId, SnapshotMemo},
    migrations,
    pmap::{PersistentMap, PersistentSet},
    refs::{FieldDelta, RefKey, ReverseIndex},
    registry::{LiveValue, NAME_FIELD, Object, SchemaClass},
    resolve::{self, LookupOptions},
    schema::{Schema, filter_casts},
};

type NameKey = (SchemaClass, String);

/// One immutable snapshot of a catalog store.
#[derive(Clone)]
pub struct FlatSchema {
    id_to_data: PersistentMap<ObjectId, Arc<[Value]>>,
    id_to_type: PersistentMap<ObjectId, SchemaClass>,
    name_to_id: PersistentMap<Name, ObjectId>,
    shortname_to_id: PersistentMap<(SchemaClass, Name), PersistentSet<ObjectId>>,
    globalname_to_id: PersistentMap<NameKey, ObjectId>,
    refs_to: ReverseIndex,
    generation: u64,
    snapshot: SnapshotId,
    config: Arc<CatalogConfig>,
    memo: Arc<SnapshotMemo>,
}

impl FlatSchema {
    /// An empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::default())
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub(crate) fn with_shared_config(config: Arc<CatalogConfig>) -> Self {
        let memo = Arc::new(SnapshotMemo::new(config.memo_capacity));
        Self {
            id_to_data: PersistentMap::new(),
            id_to_type: PersistentMap::new(),
            name_to_id: PersistentMap::new(),
            shortname_to_id: PersistentMap::new(),
            globalname_to_id: PersistentMap::new(),
            refs_to: ReverseIndex::new(),
            generation: 0,
            snapshot: SnapshotId::next(),
            config,
            memo,
        }
    }

    /// Number of structural replacements that led to this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot
    }

    pub fn len(&self) -> usize {
        self.id_to_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_type.is_empty()
    }

    pub fn reverse_index(&self) -> &ReverseIndex {
        &self.refs_to
    }

    pub(crate) fn shared_config(&self) -> &Arc<CatalogConfig> {
        &self.config
    }

    /// Fresh snapshot sharing all data with `self`, with its own memo.
    fn successor(&self) -> Self {
        Self {
            id_to_data: self.id_to_data.clone(),
            id_to_type: self.id_to_type.clone(),
            name_to_id: self.name_to_id.clone(),
            shortname_to_id: self.shortname_to_id.clone(),
            globalname_to_id: self.globalname_to_id.clone(),
            refs_to: self.refs_to.clone(),
            generation: self.generation + 1,
            snapshot: SnapshotId::next(),
            config: Arc::clone(&self.config),
            memo: Arc::new(SnapshotMemo::new(self.config.memo_capacity)),
        }
    }

    /// `class 'name'`, as used in conflict messages.
    pub fn verbose_name(&self, obj: Object) -> String {
        match self.name_of(obj) {
            Ok(name) => format!(
                "{} '{}'",
                obj.class.display_name(),
                resolve::display_name(obj.class, name)
            ),
            Err(_) => format!("{} {}", obj.class.display_name(), obj.id),
        }
    }

    pub(crate) fn insert_raw_with(
        &self,
        id: ObjectId,
        class: SchemaClass,
        data: Vec<Value>,
        known_module: &dyn Fn(&str) -> bool,
    ) -> SchemaResult<Self> {
        let expected = class.descriptor().field_count();
        if data.len() != expected {
            return Err(SchemaError::internal(format!(
                "{class} expects {expected} fields, got {}",
                data.len()
            )));
        }
        self.insert_unchecked(id, class, data, known_module)
    }

    /// Insert a tuple that may predate fields added to its class since.
    pub(crate) fn insert_loaded(
        &self,
        id: ObjectId,
        class: SchemaClass,
        data: Vec<Value>,
    ) -> SchemaResult<Self> {
        let limit = class.descriptor().field_count();
        if data.len() > limit {
            return Err(SchemaError::internal(format!(
                "{class} has {limit} fields, stored tuple has {}",
                data.len()
            )));
        }
        self.insert_unchecked(id, class, data, &|m| self.has_module(m))
    }

    fn insert_unchecked(
        &self,
        id: ObjectId,
        class: SchemaClass,
        data: Vec<Value>,
        known_module: &dyn Fn(&str) -> bool,
    ) -> SchemaResult<Self> {
        if self.id_to_type.contains_key(&id) {
            return Err(SchemaError::DuplicateId {
                class: class.display_name().to_string(),
                id,
            });
        }
        let next = self.write_object(id, class, None, Some(data), known_module)?;
        trace!(%id, %class, generation = next.generation, "inserted schema object");
        Ok(next)
    }

    pub(crate) fn update_with(
        &self,
        obj: Object,
        updates: Vec<(&str, LiveValue)>,
        known_module: &dyn Fn(&str) -> bool,
    ) -> SchemaResult<Self> {
        let (class, old) = self.stored(obj, "update")?;
        if updates.is_empty() {
            return Ok(self.clone());
        }

        let desc = class.descriptor();
        let mut data = old.to_vec();
        data.resize(desc.field_count().max(data.len()), Value::Null);
        for (field, value) in updates {
            let field = desc.field(field)?;
            data[field.index] = value.prepare(field)?;
        }

        let next = self.write_object(obj.id, class, Some(old), Some(data), known_module)?;
        trace!(id = %obj.id, %class, generation = next.generation, "updated schema object");
        Ok(next)
    }

    fn stored(&self, obj: Object, action: &str) -> SchemaResult<(SchemaClass, &[Value])> {
        match (self.id_to_type.get(&obj.id), self.id_to_data.get(&obj.id)) {
            (Some(class), Some(data)) => Ok((*class, &data[..])),
            _ => Err(SchemaError::internal(format!(
                "cannot {action} {} {}: not present in {self}",
                obj.class, obj.id
            ))),
        }
    }

    /// Replace the stored tuple of `id`, keeping every index in step.
    ///
    /// `old` is `None` for an insert and `new` is `None` for a delete.
    fn write_object(
        &self,
        id: ObjectId,
        class: SchemaClass,
        old: Option<&[Value]>,
        new: Option<Vec<Value>>,
        known_module: &dyn Fn(&str) -> bool,
    ) -> SchemaResult<Self> {
        let desc = class.descriptor();
        let old_name = old.map(|data| stored_name(class, data)).transpose()?;
        let new_name = new
            .as_deref()
            .map(|data| stored_name(class, data))
            .transpose()?;

        let mut next = self.successor();

        if old_name != new_name {
            if let Some(name) = old_name {
                next.remove_name(id, class, name);
            }
            if let Some(name) = new_name {
                next.add_name(id, class, name, known_module)?;
            }
        }

        let deltas: Vec<FieldDelta> = desc
            .reference_fields()
            .map(|field| {
                FieldDelta::new(
                    field.name,
                    field_at(old, field.index),
                    field_at(new.as_deref(), field.index),
                )
            })
            .filter(|delta| !delta.is_noop())
            .collect();
        if !deltas.is_empty() {
            next.refs_to = next.refs_to.apply(id, class, &deltas);
        }

        match new {
            Some(data) => {
                next.id_to_data = next.id_to_data.insert(id, Arc::from(data));
                next.id_to_type = next.id_to_type.insert(id, class);
            }
            None => {
                next.id_to_data = next.id_to_data.remove(&id);
                next.id_to_type = next.id_to_type.remove(&id);
            }
        }
        Ok(next)
    }

    /// Drops the index entries for `name`, leaving any held by another
    /// object after an `unlist`.
    fn remove_name(&mut self, id: ObjectId, class: SchemaClass, name: &Name) {
        if class.is_qualified() {
            if self.name_to_id.get(name) == Some(&id) {
                self.name_to_id = self.name_to_id.remove(name);
            }
        } else {
            let key = (class, name.name().to_string());
            if self.globalname_to_id.get(&key) == Some(&id) {
                self.globalname_to_id = self.globalname_to_id.remove(&key);
            }
        }

        if class.descriptor().overloaded {
            let key = (class, name.shortname());
            if let Some(ids) = self.shortname_to_id.get(&key) {
                let ids = ids.remove(&id);
                self.shortname_to_id = if ids.is_empty() {
                    self.shortname_to_id.remove(&key)
                } else {
                    self.shortname_to_id.insert(key, ids)
                };
            }
        }
    }

    fn add_name(
        &mut self,
        id: ObjectId,
        class: SchemaClass,
        name: &Name,
        known_module: &dyn Fn(&str) -> bool,
    ) -> SchemaResult<()> {
        if class.is_qualified() {
            let module = name.module().unwrap_or_default();
            if !known_module(module) && !self.config.is_special_module(module) {
                return Err(SchemaError::UnknownModule(module.to_string()));
            }
            if let Some(existing) = self.name_to_id.get(name) {
                return Err(self.conflict(*existing));
            }
            self.name_to_id = self.name_to_id.insert(name.clone(), id);
        } else {
            let key = (class, name.name().to_string());
            if let Some(existing) = self.globalname_to_id.get(&key) {
                return Err(self.conflict(*existing));
            }
            self.globalname_to_id = self.globalname_to_id.insert(key, id);
        }

        if class.descriptor().overloaded {
            let key = (class, name.shortname());
            let ids = self.shortname_to_id.get(&key).cloned().unwrap_or_default();
            self.shortname_to_id = self.shortname_to_id.insert(key, ids.insert(id));
        }
        Ok(())
    }

    fn conflict(&self, existing: ObjectId) -> SchemaError {
        let description = match self.maybe_get_by_id(existing) {
            Some(obj) => self.verbose_name(obj),
            None => format!("schema item {existing}"),
        };
        SchemaError::AlreadyExists(description)
    }

    fn overloads(&self, class: SchemaClass, name: &Name) -> SchemaResult<Option<Arc<[Object]>>> {
        let key = MemoKey::Overloads {
            class,
            name: name.clone(),
        };
        let found = self.memo.get_or_try_insert(key, || {
            let Some(ids) = self.shortname_to_id.get(&(class, name.clone())) else {
                return Ok(Arc::from(Vec::new()));
            };
            let mut objs = ids
                .iter()
                .map(|id| self.get_by_id(*id, Some(class)))
                .collect::<SchemaResult<Vec<_>>>()?;
            objs.sort();
            Ok(Arc::from(objs))
        })?;
        Ok((!found.is_empty()).then_some(found))
    }

    fn collect_referrers(
        &self,
        target: ObjectId,
        mut keep: impl FnMut(&RefKey) -> bool,
    ) -> SchemaResult<Vec<Object>> {
        let Some(entry) = self.refs_to.referrers(&target) else {
            return Ok(Vec::new());
        };
        let mut objs = Vec::new();
        for (key, ids) in entry.iter() {
            if !keep(key) {
                continue;
            }
            for id in ids.iter() {
                objs.push(self.get_by_id(*id, None)?);
            }
        }
        objs.sort();
        objs.dedup();
        Ok(objs)
    }

    fn casts(
        &self,
        ty: Object,
        field: &'static str,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>> {
        let key = MemoKey::Casts {
            ty: ty.id,
            field,
            implicit,
            assignment,
        };
        self.memo.get_or_try_insert(key, || {
            let candidates = self.get_referrers(ty, Some(SchemaClass::Cast), Some(field))?;
            Ok(Arc::from(filter_casts(self, &candidates, implicit, assignment)?))
        })
    }

    fn globals_of(&self, class: SchemaClass) -> Vec<Object> {
        let mut found: Vec<(&str, Object)> = self
            .globalname_to_id
            .iter()
            .filter(|((c, _), _)| *c == class)
            .map(|((_, name), id)| (name.as_str(), Object::new(*id, class)))
            .collect();
        found.sort();
        found.into_iter().map(|(_, obj)| obj).collect()
    }

    /// Stored tuples in id order.
    pub(crate) fn raw_objects(&self) -> impl Iterator<Item = (Object, &Arc<[Value]>)> + '_ {
        let mut ids: Vec<&ObjectId> = self.id_to_data.keys().collect();
        ids.sort();
        ids.into_iter().filter_map(|id| {
            let class = self.id_to_type.get(id)?;
            let data = self.id_to_data.get(id)?;
            Some((Object::new(*id, *class), data))
        })
    }

    /// Swap in repaired tuples without touching any index.
    pub(crate) fn with_replaced_data(&self, fixes: Vec<(ObjectId, Vec<Value>)>) -> Self {
        let mut next = self.successor();
        for (id, data) in fixes {
            next.id_to_data = next.id_to_data.insert(id, Arc::from(data));
        }
        next
    }
}

fn stored_name(class: SchemaClass, data: &[Value]) -> SchemaResult<&Name> {
    let name = data.get(NAME_FIELD).and_then(Value::as_name).ok_or_else(|| {
        SchemaError::internal(format!("{class} is missing its name"))
    })?;
    if name.is_qualified() != class.is_qualified() {
        let kind = if class.is_qualified() { "qualified" } else { "unqualified" };
        return Err(SchemaError::internal(format!(
            "{class} name '{name}' must be {kind}"
        )));
    }
    Ok(name)
}

fn field_at(data: Option<&[Value]>, index: usize) -> &Value {
    data.and_then(|data| data.get(index)).unwrap_or(&Value::Null)
}

impl Default for FlatSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlatSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<FlatSchema gen:{}>", self.generation)
    }
}

impl fmt::Debug for FlatSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatSchema")
            .field("generation", &self.generation)
            .field("snapshot", &self.snapshot)
            .field("objects", &self.id_to_type.len())
            .field("memo", &self.memo)
            .finish()
    }
}

impl Schema for FlatSchema {
    fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn insert_raw(&self, id: ObjectId, class: SchemaClass, data: Vec<Value>) -> SchemaResult<Self> {
        self.insert_raw_with(id, class, data, &|m| self.has_module(m))
    }

    fn delete(&self, obj: Object) -> SchemaResult<Self> {
        let (class, old) = self.stored(obj, "delete")?;
        let next = self.write_object(obj.id, class, Some(old), None, &|_| true)?;
        trace!(id = %obj.id, %class, generation = next.generation, "deleted schema object");
        Ok(next)
    }

    fn unlist(&self, name: &Name) -> Self {
        if !self.name_to_id.contains_key(name) {
            return self.clone();
        }
        let mut next = self.successor();
        next.name_to_id = next.name_to_id.remove(name);
        next
    }

    fn update(&self, obj: Object, updates: Vec<(&str, LiveValue)>) -> SchemaResult<Self> {
        self.update_with(obj, updates, &|m| self.has_module(m))
    }

    fn clear_field(&self, obj: Object, field: &str) -> SchemaResult<Self> {
        if self.get_field(obj, field)?.is_null() {
            return Ok(self.clone());
        }
        self.update(obj, vec![(field, LiveValue::null())])
    }

    fn maybe_get_data_raw(&self, obj: Object) -> Option<&[Value]> {
        self.id_to_data.get(&obj.id).map(|data| &data[..])
    }

    fn maybe_get_by_id(&self, id: ObjectId) -> Option<Object> {
        self.id_to_type.get(&id).map(|class| Object::new(id, *class))
    }

    fn maybe_get_global(&self, class: SchemaClass, name: &str) -> Option<Object> {
        self.globalname_to_id
            .get(&(class, name.to_string()))
            .map(|id| Object::new(*id, class))
    }

    fn lookup(&self, name: &Name, opts: &LookupOptions<'_>) -> SchemaResult<Option<Object>> {
        let getter = |candidate: &Name| -> SchemaResult<Option<Object>> {
            let found = self
                .name_to_id
                .get(candidate)
                .and_then(|id| self.maybe_get_by_id(*id));
            Ok(found.filter(|obj| opts.accepts(*obj)))
        };
        let found = resolve::search(name, &self.config, opts, |m| self.has_module(m), getter)?;

        if let (Some(obj), Some(expected)) = (found, opts.class)
            && obj.class != expected
        {
            return Err(resolve::wrong_type(name, obj.class, expected, opts.span));
        }
        Ok(found)
    }

    fn lookup_overloads(
        &self,
        class: SchemaClass,
        name: &Name,
        opts: &LookupOptions<'_>,
    ) -> SchemaResult<Option<Arc<[Object]>>> {
        if !class.descriptor().overloaded {
            return Err(SchemaError::internal(format!(
                "{class} objects are not overloaded"
            )));
        }
        resolve::search(
            name,
            &self.config,
            opts,
            |m| self.has_module(m),
            |candidate| self.overloads(class, candidate),
        )
    }

    fn get_referrers(
        &self,
        target: Object,
        class: Option<SchemaClass>,
        field: Option<&str>,
    ) -> SchemaResult<Arc<[Object]>> {
        let key = MemoKey::Referrers {
            target: target.id,
            class,
            field: field.map(str::to_string),
        };
        self.memo.get_or_try_insert(key, || {
            let objs = self.collect_referrers(target.id, |(c, f)| {
                class.is_none_or(|class| class == *c) && field.is_none_or(|field| field == *f)
            })?;
            Ok(Arc::from(objs))
        })
    }

    fn get_referrers_grouped(
        &self,
        target: Object,
        class: Option<SchemaClass>,
    ) -> SchemaResult<BTreeMap<RefKey, Vec<Object>>> {
        let mut grouped = BTreeMap::new();
        let Some(entry) = self.refs_to.referrers(&target.id) else {
            return Ok(grouped);
        };
        for (key, ids) in entry.iter() {
            if class.is_some_and(|class| class != key.0) {
                continue;
            }
            let mut objs = ids
                .iter()
                .map(|id| self.get_by_id(*id, None))
                .collect::<SchemaResult<Vec<_>>>()?;
            objs.sort();
            grouped.insert(*key, objs);
        }
        Ok(grouped)
    }

    fn get_casts_to_type(
        &self,
        ty: Object,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>> {
        self.casts(ty, "to_type", implicit, assignment)
    }

    fn get_casts_from_type(
        &self,
        ty: Object,
        implicit: bool,
        assignment: bool,
    ) -> SchemaResult<Arc<[Object]>> {
        self.casts(ty, "from_type", implicit, assignment)
    }

    fn has_object(&self, id: ObjectId) -> bool {
        self.id_to_type.contains_key(&id)
    }

    fn object_ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(self.id_to_type.keys().copied())
    }

    fn get_modules(&self) -> Vec<Object> {
        self.globals_of(SchemaClass::Module)
    }

    fn get_last_migration(&self) -> SchemaResult<Option<Object>> {
        migrations::last_migration(self, &self.globals_of(SchemaClass::Migration))
    }
}
