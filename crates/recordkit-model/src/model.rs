//! The active-record model.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use recordkit_core::{
    DataMap, DbProp, Error, FieldValidationError, Result, SchemaError, SchemaErrorKind, SqlType,
    UnknownFieldPolicy, ValidationError, Value,
};
use recordkit_query::{DbConfig, Dialect, IndexDef, LoadTarget, Params, Query, ResultHandler, Tx};

use crate::entity::{Entity, Field};
use crate::holder::ModelHolder;
use crate::listener::ModelEvent;
use crate::meta::ModelMeta;
use crate::partition::MetaPartition;
use crate::statement;

/// An entity value bound to its table, with change tracking and lifecycle.
///
/// Reads go through `Deref` to the entity; writes go through [`Model::set`] or
/// [`Model::edit`] so that changed fields are recorded. Mutating operations
/// run listener hooks, fill audit columns and, for tables listed in
/// `history.tables`, write a history row in the same transaction.
///
/// # Example
///
/// ```ignore
/// let mut order = Model::<Order>::new().use_db(&db);
/// order.set("title", "first")?;
/// order.save()?;
/// order.edit(|o| o.title = Some("renamed".into()));
/// order.update()?;
/// ```
#[derive(Clone)]
pub struct Model<E: Entity> {
    pub(crate) entity: E,
    table: String,
    meta: Arc<ModelMeta<E>>,
    pub(crate) holder: ModelHolder,
    db: Option<DbConfig>,
    pub(crate) tx: Option<Tx>,
}

impl<E: Entity> Model<E> {
    pub fn new() -> Self {
        Self::from_parts(E::default())
    }

    /// Wrap `entity`; its non-null fields count as changed.
    pub fn from_entity(entity: E) -> Self {
        let mut model = Self::from_parts(entity);
        for (i, field) in model.meta.fields.iter().enumerate() {
            if !field.get(&model.entity).is_null() {
                model.holder.mark_changed(i);
            }
        }
        model
    }

    fn from_parts(entity: E) -> Self {
        let meta = ModelMeta::<E>::get();
        Self {
            entity,
            table: meta.table.clone(),
            meta,
            holder: ModelHolder::new(),
            db: None,
            tx: None,
        }
    }

    /// Handler mapping result rows to entities.
    pub fn handler() -> ResultHandler<E> {
        ResultHandler::with(E::from_map)
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    pub fn meta(&self) -> &ModelMeta<E> {
        &self.meta
    }

    /// Declared table; partitioned models store rows in a table derived from it.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn holder(&self) -> &ModelHolder {
        &self.holder
    }

    pub fn is_dirty(&self) -> bool {
        self.holder.dirty
    }

    pub fn is_entity(&self) -> bool {
        self.holder.entity
    }

    pub fn use_db(mut self, db: &DbConfig) -> Self {
        self.db = Some(db.clone());
        self
    }

    pub fn set_db(&mut self, db: &DbConfig) -> &mut Self {
        self.db = Some(db.clone());
        self
    }

    /// The model's database, else the one bound to the entity type.
    pub fn db(&self) -> Option<DbConfig> {
        self.db.clone().or_else(|| self.meta.db.clone())
    }

    pub(crate) fn require_db(&self) -> Result<DbConfig> {
        self.db()
            .ok_or_else(|| Error::config(format!("No database for model: {}", self.table)))
    }

    /// Run every operation of this model inside `tx`.
    pub fn tx(mut self, tx: &Tx) -> Self {
        self.tx = Some(tx.clone());
        self
    }

    pub fn with_tx(mut self, tx: Option<&Tx>) -> Self {
        self.tx = tx.cloned();
        self
    }

    pub fn set_tx(&mut self, tx: Option<&Tx>) -> &mut Self {
        self.tx = tx.cloned();
        self
    }

    pub fn current_tx(&self) -> Option<&Tx> {
        self.tx.as_ref()
    }

    fn query(&self, db: &DbConfig) -> Query {
        Query::with_db(db).with_tx(self.tx.as_ref())
    }

    /// `SELECT <selected fields> FROM <table>`, ready for a `WHERE` clause.
    pub fn select(&self) -> Result<Query> {
        let db = self.require_db()?;
        let dialect = db.dialect();
        let table = self.resolve_table()?;
        let sql = statement::select_sql(
            dialect.as_ref(),
            &table,
            &self.select_fields(dialect.as_ref()),
            None,
        );
        Ok(self.query(&db).add(sql, ()))
    }

    // ---- fields ----

    pub fn fields(&self) -> &'static [Field<E>] {
        self.meta.fields
    }

    pub fn auto_field(&self) -> Option<&'static Field<E>> {
        self.meta.auto_field()
    }

    pub fn indexes(&self) -> &[IndexDef] {
        self.meta.indexes()
    }

    pub fn unique_indexes(&self) -> Vec<&IndexDef> {
        self.meta.indexes().iter().filter(|ix| ix.unique).collect()
    }

    /// Value of the field or column called `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.meta.field(name).map(|f| f.get(&self.entity))
    }

    /// Value of `name`, or `default` when the field is missing or null.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Value {
        match self.get(name) {
            Some(v) if !v.is_null() => v,
            _ => default.into(),
        }
    }

    /// Set a field by field or column name and mark it changed.
    ///
    /// Unknown names follow the database's `set.unknown_field` policy; models
    /// without a database ignore them.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let reject = match self.db() {
            Some(db) => db.properties().unknown_field_policy(&self.table)? == UnknownFieldPolicy::Reject,
            None => false,
        };
        self.set_checked(name, value, reject)
    }

    /// [`Model::set`] with an explicit unknown-field policy.
    pub fn set_checked(&mut self, name: &str, value: impl Into<Value>, reject: bool) -> Result<&mut Self> {
        match self.meta.index_of(name) {
            Some(i) => self.set_index(i, value.into())?,
            None if reject => {
                return Err(Error::config(format!("Field not found: {}.{}", self.table, name)));
            }
            None => tracing::trace!(table = %self.table, field = name, "Ignored unknown field"),
        }
        Ok(self)
    }

    pub(crate) fn set_index(&mut self, index: usize, value: Value) -> Result<()> {
        let fields = self.meta.fields;
        fields[index].set(&mut self.entity, value)?;
        self.holder.mark_changed(index);
        Ok(())
    }

    /// Mutate the entity directly; fields whose value changed are marked.
    pub fn edit(&mut self, f: impl FnOnce(&mut E)) -> &mut Self {
        let fields = self.meta.fields;
        let before: Vec<Value> = fields.iter().map(|field| field.get(&self.entity)).collect();
        f(&mut self.entity);
        for (i, (field, old)) in fields.iter().zip(before).enumerate() {
            if field.get(&self.entity) != old {
                self.holder.mark_changed(i);
            }
        }
        self
    }

    /// Names of the changed fields.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.holder
            .changes()
            .map(|i| self.meta.fields[i].name)
            .collect()
    }

    pub fn clear_changes(&mut self) -> &mut Self {
        self.holder.clear_changes();
        self
    }

    /// Forget changes of fields that are now null.
    pub fn clear_changes_null(&mut self) -> &mut Self {
        let fields = self.meta.fields;
        let entity = &self.entity;
        self.holder
            .retain_changes(|&i| !fields[i].get(entity).is_null());
        self
    }

    /// Reset every field to the entity's default and forget changes.
    pub fn clear(&mut self) -> &mut Self {
        self.entity = E::default();
        self.holder.clear_changes();
        self.holder.unsync();
        self.holder.entity = false;
        self
    }

    /// Fill null fields from their column defaults.
    ///
    /// Auto-increment fields are skipped. NOT NULL columns without a usable
    /// default get the zero value of their type.
    pub fn defaults(&mut self) -> Result<&mut Self> {
        let fields = self.meta.fields;
        for (i, field) in fields.iter().enumerate() {
            let column = &field.column;
            if column.auto || !field.get(&self.entity).is_null() {
                continue;
            }
            let value = match column.default.and_then(|d| default_value(&column.sql_type, d)) {
                Some(v) => Some(v),
                None if column.not_null => Some(zero_value(&column.sql_type)),
                None => None,
            };
            if let Some(value) = value {
                self.set_index(i, value)?;
            }
        }
        self.holder.entity = false;
        Ok(self)
    }

    /// Shorten strings longer than their column to `length - 4` characters
    /// followed by `" ..."`. Columns of length 5 or less are left alone.
    pub fn cut(&mut self) -> Result<&mut Self> {
        let fields = self.meta.fields;
        for (i, field) in fields.iter().enumerate() {
            let Some(length) = field.column.length().map(|l| l as usize) else {
                continue;
            };
            if length <= 5 {
                continue;
            }
            let value = field.get(&self.entity);
            let Some(text) = value.as_str() else {
                continue;
            };
            if text.chars().count() > length {
                let kept: String = text.chars().take(length - 4).collect();
                self.set_index(i, Value::Text(format!("{} ...", kept)))?;
            }
        }
        Ok(self)
    }

    /// Independent copy with the same values, flags and changes.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Empty model of the same table and database.
    pub fn shallow(&self) -> Self {
        Self {
            entity: E::default(),
            table: self.table.clone(),
            meta: Arc::clone(&self.meta),
            holder: ModelHolder::new(),
            db: self.db.clone(),
            tx: None,
        }
    }

    /// Non-null values keyed by field name, or by column name.
    pub fn to_map(&self, using_field_name: bool) -> DataMap {
        let mut map = DataMap::with_capacity(self.meta.fields.len());
        for field in self.meta.fields {
            let value = field.get(&self.entity);
            if !value.is_null() {
                let key = if using_field_name { field.name } else { field.column.name };
                map.insert(key, value);
            }
        }
        map
    }

    /// Set every field named in `map` (by field or column name).
    pub fn parse(&mut self, map: &DataMap) -> Result<&mut Self> {
        for (key, value) in map.iter() {
            if let Some(i) = self.meta.index_of(key) {
                self.set_index(i, value.clone())?;
            }
        }
        Ok(self)
    }

    /// Constraint violations of the current values.
    pub fn validate(&self) -> Vec<FieldValidationError> {
        let mut errors = ValidationError::new();
        for field in self.meta.fields {
            let column = &field.column;
            let value = field.get(&self.entity);
            if value.is_null() {
                if column.not_null && !column.auto && column.default.is_none() {
                    errors.add_required(field.name);
                }
                continue;
            }
            if let (Some(max), Some(text)) = (column.length(), value.as_str()) {
                let actual = text.chars().count();
                if actual > max as usize {
                    errors.add_max_length(field.name, max as usize, actual);
                }
            }
        }
        errors.errors
    }

    fn validate_if_enabled(&self, db: &DbConfig) -> Result<()> {
        let enabled = db
            .prop(DbProp::Validate, &self.table)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        if enabled {
            ValidationError {
                errors: self.validate(),
            }
            .into_result()?;
        }
        Ok(())
    }

    /// Reject every database mutation of this model.
    pub fn readonly(&mut self, readonly: bool) -> &mut Self {
        self.holder.readonly = readonly;
        self
    }

    /// Allow primary key columns in `SET` clauses.
    pub fn enable_update_key(&mut self, enable: bool) -> &mut Self {
        self.holder.update_key = enable;
        self
    }

    // ---- field filters ----

    fn indexes_of(&self, names: &[&str]) -> BTreeSet<usize> {
        names.iter().filter_map(|n| self.meta.index_of(n)).collect()
    }

    /// Select only `names`.
    pub fn include(&mut self, names: &[&str]) -> &mut Self {
        let set = self.indexes_of(names);
        self.holder.include(set);
        self
    }

    /// Select everything but `names`.
    pub fn exclude(&mut self, names: &[&str]) -> &mut Self {
        let set = self.indexes_of(names);
        self.holder.exclude(set);
        self
    }

    /// Skip large objects and character columns longer than `max_length`.
    pub fn exclude_blobs(&mut self, max_length: u32) -> &mut Self {
        let set = self
            .meta
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                f.column.sql_type.is_large_object()
                    || f.column.length().is_some_and(|l| l > max_length)
            })
            .map(|(i, _)| i)
            .collect();
        self.holder.exclude(set);
        self
    }

    pub fn include_all(&mut self) -> &mut Self {
        self.holder.clear_filter();
        self
    }

    /// Column list for `SELECT`: `*`, or the selected columns joined by `, `.
    pub fn filter_fields(&self) -> String {
        match self.db() {
            Some(db) => self.select_fields(db.dialect().as_ref()),
            None => self.selected_columns(|c| c.to_string()),
        }
    }

    fn select_fields(&self, dialect: &dyn Dialect) -> String {
        self.selected_columns(|c| dialect.quote(c))
    }

    fn selected_columns(&self, quote: impl Fn(&str) -> String) -> String {
        if *self.holder.filter() == crate::holder::FieldFilter::All {
            return "*".to_string();
        }
        self.meta
            .fields
            .iter()
            .enumerate()
            .filter(|(i, _)| self.holder.is_selected(*i))
            .map(|(_, f)| quote(f.column.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ---- table resolution ----

    /// Physical table of this value, creating a partition table on first use.
    pub(crate) fn resolve_table(&self) -> Result<String> {
        let Some(partition) = self.meta.partition.clone() else {
            return Ok(self.table.clone());
        };
        let name = partition.table_name(self)?;
        if name != partition.prefix() {
            self.ensure_partition(&partition, &name)?;
        }
        Ok(name)
    }

    fn ensure_partition(&self, partition: &MetaPartition<E>, name: &str) -> Result<()> {
        let db = self.require_db()?;
        let tx = self.tx.as_ref();
        let key = format!("{}:{}", db.key(), name);
        let created = db.registry().insert_if_absent(tx, &key, || {
            let dialect = db.dialect();
            let template = dialect.get_create_table(&db, tx, partition.prefix())?;
            dialect
                .create_table(&db, tx, &template.to_partition(name))
                .map_err(|e| {
                    Error::Schema(SchemaError {
                        kind: SchemaErrorKind::CreateFailed,
                        message: format!("Fail create table: {}", name),
                        source: Some(Box::new(e)),
                    })
                })
        })?;
        if created {
            tracing::debug!(db = db.key(), table = name, template = partition.prefix(), "Created partition table");
        }
        Ok(())
    }

    fn key_values(&self) -> Result<(Vec<&'static str>, Vec<Value>)> {
        if self.meta.keys.is_empty() {
            return Err(Error::config(format!("No primary key: {}", self.table)));
        }
        let mut columns = Vec::with_capacity(self.meta.keys.len());
        let mut values = Vec::with_capacity(self.meta.keys.len());
        for field in self.meta.key_fields() {
            let value = field.get(&self.entity);
            if value.is_null() {
                return Err(Error::config(format!(
                    "Primary key is null: {}.{}",
                    self.table, field.name
                )));
            }
            columns.push(field.column.name);
            values.push(value);
        }
        Ok((columns, values))
    }

    fn insert_values(&self) -> (Vec<&'static str>, Vec<Value>) {
        self.meta
            .fields
            .iter()
            .filter_map(|f| {
                let value = f.get(&self.entity);
                (!value.is_null()).then_some((f.column.name, value))
            })
            .unzip()
    }

    /// Fields written by an update: the changed ones, or all when nothing changed.
    fn update_indexes(&self) -> Vec<usize> {
        let fields = self.meta.fields;
        let writable = |i: &usize| {
            let column = &fields[*i].column;
            self.holder.update_key || !(column.key || column.auto)
        };
        let changed: Vec<usize> = self.holder.changes().filter(writable).collect();
        if changed.is_empty() {
            (0..fields.len()).filter(writable).collect()
        } else {
            changed
        }
    }

    // ---- lifecycle ----

    fn before(&mut self, event: ModelEvent) -> Result<()> {
        if event == ModelEvent::Load {
            self.holder.entity = false;
        } else if let Some(db) = self.db() {
            let user = self.tx.as_ref().and_then(Tx::user);
            if matches!(event, ModelEvent::Insert | ModelEvent::Replace) {
                self.fill_audit(&db, DbProp::AutoCreateTime, Some(Value::now()), false)?;
                self.fill_audit(&db, DbProp::AutoCreateBy, user.clone(), false)?;
            }
            if matches!(event, ModelEvent::Update | ModelEvent::Replace) {
                self.fill_audit(&db, DbProp::AutoUpdateTime, Some(Value::now()), true)?;
                self.fill_audit(&db, DbProp::AutoUpdateBy, user, true)?;
            }
        }
        if let Some(listener) = self.meta.listener.clone() {
            listener.before(event, self)?;
        }
        Ok(())
    }

    /// Set the audit field named by `prop` when it is null, or with `refresh`
    /// when the caller has not changed it since the last load or write.
    fn fill_audit(&mut self, db: &DbConfig, prop: DbProp, value: Option<Value>, refresh: bool) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let Some(i) = db.prop(prop, &self.table).and_then(|n| self.meta.index_of(&n)) else {
            return Ok(());
        };
        let current = self.meta.fields[i].get(&self.entity);
        if current.is_null() || (refresh && !self.holder.is_modified(i, &current)) {
            self.set_index(i, value)?;
        }
        Ok(())
    }

    fn after(&mut self, event: ModelEvent, result: i64) -> Result<()> {
        if result >= 0 {
            self.holder.dirty = false;
            self.holder.entity = event != ModelEvent::Delete;
            if event == ModelEvent::Load && self.meta.clear_changes_after_load {
                self.holder.clear_changes();
            }
            if result > 0 && event != ModelEvent::Delete {
                let values = self.meta.fields.iter().map(|f| f.get(&self.entity)).collect();
                self.holder.sync(values);
            }
        }
        if let Some(listener) = self.meta.listener.clone() {
            listener.after(event, self, result)?;
        }
        Ok(())
    }

    /// Run `op`, together with the history row when the table keeps history.
    fn mutate<T>(&mut self, event: ModelEvent, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.holder.readonly {
            return Err(Error::config(format!("Model is readonly: {}", self.table)));
        }
        if !self.history()? {
            return op(self);
        }
        let outer = self.tx.clone();
        Tx::execute(outer.as_ref(), |tx| {
            let previous = self.tx.replace(tx.clone());
            let result = op(self).and_then(|r| self.save_history(event, tx).map(|()| r));
            self.tx = previous;
            result
        })
    }

    /// Insert this value. An auto-increment field that is null receives the
    /// generated key.
    pub fn save(&mut self) -> Result<u64> {
        self.mutate(ModelEvent::Insert, Self::do_save)
    }

    fn do_save(&mut self) -> Result<u64> {
        let db = self.require_db()?;
        self.before(ModelEvent::Insert)?;
        self.validate_if_enabled(&db)?;
        let table = self.resolve_table()?;
        let (columns, values) = self.insert_values();
        if columns.is_empty() {
            return Err(Error::config(format!("No field to insert: {}", table)));
        }
        let dialect = db.dialect();
        let key = self
            .query(&db)
            .add(statement::insert_sql(dialect.as_ref(), &table, &columns), values)
            .insert()?;
        if let Some(auto) = self.meta.auto_field() {
            if key > 0 && auto.get(&self.entity).is_null() {
                auto.set(&mut self.entity, Value::BigInt(key))?;
            }
        }
        self.after(ModelEvent::Insert, 1)?;
        Ok(1)
    }

    /// Insert, or update the row with the same primary key.
    pub fn save_or_update(&mut self) -> Result<u64> {
        self.mutate(ModelEvent::Replace, Self::do_replace)
    }

    fn do_replace(&mut self) -> Result<u64> {
        let db = self.require_db()?;
        self.before(ModelEvent::Replace)?;
        self.validate_if_enabled(&db)?;
        let table = self.resolve_table()?;
        let (columns, values) = self.insert_values();
        if columns.is_empty() {
            return Err(Error::config(format!("No field to insert: {}", table)));
        }
        let keys: Vec<&str> = self.meta.key_fields().map(|f| f.column.name).collect();
        let sql = db.dialect().replace_sql(&table, &columns, &keys);
        let r = self.query(&db).add(sql, values).execute()?;
        self.after(ModelEvent::Replace, r as i64)?;
        Ok(r)
    }

    /// Update the row with this value's primary key.
    pub fn update(&mut self) -> Result<u64> {
        self.mutate(ModelEvent::Update, |m| m.do_update(None))
    }

    /// Update the rows matching `condition` instead of the primary key.
    pub fn update_by(&mut self, condition: &str, args: impl Params) -> Result<u64> {
        let custom = (condition.to_string(), args.into_values());
        self.mutate(ModelEvent::Update, move |m| m.do_update(Some(custom)))
    }

    fn do_update(&mut self, custom: Option<(String, Vec<Value>)>) -> Result<u64> {
        let db = self.require_db()?;
        self.before(ModelEvent::Update)?;
        self.validate_if_enabled(&db)?;
        let table = self.resolve_table()?;
        let dialect = db.dialect();
        let (condition, condition_values) = match custom {
            Some(custom) => custom,
            None => {
                let (keys, values) = self.key_values()?;
                (statement::key_condition(dialect.as_ref(), &keys), values)
            }
        };

        let fields = self.meta.fields;
        let indexes = self.update_indexes();
        if indexes.is_empty() {
            return Err(Error::config(format!("No field to update: {}", table)));
        }
        let columns: Vec<&str> = indexes.iter().map(|&i| fields[i].column.name).collect();
        let mut values: Vec<Value> = indexes.iter().map(|&i| fields[i].get(&self.entity)).collect();
        values.extend(condition_values);

        let sql = statement::update_sql(dialect.as_ref(), &table, &columns, &[], &condition);
        let r = self.query(&db).add(sql, values).execute()?;
        self.after(ModelEvent::Update, r as i64)?;
        Ok(r)
    }

    /// Optimistic update guarded by the version column.
    ///
    /// Increments the version in the row and, on success, in memory. Returns 0
    /// when the row's version no longer matches; the model is then left as it
    /// was.
    pub fn update_by_version(&mut self) -> Result<u64> {
        self.mutate(ModelEvent::Update, Self::do_update_by_version)
    }

    fn do_update_by_version(&mut self) -> Result<u64> {
        let db = self.require_db()?;
        let version_name = db
            .prop(DbProp::VersionName, &self.table)
            .unwrap_or_else(|| "version".to_string());
        let vi = self.meta.index_of(&version_name).ok_or_else(|| {
            Error::config(format!("Version field not found: {}.{}", self.table, version_name))
        })?;

        self.before(ModelEvent::Update)?;
        self.validate_if_enabled(&db)?;
        let fields = self.meta.fields;
        let version_field = &fields[vi];
        let version = version_field.get(&self.entity);
        let current = version.as_i64().ok_or_else(|| {
            Error::config(format!(
                "Version field must hold an integer: {}.{}",
                self.table, version_field.name
            ))
        })?;

        let table = self.resolve_table()?;
        let dialect = db.dialect();
        let (keys, key_values) = self.key_values()?;
        let indexes: Vec<usize> = self.update_indexes().into_iter().filter(|&i| i != vi).collect();
        let columns: Vec<&str> = indexes.iter().map(|&i| fields[i].column.name).collect();
        let mut values: Vec<Value> = indexes.iter().map(|&i| fields[i].get(&self.entity)).collect();
        values.extend(key_values);
        values.push(version.clone());

        let condition = format!(
            "{} AND {} = ?",
            statement::key_condition(dialect.as_ref(), &keys),
            dialect.quote(version_field.column.name)
        );
        let increment = statement::increment(dialect.as_ref(), version_field.column.name);
        let sql = statement::update_sql(dialect.as_ref(), &table, &columns, &[increment], &condition);

        let dirty = self.holder.dirty;
        let r = self.query(&db).add(sql, values).execute()?;
        if r > 0 {
            let next = match version {
                Value::Int(v) => Value::Int(v + 1),
                _ => Value::BigInt(current + 1),
            };
            version_field.set(&mut self.entity, next)?;
        } else {
            tracing::debug!(table = %table, version = current, "Version conflict");
        }
        self.after(ModelEvent::Update, r as i64)?;
        if r == 0 {
            self.holder.dirty = dirty;
        }
        Ok(r)
    }

    /// Delete the row with this value's primary key.
    pub fn delete(&mut self) -> Result<u64> {
        self.mutate(ModelEvent::Delete, Self::do_delete)
    }

    fn do_delete(&mut self) -> Result<u64> {
        let db = self.require_db()?;
        self.before(ModelEvent::Delete)?;
        let table = self.resolve_table()?;
        let dialect = db.dialect();
        let (keys, values) = self.key_values()?;
        let sql = statement::delete_sql(dialect.as_ref(), &table, &statement::key_condition(dialect.as_ref(), &keys));
        let r = self.query(&db).add(sql, values).execute()?;
        self.after(ModelEvent::Delete, r as i64)?;
        Ok(r)
    }

    /// Load the row with this value's primary key. Returns whether it exists.
    pub fn load(&mut self) -> Result<bool> {
        let db = self.require_db()?;
        self.before(ModelEvent::Load)?;
        let table = self.resolve_table()?;
        let dialect = db.dialect();
        let (keys, values) = self.key_values()?;
        let sql = statement::select_sql(
            dialect.as_ref(),
            &table,
            &self.select_fields(dialect.as_ref()),
            Some(&statement::key_condition(dialect.as_ref(), &keys)),
        );
        let query = self.query(&db).add(sql, values);
        let found = query.load_into(self)?;
        self.after(ModelEvent::Load, if found { 1 } else { -1 })?;
        Ok(found)
    }
}

/// Loading marks every column present in the row as changed.
impl<E: Entity> LoadTarget for Model<E> {
    fn load_from(&mut self, row: &DataMap) -> Result<()> {
        let fields = self.meta.fields;
        for (i, field) in fields.iter().enumerate() {
            if let Some(value) = row.get(field.column.name) {
                self.set_index(i, value.clone())?;
            }
        }
        Ok(())
    }
}

impl<E: Entity> Default for Model<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Deref for Model<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E: Entity> From<E> for Model<E> {
    fn from(entity: E) -> Self {
        Self::from_entity(entity)
    }
}

impl<E: Entity + fmt::Debug> fmt::Debug for Model<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.table)
            .field("entity", &self.entity)
            .field("holder", &self.holder)
            .field("db", &self.db.as_ref().map(DbConfig::key))
            .field("tx", &self.tx.as_ref().map(Tx::id))
            .finish()
    }
}

/// Typed value of a DDL default expression; `None` for `NULL`.
fn default_value(sql_type: &SqlType, literal: &str) -> Option<Value> {
    let literal = literal.trim();
    if literal.eq_ignore_ascii_case("null") {
        return None;
    }
    let quoted = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"));
    let text = match quoted {
        Some(text) => text,
        None if literal.eq_ignore_ascii_case("current_timestamp") || literal.eq_ignore_ascii_case("now()") => {
            return Some(Value::now());
        }
        None => literal.to_string(),
    };
    let typed = match sql_type {
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer => text.parse().ok().map(Value::Int),
        SqlType::BigInt => text.parse().ok().map(Value::BigInt),
        SqlType::Real | SqlType::Double => text.parse().ok().map(Value::Double),
        SqlType::Decimal { .. } => Some(Value::Decimal(text.clone())),
        SqlType::Boolean => Some(Value::Bool(text == "1" || text.eq_ignore_ascii_case("true"))),
        _ => None,
    };
    Some(typed.unwrap_or(Value::Text(text)))
}

/// Zero value of a column type.
fn zero_value(sql_type: &SqlType) -> Value {
    match sql_type {
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer => Value::Int(0),
        SqlType::BigInt => Value::BigInt(0),
        SqlType::Real | SqlType::Double => Value::Double(0.0),
        SqlType::Decimal { .. } => Value::Decimal("0".to_string()),
        SqlType::Boolean => Value::Bool(false),
        SqlType::Date => Value::Date(chrono::Local::now().date_naive()),
        SqlType::Time | SqlType::DateTime | SqlType::Timestamp => Value::now(),
        SqlType::Blob => Value::Bytes(Vec::new()),
        SqlType::Json => Value::Text("{}".to_string()),
        SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text | SqlType::Custom(_) => {
            Value::Text(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::Note;
    use recordkit_core::ValidationErrorKind;

    #[test]
    fn test_set_marks_changed() {
        let mut m = Model::<Note>::new();
        m.set("title", "hi").unwrap().set("STARS", 5).unwrap();
        assert_eq!(m.title.as_deref(), Some("hi"));
        assert_eq!(m.stars, Some(5));
        assert!(m.is_dirty());
        assert_eq!(m.changed_fields(), vec!["title", "stars"]);
    }

    #[test]
    fn test_unknown_field_without_db() {
        let mut m = Model::<Note>::new();
        assert!(m.set("nope", 1).is_ok());
        assert!(m.set_checked("nope", 1, true).is_err());
        assert!(!m.is_dirty());
    }

    #[test]
    fn test_edit_marks_only_changed() {
        let mut m = Model::from_entity(Note {
            title: Some("a".into()),
            ..Note::default()
        });
        m.clear_changes();
        m.edit(|n| {
            n.body = Some("text".into());
            n.title = Some("a".into());
        });
        assert_eq!(m.changed_fields(), vec!["body"]);
    }

    #[test]
    fn test_get_or() {
        let mut m = Model::<Note>::new();
        assert_eq!(m.get_or("stars", 9), Value::Int(9));
        assert_eq!(m.get_or("missing", "x"), Value::Text("x".into()));
        m.set("stars", 2).unwrap();
        assert_eq!(m.get_or("stars", 9), Value::Int(2));
        assert_eq!(m.get("nope"), None);
    }

    #[test]
    fn test_to_map_and_parse_round_trip() {
        let mut m = Model::<Note>::new();
        m.set("id", 3_i64).unwrap().set("title", "t").unwrap();
        let by_field = m.to_map(true);
        assert_eq!(by_field.len(), 2);
        assert!(by_field.contains_key("title"));
        let by_column = m.to_map(false);
        assert!(by_column.contains_key("note_title"));

        let mut other = Model::<Note>::new();
        other.parse(&by_field).unwrap();
        assert_eq!(other.entity(), m.entity());
        let mut third = Model::<Note>::new();
        third.parse(&by_column).unwrap();
        assert_eq!(third.entity(), m.entity());
    }

    #[test]
    fn test_clear() {
        let mut m = Model::<Note>::new();
        m.set("title", "t").unwrap();
        m.clear();
        assert_eq!(m.entity(), &Note::default());
        assert!(m.changed_fields().is_empty());
        assert!(!m.is_entity());
    }

    #[test]
    fn test_clear_changes_null() {
        let mut m = Model::<Note>::new();
        m.set("title", "t").unwrap().set("body", Value::Null).unwrap();
        m.clear_changes_null();
        assert_eq!(m.changed_fields(), vec!["title"]);
    }

    #[test]
    fn test_defaults() {
        let mut m = Model::<Note>::new();
        m.defaults().unwrap();
        assert_eq!(m.id, None);
        assert_eq!(m.stars, Some(3));
        assert_eq!(m.title.as_deref(), Some(""));
        assert_eq!(m.body, None);
    }

    #[test]
    fn test_default_literals() {
        assert_eq!(default_value(&SqlType::Integer, "NULL"), None);
        assert_eq!(
            default_value(&SqlType::VarChar(8), "'it''s'"),
            Some(Value::Text("it's".into()))
        );
        assert_eq!(default_value(&SqlType::BigInt, "42"), Some(Value::BigInt(42)));
        assert_eq!(default_value(&SqlType::Boolean, "1"), Some(Value::Bool(true)));
        assert!(matches!(
            default_value(&SqlType::DateTime, "CURRENT_TIMESTAMP"),
            Some(Value::Timestamp(_))
        ));
    }

    #[test]
    fn test_cut() {
        let mut m = Model::<Note>::new();
        m.set("title", "abcdefghij").unwrap();
        m.cut().unwrap();
        assert_eq!(m.title.as_deref(), Some("abcd ..."));

        m.set("title", "short").unwrap();
        m.cut().unwrap();
        assert_eq!(m.title.as_deref(), Some("short"));
    }

    #[test]
    fn test_validate() {
        let mut m = Model::<Note>::new();
        let errors = m.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "title");
        assert_eq!(errors[0].kind, ValidationErrorKind::Required);

        m.set("title", "much too long").unwrap();
        let errors = m.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::MaxLength);
    }

    #[test]
    fn test_filters() {
        let mut m = Model::<Note>::new();
        assert_eq!(m.filter_fields(), "*");
        m.include(&["id", "title"]);
        assert_eq!(m.filter_fields(), "id, note_title");
        m.exclude(&["body"]);
        assert_eq!(m.filter_fields(), "id, note_title, stars");
        m.exclude_blobs(4);
        assert_eq!(m.filter_fields(), "id, stars");
        m.include_all();
        assert_eq!(m.filter_fields(), "*");
    }

    #[test]
    fn test_indexes() {
        let m = Model::<Note>::new();
        assert_eq!(m.indexes().len(), 2);
        let unique = m.unique_indexes();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].name, "notes_title");
        assert_eq!(m.auto_field().map(|f| f.name), Some("id"));
    }

    #[test]
    fn test_readonly_rejects_mutations() {
        let mut m = Model::<Note>::new();
        m.readonly(true);
        let err = m.save().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(m.delete().is_err());
    }

    #[test]
    fn test_missing_db_is_config_error() {
        let mut m = Model::<Note>::new();
        assert!(matches!(m.load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_copy_and_shallow() {
        let mut m = Model::<Note>::new();
        m.set("id", 1_i64).unwrap();
        let copy = m.copy();
        assert_eq!(copy.id, Some(1));
        assert_eq!(copy.changed_fields(), vec!["id"]);
        let shallow = m.shallow();
        assert_eq!(shallow.id, None);
        assert_eq!(shallow.table(), "notes");
        assert!(!shallow.is_dirty());
    }
}
