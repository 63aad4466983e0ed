//! Shared per-type model metadata.
//!
//! Metadata is derived once per entity type from its [`Entity`] description
//! and cached process-wide under the type's `TypeId`. Runtime registrations
//! ([`ModelMeta::register_listener`], [`ModelMeta::bind_db`]) invalidate the
//! cached entry so the next model built for that type sees them. Metadata
//! built while a registration lands is handed out but not cached.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use recordkit_query::{DbConfig, IndexDef};

use crate::entity::{Entity, Field};
use crate::listener::ModelListener;
use crate::partition::MetaPartition;

type AnyArc = Arc<dyn Any + Send + Sync>;

fn metas() -> &'static RwLock<HashMap<TypeId, AnyArc>> {
    static METAS: OnceLock<RwLock<HashMap<TypeId, AnyArc>>> = OnceLock::new();
    METAS.get_or_init(|| RwLock::new(HashMap::new()))
}

#[derive(Default, Clone)]
struct Overrides {
    /// Holds an `Arc<dyn ModelListener<E>>` for the keyed type.
    listener: Option<AnyArc>,
    db: Option<DbConfig>,
    /// Bumped on every change, so a build can tell it raced one.
    generation: u64,
}

fn generation_of(type_id: TypeId) -> u64 {
    overrides()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
        .map_or(0, |o| o.generation)
}

fn overrides() -> &'static RwLock<HashMap<TypeId, Overrides>> {
    static OVERRIDES: OnceLock<RwLock<HashMap<TypeId, Overrides>>> = OnceLock::new();
    OVERRIDES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Everything the model layer needs to know about `E`.
pub struct ModelMeta<E: Entity> {
    pub(crate) table: String,
    pub(crate) fields: &'static [Field<E>],
    pub(crate) keys: Vec<usize>,
    pub(crate) auto: Option<usize>,
    pub(crate) indexes: Vec<IndexDef>,
    pub(crate) listener: Option<Arc<dyn ModelListener<E>>>,
    pub(crate) partition: Option<Arc<MetaPartition<E>>>,
    pub(crate) db: Option<DbConfig>,
    pub(crate) clear_changes_after_load: bool,
    /// Lower-cased field and column names to field index.
    names: HashMap<String, usize>,
}

impl<E: Entity> ModelMeta<E> {
    /// The cached metadata of `E`, building it on first use.
    pub fn get() -> Arc<ModelMeta<E>> {
        let type_id = TypeId::of::<E>();
        let cached = metas()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
            .and_then(|any| any.downcast::<ModelMeta<E>>().ok());
        if let Some(meta) = cached {
            return meta;
        }

        let (meta, generation) = Self::build();
        let meta = Arc::new(meta);
        tracing::debug!(
            entity = std::any::type_name::<E>(),
            table = %meta.table,
            fields = meta.fields.len(),
            "Built model metadata"
        );
        Self::store(&meta, generation);
        meta
    }

    /// Cache `meta` unless the overrides changed since it was built.
    fn store(meta: &Arc<Self>, generation: u64) -> bool {
        let type_id = TypeId::of::<E>();
        let mut map = metas().write().unwrap_or_else(PoisonError::into_inner);
        if generation_of(type_id) != generation {
            return false;
        }
        map.insert(type_id, Arc::clone(meta) as AnyArc);
        true
    }

    /// Drop the cached metadata of `E`; the next [`ModelMeta::get`] rebuilds it.
    pub fn invalidate() {
        metas()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TypeId::of::<E>());
    }

    /// Replace the listener declared by `E::listener()`.
    pub fn register_listener(listener: Arc<dyn ModelListener<E>>) {
        Self::update_overrides(|o| o.listener = Some(Arc::new(listener) as AnyArc));
    }

    /// Bind `E` to `db` for models not given a database explicitly.
    pub fn bind_db(db: &DbConfig) {
        let db = db.clone();
        Self::update_overrides(|o| o.db = Some(db));
    }

    /// Forget runtime registrations for `E`.
    pub fn reset() {
        {
            let mut map = overrides().write().unwrap_or_else(PoisonError::into_inner);
            let entry = map.entry(TypeId::of::<E>()).or_default();
            *entry = Overrides {
                generation: entry.generation + 1,
                ..Overrides::default()
            };
        }
        Self::invalidate();
    }

    fn update_overrides(f: impl FnOnce(&mut Overrides)) {
        {
            let mut map = overrides().write().unwrap_or_else(PoisonError::into_inner);
            let entry = map.entry(TypeId::of::<E>()).or_default();
            f(entry);
            entry.generation += 1;
        }
        Self::invalidate();
    }

    /// Metadata of `E` and the override generation it was built from.
    fn build() -> (Self, u64) {
        let fields = E::fields();
        let mut names = HashMap::with_capacity(fields.len() * 2);
        for (i, field) in fields.iter().enumerate() {
            names.entry(field.column.name.to_ascii_lowercase()).or_insert(i);
            names.insert(field.name.to_ascii_lowercase(), i);
        }

        let registered = overrides()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        let generation = registered.generation;
        let listener = registered
            .listener
            .and_then(|any| any.downcast::<Arc<dyn ModelListener<E>>>().ok())
            .map(|l| Arc::clone(&*l))
            .or_else(E::listener);

        let meta = ModelMeta {
            table: E::TABLE.to_string(),
            fields,
            keys: (0..fields.len()).filter(|&i| fields[i].column.key).collect(),
            auto: fields.iter().position(|f| f.column.auto),
            indexes: E::indexes(),
            listener,
            partition: E::partition().map(Arc::new),
            db: registered.db.or_else(E::db),
            clear_changes_after_load: E::clear_changes_after_load(),
            names,
        };
        (meta, generation)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &'static [Field<E>] {
        self.fields
    }

    /// Index of the field called `name`, matching field or column names
    /// case-insensitively.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn field(&self, name: &str) -> Option<&'static Field<E>> {
        let fields = self.fields;
        self.index_of(name).map(|i| &fields[i])
    }

    pub fn key_fields(&self) -> impl Iterator<Item = &'static Field<E>> + '_ {
        let fields = self.fields;
        self.keys.iter().map(move |&i| &fields[i])
    }

    pub fn auto_field(&self) -> Option<&'static Field<E>> {
        let fields = self.fields;
        self.auto.map(|i| &fields[i])
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    pub fn db(&self) -> Option<&DbConfig> {
        self.db.as_ref()
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition.is_some()
    }
}

impl<E: Entity> fmt::Debug for ModelMeta<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelMeta")
            .field("table", &self.table)
            .field("fields", &self.fields.len())
            .field("keys", &self.keys)
            .field("auto", &self.auto)
            .field("listener", &self.listener.is_some())
            .field("partition", &self.partition.is_some())
            .finish_non_exhaustive()
    }
}
