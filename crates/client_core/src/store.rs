//! Client-side entity caches.
//!
//! A screen renders a [`CachedList`]. In [`CacheMode::PerScreen`] the list owns
//! its copy of every entity, so a change made on one screen stays invisible to
//! other screens until they reload. In [`CacheMode::Shared`] the list keeps only
//! its ordering and reads entities from an [`EntityStore`] shared by every
//! screen, which notifies subscribers on each change.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    marker::PhantomData,
    str::FromStr,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::Deserialize;
use shared::{
    domain::{PantryItemId, RecipeId},
    protocol::{PantryItem, Recipe},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::optimistic::FieldCell;

pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn id(&self) -> &Self::Id;
}

impl Entity for Recipe {
    type Id = RecipeId;

    fn id(&self) -> &RecipeId {
        &self.id
    }
}

impl Entity for PantryItem {
    type Id = PantryItemId;

    fn id(&self) -> &PantryItemId {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    PerScreen,
    #[default]
    Shared,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shared" => Ok(CacheMode::Shared),
            "per_screen" => Ok(CacheMode::PerScreen),
            other => Err(format!("unknown cache mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StoreEvent<T: Entity> {
    Upserted(T),
    Removed(T::Id),
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keyed cache shared by every screen bound to it.
pub struct EntityStore<T: Entity> {
    entries: RwLock<HashMap<T::Id, T>>,
    events: broadcast::Sender<StoreEvent<T>>,
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &T::Id) -> Option<T> {
        read(&self.entries).get(id).cloned()
    }

    pub fn upsert(&self, entity: T) {
        write(&self.entries).insert(entity.id().clone(), entity.clone());
        let _ = self.events.send(StoreEvent::Upserted(entity));
    }

    pub fn upsert_many(&self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.upsert(entity);
        }
    }

    /// Applies `f` to the cached entity and notifies subscribers.
    pub fn update<R>(&self, id: &T::Id, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let (result, updated) = {
            let mut entries = write(&self.entries);
            let entity = entries.get_mut(id)?;
            let result = f(entity);
            (result, entity.clone())
        };
        let _ = self.events.send(StoreEvent::Upserted(updated));
        Some(result)
    }

    pub fn remove(&self, id: &T::Id) -> Option<T> {
        let removed = write(&self.entries).remove(id)?;
        let _ = self.events.send(StoreEvent::Removed(id.clone()));
        Some(removed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent<T>> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> BroadcastStream<StoreEvent<T>> {
        BroadcastStream::new(self.subscribe())
    }
}

enum Backing<T: Entity> {
    Owned(RwLock<Vec<T>>),
    Shared {
        store: Arc<EntityStore<T>>,
        order: RwLock<Vec<T::Id>>,
    },
}

/// The ordered entities one screen renders.
pub struct CachedList<T: Entity> {
    backing: Backing<T>,
}

impl<T: Entity> CachedList<T> {
    pub fn per_screen() -> Self {
        Self {
            backing: Backing::Owned(RwLock::new(Vec::new())),
        }
    }

    pub fn shared(store: Arc<EntityStore<T>>) -> Self {
        Self {
            backing: Backing::Shared {
                store,
                order: RwLock::new(Vec::new()),
            },
        }
    }

    pub fn mode(&self) -> CacheMode {
        match self.backing {
            Backing::Owned(_) => CacheMode::PerScreen,
            Backing::Shared { .. } => CacheMode::Shared,
        }
    }

    pub fn replace(&self, items: Vec<T>) {
        match &self.backing {
            Backing::Owned(items_lock) => *write(items_lock) = items,
            Backing::Shared { store, order } => {
                let ids = items.iter().map(|item| item.id().clone()).collect();
                store.upsert_many(items);
                *write(order) = ids;
            }
        }
    }

    pub fn snapshot(&self) -> Vec<T> {
        match &self.backing {
            Backing::Owned(items) => read(items).clone(),
            Backing::Shared { store, order } => read(order)
                .iter()
                .filter_map(|id| store.get(id))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &T::Id) -> Option<usize> {
        match &self.backing {
            Backing::Owned(items) => read(items).iter().position(|item| item.id() == id),
            Backing::Shared { store, order } => {
                let index = read(order).iter().position(|entry| entry == id)?;
                store.get(id).map(|_| index)
            }
        }
    }

    pub fn get(&self, id: &T::Id) -> Option<T> {
        match &self.backing {
            Backing::Owned(items) => read(items).iter().find(|item| item.id() == id).cloned(),
            Backing::Shared { store, order } => {
                if read(order).contains(id) {
                    store.get(id)
                } else {
                    None
                }
            }
        }
    }

    pub fn update<R>(&self, id: &T::Id, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match &self.backing {
            Backing::Owned(items) => write(items)
                .iter_mut()
                .find(|item| item.id() == id)
                .map(f),
            Backing::Shared { store, order } => {
                if !read(order).contains(id) {
                    return None;
                }
                store.update(id, f)
            }
        }
    }

    /// Replaces the cached copy with a fresher one, keeping its position.
    pub fn upsert(&self, entity: T) {
        if self.update(entity.id(), |cached| *cached = entity.clone()).is_none() {
            self.insert(0, entity);
        }
    }

    pub fn insert(&self, index: usize, entity: T) {
        match &self.backing {
            Backing::Owned(items) => {
                let mut items = write(items);
                let index = index.min(items.len());
                items.insert(index, entity);
            }
            Backing::Shared { store, order } => {
                {
                    let mut order = write(order);
                    if !order.contains(entity.id()) {
                        let index = index.min(order.len());
                        order.insert(index, entity.id().clone());
                    }
                }
                store.upsert(entity);
            }
        }
    }

    /// Removes the entity and reports where it was. Shared lists evict it
    /// from the store, so other screens drop it too, but keep its slot in
    /// every ordering so a reinsert shows up in place on all of them.
    pub fn remove(&self, id: &T::Id) -> Option<(usize, T)> {
        match &self.backing {
            Backing::Owned(items) => {
                let mut items = write(items);
                let index = items.iter().position(|item| item.id() == id)?;
                Some((index, items.remove(index)))
            }
            Backing::Shared { store, order } => {
                let index = read(order).iter().position(|entry| entry == id)?;
                store.remove(id).map(|entity| (index, entity))
            }
        }
    }
}

/// A [`FieldCell`] over one field of one entity in a [`CachedList`].
pub struct EntityField<T: Entity, V> {
    list: Arc<CachedList<T>>,
    id: T::Id,
    get: fn(&T) -> V,
    set: fn(&mut T, V),
    _value: PhantomData<fn() -> V>,
}

impl<T: Entity, V> EntityField<T, V> {
    pub fn new(list: Arc<CachedList<T>>, id: T::Id, get: fn(&T) -> V, set: fn(&mut T, V)) -> Self {
        Self {
            list,
            id,
            get,
            set,
            _value: PhantomData,
        }
    }
}

impl<T: Entity, V: Send + 'static> FieldCell<V> for EntityField<T, V> {
    fn read(&self) -> Option<V> {
        self.list.get(&self.id).map(|entity| (self.get)(&entity))
    }

    fn write(&self, value: V) {
        let set = self.set;
        self.list.update(&self.id, move |entity| set(entity, value));
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
