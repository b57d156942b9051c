//! Pantry screen: inventory list with optimistic quantity steppers.
//!
//! A quantity of zero means the item is gone: the row disappears as soon as
//! the step is applied and the server is asked to delete it. A rejected
//! delete puts the row back where it was.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use chrono::NaiveDate;
use shared::{
    domain::{PantryItemId, Quantity},
    protocol::{NewPantryItem, PantryItem, PantryItemPatch, PantryQuery},
};
use tracing::{debug, info};

use crate::{
    config::ScreenOptions,
    error::ClientError,
    events::{report_failure, ClientEvent, EventSender},
    filter::{PantryFilter, PantrySort},
    optimistic::{
        mutation_op, FieldCell, MutationKey, MutationOp, MutationOutcome, OptimisticCoordinator,
        PendingMutation, Transition,
    },
    service::PantryService,
    store::CachedList,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct Removed {
    /// Rows hidden at zero while their delete is pending, with their index.
    tombstones: HashMap<PantryItemId, (usize, PantryItem)>,
    /// Items the server has confirmed as deleted since the last load.
    deleted: HashSet<PantryItemId>,
}

/// Rows taken out of a pantry list by quantity steps. Screens over one
/// shared store must share one of these.
#[derive(Clone, Default)]
pub struct RemovedRows(Arc<Mutex<Removed>>);

impl RemovedRows {
    fn lock(&self) -> MutexGuard<'_, Removed> {
        lock(&self.0)
    }

    fn confirm_deleted(&self, id: &PantryItemId) {
        let mut removed = self.lock();
        removed.tombstones.remove(id);
        removed.deleted.insert(id.clone());
    }

    fn clear(&self) {
        let mut removed = self.lock();
        removed.tombstones.clear();
        removed.deleted.clear();
    }
}

/// Quantity of one pantry row. Writing zero removes the row and remembers
/// its position; writing a positive value brings it back there. Once the
/// delete is confirmed the row is gone for good and reads as `None`.
struct QuantityCell {
    list: Arc<CachedList<PantryItem>>,
    id: PantryItemId,
    removed: RemovedRows,
}

impl FieldCell<Quantity> for QuantityCell {
    fn read(&self) -> Option<Quantity> {
        match self.list.get(&self.id) {
            Some(item) => Some(item.quantity),
            None => self
                .removed
                .lock()
                .tombstones
                .contains_key(&self.id)
                .then_some(Quantity::ZERO),
        }
    }

    fn write(&self, value: Quantity) {
        if value.is_zero() {
            if let Some(row) = self.list.remove(&self.id) {
                let mut removed = self.removed.lock();
                if !removed.deleted.contains(&self.id) {
                    removed.tombstones.insert(self.id.clone(), row);
                }
            }
            return;
        }

        if self
            .list
            .update(&self.id, |item| item.quantity = value)
            .is_some()
        {
            return;
        }
        let restored = self.removed.lock().tombstones.remove(&self.id);
        if let Some((index, mut item)) = restored {
            item.quantity = value;
            self.list.insert(index, item);
        }
    }
}

pub struct PantryScreen {
    api: Arc<dyn PantryService>,
    list: Arc<CachedList<PantryItem>>,
    quantities: OptimisticCoordinator<Quantity>,
    removed: RemovedRows,
    query: Mutex<PantryQuery>,
    sort: Mutex<PantrySort>,
    loading: AtomicBool,
    events: EventSender,
}

impl PantryScreen {
    pub fn new(
        api: Arc<dyn PantryService>,
        list: Arc<CachedList<PantryItem>>,
        options: ScreenOptions,
        events: EventSender,
    ) -> Self {
        let quantities = quantity_coordinator(options, events.clone());
        Self::with_state(api, list, quantities, RemovedRows::default(), events)
    }

    /// Builds a screen that shares its in-flight quantity mutations and
    /// removed rows with every other screen built from the same state.
    pub fn with_state(
        api: Arc<dyn PantryService>,
        list: Arc<CachedList<PantryItem>>,
        quantities: OptimisticCoordinator<Quantity>,
        removed: RemovedRows,
        events: EventSender,
    ) -> Self {
        Self {
            api,
            list,
            quantities,
            removed,
            query: Mutex::new(PantryQuery::default()),
            sort: Mutex::new(PantrySort::default()),
            loading: AtomicBool::new(false),
            events,
        }
    }

    pub fn list(&self) -> &Arc<CachedList<PantryItem>> {
        &self.list
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn load(&self, query: PantryQuery) -> Result<usize, ClientError> {
        *lock(&self.query) = query.clone();
        self.fetch(&query).await
    }

    pub async fn refresh(&self) -> Result<usize, ClientError> {
        let query = lock(&self.query).clone();
        self.fetch(&query).await
    }

    async fn fetch(&self, query: &PantryQuery) -> Result<usize, ClientError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = self.api.list_items(query).await;
        self.loading.store(false, Ordering::SeqCst);

        let items = self.reported("load pantry", result)?;
        let count = items.len();
        self.list.replace(items);
        self.removed.clear();
        info!("pantry: loaded count={count}");
        let _ = self.events.send(ClientEvent::ListLoaded {
            screen: "pantry",
            count,
        });
        Ok(count)
    }

    pub fn items(&self) -> Vec<PantryItem> {
        self.list.snapshot()
    }

    /// Filtered from the full list, then ordered by the current sort.
    pub fn visible(&self, filter: &PantryFilter) -> Vec<PantryItem> {
        let mut items = filter.apply(&self.list.snapshot());
        self.sort().sort(&mut items);
        items
    }

    pub fn sort(&self) -> PantrySort {
        *lock(&self.sort)
    }

    pub fn cycle_sort(&self) -> PantrySort {
        let mut sort = lock(&self.sort);
        *sort = sort.next();
        debug!("pantry: sort={}", sort.label());
        *sort
    }

    /// Items expired or expiring within `days` of `today`, soonest first.
    pub fn expiring_soon(&self, today: NaiveDate, days: i64) -> Vec<PantryItem> {
        let filter = PantryFilter {
            expiring_within: Some((today, days)),
            ..PantryFilter::default()
        };
        let mut items = filter.apply(&self.list.snapshot());
        PantrySort::Expiration.sort(&mut items);
        items
    }

    /// Applies a quantity step immediately. `Ok(None)` means the step was
    /// rejected locally (no change, or the result would be negative) and
    /// nothing will be sent.
    pub fn adjust_quantity(
        &self,
        id: &PantryItemId,
        delta: i64,
    ) -> Result<Option<PendingMutation<Quantity>>, ClientError> {
        let cell = self.quantity_cell(id);
        let current = cell
            .read()
            .ok_or_else(|| ClientError::MissingEntity(id.to_string()))?;
        if delta == 0 {
            return Ok(None);
        }
        let Some(desired) = current.checked_add(delta) else {
            debug!("pantry: rejected step id={id} quantity={current} delta={delta}");
            return Ok(None);
        };

        self.quantities
            .begin(
                MutationKey::new(id, "quantity"),
                cell,
                desired,
                self.quantity_op(id),
            )
            .map(Some)
    }

    pub fn increment(
        &self,
        id: &PantryItemId,
    ) -> Result<Option<PendingMutation<Quantity>>, ClientError> {
        self.adjust_quantity(id, 1)
    }

    pub fn decrement(
        &self,
        id: &PantryItemId,
    ) -> Result<Option<PendingMutation<Quantity>>, ClientError> {
        self.adjust_quantity(id, -1)
    }

    pub async fn adjust_quantity_and_settle(
        &self,
        id: &PantryItemId,
        delta: i64,
    ) -> Result<Option<MutationOutcome<Quantity>>, ClientError> {
        let Some(pending) = self.adjust_quantity(id, delta)? else {
            return Ok(None);
        };
        let outcome = pending.settle().await;
        if outcome == MutationOutcome::Confirmed(Quantity::ZERO) {
            info!("pantry: deleted id={id}");
        }
        Ok(Some(outcome))
    }

    fn quantity_cell(&self, id: &PantryItemId) -> Arc<dyn FieldCell<Quantity>> {
        Arc::new(QuantityCell {
            list: Arc::clone(&self.list),
            id: id.clone(),
            removed: self.removed.clone(),
        })
    }

    fn quantity_op(&self, id: &PantryItemId) -> MutationOp<Quantity> {
        let api = Arc::clone(&self.api);
        let removed = self.removed.clone();
        let id = id.clone();
        mutation_op(move |transition: Transition<Quantity>| {
            let api = Arc::clone(&api);
            let removed = removed.clone();
            let id = id.clone();
            async move {
                if transition.to.is_zero() {
                    api.delete_item(&id)
                        .await
                        .map(|()| removed.confirm_deleted(&id))
                } else {
                    api.update_item(&id, &PantryItemPatch::quantity(transition.to))
                        .await
                        .map(|_| ())
                }
            }
        })
    }

    pub async fn create(&self, item: NewPantryItem) -> Result<PantryItem, ClientError> {
        let result = self.api.create_item(&item).await;
        let created = self.reported("add item", result)?;
        info!("pantry: created id={}", created.id);
        self.list.insert(self.list.len(), created.clone());
        Ok(created)
    }

    pub async fn update(
        &self,
        id: &PantryItemId,
        patch: PantryItemPatch,
    ) -> Result<PantryItem, ClientError> {
        let result = self.api.update_item(id, &patch).await;
        let updated = self.reported("update item", result)?;
        self.list.upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, id: &PantryItemId) -> Result<(), ClientError> {
        let result = self.api.delete_item(id).await;
        self.reported("delete item", result)?;
        self.list.remove(id);
        info!("pantry: deleted id={id}");
        Ok(())
    }

    fn reported<T>(
        &self,
        action: &str,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        result.map_err(|err| {
            report_failure(&self.events, action, &err);
            err
        })
    }
}

pub fn quantity_coordinator(
    options: ScreenOptions,
    events: EventSender,
) -> OptimisticCoordinator<Quantity> {
    OptimisticCoordinator::new(options.mutation_policy, "update quantity", events)
}

#[cfg(test)]
#[path = "tests/pantry_tests.rs"]
mod tests;
