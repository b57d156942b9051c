//! Optimistic field mutations.
//!
//! A mutation writes the desired value into displayed state before the
//! remote call is made, then reconciles once the call settles. Under
//! [`MutationPolicy::Serialized`] every (entity, field) key owns a single
//! in-flight slot and later requests are coalesced into it. Under
//! [`MutationPolicy::Unserialized`] every call races on its own and a failed
//! call restores whatever it saw before its own write.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
};

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    events::{report_failure, ClientEvent, EventSender, SettledAs},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub entity: String,
    pub field: &'static str,
}

impl MutationKey {
    pub fn new(entity: impl fmt::Display, field: &'static str) -> Self {
        Self {
            entity: entity.to_string(),
            field,
        }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    Unserialized,
    #[default]
    Serialized,
}

impl FromStr for MutationPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serialized" => Ok(MutationPolicy::Serialized),
            "unserialized" => Ok(MutationPolicy::Unserialized),
            other => Err(format!("unknown mutation policy '{other}'")),
        }
    }
}

/// One field of one displayed entity.
pub trait FieldCell<V>: Send + Sync {
    /// `None` once the entity is no longer displayed.
    fn read(&self) -> Option<V>;
    fn write(&self, value: V);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<V> {
    pub from: V,
    pub to: V,
}

pub type MutationOp<V> =
    Arc<dyn Fn(Transition<V>) -> BoxFuture<'static, Result<(), ClientError>> + Send + Sync>;

pub fn mutation_op<V, F, Fut>(op: F) -> MutationOp<V>
where
    F: Fn(Transition<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
{
    Arc::new(move |transition| Box::pin(op(transition)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<V> {
    /// The server confirmed this value.
    Confirmed(V),
    /// Folded into the mutation already in flight for the same key.
    Coalesced,
    /// The server rejected the change; the field now shows `value`.
    RolledBack { value: V, error: String },
}

impl<V> MutationOutcome<V> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed(_))
    }

    fn settled_as(&self) -> SettledAs {
        match self {
            MutationOutcome::Confirmed(_) => SettledAs::Confirmed,
            MutationOutcome::Coalesced => SettledAs::Coalesced,
            MutationOutcome::RolledBack { .. } => SettledAs::RolledBack,
        }
    }
}

struct Slot<V> {
    queued: Option<V>,
}

type SlotMap<V> = Mutex<HashMap<MutationKey, Slot<V>>>;

fn lock<V>(slots: &SlotMap<V>) -> MutexGuard<'_, HashMap<MutationKey, Slot<V>>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct OptimisticCoordinator<V> {
    policy: MutationPolicy,
    action: &'static str,
    slots: Arc<SlotMap<V>>,
    events: EventSender,
}

impl<V> Clone for OptimisticCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            action: self.action,
            slots: Arc::clone(&self.slots),
            events: self.events.clone(),
        }
    }
}

impl<V> OptimisticCoordinator<V>
where
    V: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    /// `action` names the operation in failure notices, e.g. "update favorite status".
    pub fn new(policy: MutationPolicy, action: &'static str, events: EventSender) -> Self {
        Self {
            policy,
            action,
            slots: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn policy(&self) -> MutationPolicy {
        self.policy
    }

    pub fn in_flight(&self, key: &MutationKey) -> bool {
        lock(&self.slots).contains_key(key)
    }

    /// Writes `desired` into `cell` before returning. Nothing is sent until
    /// the returned mutation is settled.
    pub fn begin(
        &self,
        key: MutationKey,
        cell: Arc<dyn FieldCell<V>>,
        desired: V,
        op: MutationOp<V>,
    ) -> Result<PendingMutation<V>, ClientError> {
        let previous = cell
            .read()
            .ok_or_else(|| ClientError::MissingEntity(key.entity.clone()))?;
        cell.write(desired.clone());
        debug!("optimistic: applied key={key} from={previous:?} to={desired:?}");

        let role = match self.policy {
            MutationPolicy::Unserialized => Role::Independent { previous },
            MutationPolicy::Serialized => {
                let mut slots = lock(&self.slots);
                match slots.get_mut(&key) {
                    Some(slot) => {
                        slot.queued = Some(desired.clone());
                        Role::Queued
                    }
                    None => {
                        slots.insert(key.clone(), Slot { queued: None });
                        Role::Leader {
                            confirmed: previous,
                        }
                    }
                }
            }
        };

        Ok(PendingMutation {
            key,
            desired,
            inner: Some(Pending {
                cell,
                op,
                role,
                action: self.action,
                slots: Arc::clone(&self.slots),
                events: self.events.clone(),
            }),
        })
    }

    pub async fn run(
        &self,
        key: MutationKey,
        cell: Arc<dyn FieldCell<V>>,
        desired: V,
        op: MutationOp<V>,
    ) -> Result<MutationOutcome<V>, ClientError> {
        Ok(self.begin(key, cell, desired, op)?.settle().await)
    }
}

enum Role<V> {
    Independent { previous: V },
    Leader { confirmed: V },
    Queued,
}

struct Pending<V> {
    cell: Arc<dyn FieldCell<V>>,
    op: MutationOp<V>,
    role: Role<V>,
    action: &'static str,
    slots: Arc<SlotMap<V>>,
    events: EventSender,
}

/// An optimistic write that has been applied but not yet reconciled.
#[must_use = "an optimistic write is only reconciled once settled"]
pub struct PendingMutation<V> {
    key: MutationKey,
    desired: V,
    inner: Option<Pending<V>>,
}

impl<V> PendingMutation<V>
where
    V: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn key(&self) -> &MutationKey {
        &self.key
    }

    pub fn desired(&self) -> &V {
        &self.desired
    }

    /// True when another mutation for the same key is in flight and will send this value.
    pub fn is_queued(&self) -> bool {
        matches!(
            self.inner.as_ref().map(|pending| &pending.role),
            Some(Role::Queued)
        )
    }

    pub async fn settle(mut self) -> MutationOutcome<V> {
        let Some(pending) = self.inner.take() else {
            return MutationOutcome::Coalesced;
        };
        let events = pending.events.clone();
        let outcome = pending.settle(&self.key, self.desired.clone()).await;
        let _ = events.send(ClientEvent::MutationSettled {
            key: self.key.to_string(),
            outcome: outcome.settled_as(),
        });
        outcome
    }
}

impl<V> Drop for PendingMutation<V> {
    fn drop(&mut self) {
        let Some(pending) = self.inner.take() else {
            return;
        };
        match pending.role {
            // The leader still owns the queued value.
            Role::Queued => {}
            Role::Independent { previous } => pending.cell.write(previous),
            Role::Leader { confirmed } => {
                lock(&pending.slots).remove(&self.key);
                pending.cell.write(confirmed);
            }
        }
    }
}

impl<V> Pending<V>
where
    V: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    async fn settle(self, key: &MutationKey, desired: V) -> MutationOutcome<V> {
        match self.role {
            Role::Queued => {
                debug!("optimistic: coalesced key={key} value={desired:?}");
                MutationOutcome::Coalesced
            }
            Role::Independent { ref previous } => {
                let transition = Transition {
                    from: previous.clone(),
                    to: desired.clone(),
                };
                match (self.op)(transition).await {
                    Ok(()) => MutationOutcome::Confirmed(desired),
                    Err(err) => {
                        report_failure(&self.events, self.action, &err);
                        // Unconditional: clobbers any mutation that landed while this one was in flight.
                        self.cell.write(previous.clone());
                        warn!("optimistic: rollback key={key} restored={previous:?}");
                        MutationOutcome::RolledBack {
                            value: previous.clone(),
                            error: err.to_string(),
                        }
                    }
                }
            }
            Role::Leader { ref confirmed } => {
                self.settle_leader(key, confirmed.clone(), desired).await
            }
        }
    }

    async fn settle_leader(
        &self,
        key: &MutationKey,
        mut confirmed: V,
        desired: V,
    ) -> MutationOutcome<V> {
        let mut release = SlotRelease {
            slots: &self.slots,
            key,
            armed: true,
        };
        let mut target = desired;
        let mut shown = target.clone();
        let mut failure: Option<String> = None;

        loop {
            let transition = Transition {
                from: confirmed.clone(),
                to: target.clone(),
            };
            match (self.op)(transition).await {
                Ok(()) => {
                    confirmed = target.clone();
                    failure = None;
                }
                Err(err) => {
                    report_failure(&self.events, self.action, &err);
                    failure = Some(err.to_string());
                }
            }

            let queued = {
                let mut slots = lock(&self.slots);
                let queued = slots.get_mut(key).and_then(|slot| slot.queued.take());
                if !matches!(&queued, Some(value) if *value != confirmed) {
                    slots.remove(key);
                }
                queued
            };

            match queued {
                Some(value) if value != confirmed => {
                    debug!("optimistic: sending queued key={key} value={value:?}");
                    shown = value.clone();
                    target = value;
                }
                Some(value) => {
                    shown = value;
                    break;
                }
                None => break,
            }
        }
        release.armed = false;

        match failure {
            None => MutationOutcome::Confirmed(confirmed),
            Some(error) => {
                if shown != confirmed {
                    self.cell.write(confirmed.clone());
                    warn!("optimistic: rollback key={key} restored={confirmed:?}");
                }
                MutationOutcome::RolledBack {
                    value: confirmed,
                    error,
                }
            }
        }
    }
}

/// Frees the key if the settle future is dropped mid-flight.
struct SlotRelease<'a, V> {
    slots: &'a SlotMap<V>,
    key: &'a MutationKey,
    armed: bool,
}

impl<V> Drop for SlotRelease<'_, V> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.slots).remove(self.key);
        }
    }
}

#[cfg(test)]
#[path = "tests/optimistic_tests.rs"]
mod tests;
