//! The offline mutation queue.
//!
//! Operation lifecycle:
//!
//! ```text
//! pending -> syncing -> completed
//!                    -> pending   (failed, retries left)
//!                    -> failed    (retry ceiling reached, until retry_failed)
//! ```
//!
//! A run replays the pending operations in enqueue order and never stops at
//! the first failure. Only one run is active at a time: a second call while
//! one is in flight returns `None` straight away.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    backend::{SyncBackend, SyncFailure, SyncOutcome, SyncRequest},
    error::{OfflineError, Result},
    operation::{
        CachedEntity, EntityRef, EntityType, NewOperation, OperationKind, OperationStatus,
        QueueState, QueuedOperation, TempId,
    },
    store::LocalStore,
};

/// Attempts before an operation is parked as `failed`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// How long completed operations are kept before being pruned.
pub const DEFAULT_COMPLETED_GRACE: Duration = Duration::from_secs(60);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    pub max_retries: u32,
    pub completed_grace: Duration,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            completed_grace: DEFAULT_COMPLETED_GRACE,
        }
    }
}

/// Outcome of one [`OfflineQueue::process_queue`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub succeeded: usize,
    /// Operations that reached the retry ceiling during this run.
    pub failed: usize,
    /// Operations that failed but went back to `pending`.
    pub retried: usize,
}

/// Progress notifications of a run, see [`OfflineQueue::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started { total: usize },
    Progress { processed: usize, total: usize },
    Finished(SyncReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub syncing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// What happened to one operation during a run.
enum Replayed {
    Succeeded,
    Retried,
    Failed,
    Skipped,
}

/// Clears the in-process run flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct OfflineQueue {
    store: Arc<dyn LocalStore>,
    backend: Arc<dyn SyncBackend>,
    policy: QueuePolicy,
    online: AtomicBool,
    running: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl OfflineQueue {
    /// Return a builder for `OfflineQueue`.
    pub fn builder() -> OfflineQueueBuilder {
        OfflineQueueBuilder::default()
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Whether a run is in flight in this process.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// All operations in enqueue order.
    pub fn operations(&self) -> Result<Vec<QueuedOperation>> {
        let mut operations = self.store.operations()?;
        operations.sort_by_key(|op| op.seq);
        Ok(operations)
    }

    pub fn counts(&self) -> Result<QueueCounts> {
        let mut counts = QueueCounts::default();
        for op in self.store.operations()? {
            match op.status {
                OperationStatus::Pending => counts.pending += 1,
                OperationStatus::Syncing => counts.syncing += 1,
                OperationStatus::Completed => counts.completed += 1,
                OperationStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    pub fn queue_state(&self) -> Result<QueueState> {
        self.store.queue_state()
    }

    pub fn entity(&self, temp_id: &TempId) -> Result<Option<CachedEntity>> {
        self.store.entity(temp_id)
    }

    pub fn entities(&self) -> Result<Vec<CachedEntity>> {
        self.store.entities()
    }

    /// Server id known for `reference`, if any.
    fn server_id(&self, reference: &EntityRef) -> Result<Option<String>> {
        match reference {
            EntityRef::Server(id) => Ok(Some(id.clone())),
            EntityRef::Local(temp_id) => {
                Ok(self.store.entity(temp_id)?.and_then(|entity| entity.server_id))
            }
        }
    }

    /// Replaces a local reference by its server id when that is already known.
    fn resolve(&self, reference: EntityRef) -> Result<EntityRef> {
        Ok(match self.server_id(&reference)? {
            Some(id) => EntityRef::Server(id),
            None => reference,
        })
    }

    /// Records a mutation. Nothing is sent until the next run.
    ///
    /// Creates get a temporary handle when none is given and a cached entity
    /// under that handle; diary entries and places must name their trip.
    pub fn enqueue(&self, new: NewOperation) -> Result<QueuedOperation> {
        let target = match (new.kind, new.target) {
            (OperationKind::Create, None) => EntityRef::Local(TempId::generate()),
            (OperationKind::Create, Some(EntityRef::Local(temp_id))) => EntityRef::Local(temp_id),
            (OperationKind::Create, Some(EntityRef::Server(id))) => {
                return Err(OfflineError::InvalidArgument(format!(
                    "a create cannot target the existing entity {id}"
                )));
            }
            (_, None) => {
                return Err(OfflineError::InvalidArgument(
                    "update and delete need a target".to_string(),
                ));
            }
            (_, Some(target)) => self.resolve(target)?,
        };
        if new.kind == OperationKind::Create && new.entity.needs_parent() && new.parent.is_none()
        {
            return Err(OfflineError::InvalidArgument(format!(
                "{:?} must be created under a trip",
                new.entity
            )));
        }
        let parent = new.parent.map(|parent| self.resolve(parent)).transpose()?;

        let now = Utc::now();
        let op = QueuedOperation {
            id: Uuid::new_v4(),
            seq: self.store.next_seq()?,
            kind: new.kind,
            entity: new.entity,
            target,
            parent,
            payload: new.payload,
            status: OperationStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_error: None,
        };
        self.store.put_operation(&op)?;

        match (op.kind, &op.target) {
            (OperationKind::Create, EntityRef::Local(temp_id)) => {
                self.store.put_entity(&CachedEntity {
                    temp_id: temp_id.clone(),
                    entity: op.entity,
                    server_id: None,
                    payload: op.payload.clone(),
                    updated_at: now,
                })?;
            }
            (OperationKind::Update, EntityRef::Local(temp_id)) => {
                if let Some(mut cached) = self.store.entity(temp_id)? {
                    cached.payload = op.payload.clone();
                    cached.updated_at = now;
                    self.store.put_entity(&cached)?;
                }
            }
            _ => {}
        }

        tracing::debug!(
            "enqueued {:?} {:?} {} as #{}",
            op.kind,
            op.entity,
            op.target,
            op.seq
        );
        Ok(op)
    }

    /// The request for `op`, or the reference that still has no server id.
    fn request_for(
        &self,
        op: &QueuedOperation,
    ) -> Result<std::result::Result<SyncRequest, SyncFailure>> {
        let target = match op.kind {
            OperationKind::Create => None,
            OperationKind::Update | OperationKind::Delete => {
                match self.server_id(&op.target)? {
                    Some(id) => Some(id),
                    None => {
                        return Ok(Err(SyncFailure::UnresolvedReference(
                            op.target.to_string(),
                        )));
                    }
                }
            }
        };
        let parent = match &op.parent {
            Some(parent) => match self.server_id(parent)? {
                Some(id) => Some(id),
                None => return Ok(Err(SyncFailure::UnresolvedReference(parent.to_string()))),
            },
            None => None,
        };
        Ok(Ok(SyncRequest {
            kind: op.kind,
            entity: op.entity,
            target,
            parent,
            payload: op.payload.clone(),
        }))
    }

    /// Replays every pending operation once, in enqueue order.
    ///
    /// Returns `None` without doing anything when offline or when another
    /// run is in flight.
    pub async fn process_queue(&self) -> Result<Option<SyncReport>> {
        if !self.is_online() {
            tracing::debug!("offline, queue run skipped");
            return Ok(None);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("queue run already in flight");
            return Ok(None);
        }
        let _guard = RunGuard(&self.running);

        // A token still at `Syncing` means an earlier run never finished.
        if matches!(self.store.queue_state()?, QueueState::Syncing { .. }) {
            self.reset_interrupted()?;
        }
        self.store.set_queue_state(QueueState::Syncing {
            started_at: Utc::now(),
        })?;

        let mut pending: Vec<QueuedOperation> = self
            .store
            .operations()?
            .into_iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .collect();
        pending.sort_by_key(|op| op.seq);
        let total = pending.len();
        tracing::info!("replaying {total} queued operation(s)");
        self.emit(SyncEvent::Started { total });

        let mut report = SyncReport::default();
        for (index, queued) in pending.into_iter().enumerate() {
            match self.replay(queued.id).await? {
                Replayed::Succeeded => report.succeeded += 1,
                Replayed::Retried => report.retried += 1,
                Replayed::Failed => report.failed += 1,
                Replayed::Skipped => {}
            }
            self.emit(SyncEvent::Progress {
                processed: index + 1,
                total,
            });
        }

        self.prune_completed()?;
        self.store.set_queue_state(QueueState::Idle)?;
        tracing::info!(
            "queue run done: {} succeeded, {} failed, {} to retry",
            report.succeeded,
            report.failed,
            report.retried
        );
        self.emit(SyncEvent::Finished(report));
        Ok(Some(report))
    }

    /// Sends one operation, if it is still pending.
    async fn replay(&self, id: Uuid) -> Result<Replayed> {
        // Re-read: an earlier create may have remapped its references, or the
        // queue may have been cleared meanwhile.
        let Some(mut op) = self.store.operation(id)? else {
            return Ok(Replayed::Skipped);
        };
        if op.status != OperationStatus::Pending {
            return Ok(Replayed::Skipped);
        }
        op.status = OperationStatus::Syncing;
        op.updated_at = Utc::now();
        if !self.store.update_operation(&op)? {
            return Ok(Replayed::Skipped);
        }

        let result = match self.request_for(&op)? {
            Ok(request) => self.backend.send(&request).await,
            Err(failure) => Err(failure),
        };
        match result {
            Ok(outcome) => {
                self.complete(op, outcome)?;
                Ok(Replayed::Succeeded)
            }
            Err(failure) => Ok(match self.fail(op, &failure)? {
                Some(OperationStatus::Failed) => Replayed::Failed,
                Some(_) => Replayed::Retried,
                None => Replayed::Skipped,
            }),
        }
    }

    /// Marks `op` completed, unless it was cleared while in flight, and
    /// records the server id of a created entity either way.
    fn complete(&self, mut op: QueuedOperation, outcome: SyncOutcome) -> Result<()> {
        let now = Utc::now();
        op.status = OperationStatus::Completed;
        op.completed_at = Some(now);
        op.updated_at = now;
        op.last_error = None;
        if !self.store.update_operation(&op)? {
            tracing::debug!("#{} was cleared while in flight", op.seq);
        }

        if op.kind != OperationKind::Create {
            return Ok(());
        }
        let EntityRef::Local(temp_id) = &op.target else {
            return Ok(());
        };
        match outcome.server_id {
            Some(server_id) => {
                self.assign_server_id(temp_id, op.entity, &op.payload, server_id)
            }
            None => {
                tracing::warn!("create of {temp_id} succeeded without a server id");
                Ok(())
            }
        }
    }

    /// Stores the server id on the cached entity and points every unfinished
    /// operation that references `temp_id` at it.
    fn assign_server_id(
        &self,
        temp_id: &TempId,
        entity: EntityType,
        payload: &serde_json::Value,
        server_id: String,
    ) -> Result<()> {
        let now = Utc::now();
        let mut cached = self.store.entity(temp_id)?.unwrap_or_else(|| CachedEntity {
            temp_id: temp_id.clone(),
            entity,
            server_id: None,
            payload: payload.clone(),
            updated_at: now,
        });
        cached.server_id = Some(server_id.clone());
        cached.updated_at = now;
        self.store.put_entity(&cached)?;

        let server_ref = EntityRef::Server(server_id);
        for mut op in self.store.operations()? {
            if op.status == OperationStatus::Completed || !op.references(temp_id) {
                continue;
            }
            if op.target.local() == Some(temp_id) {
                op.target = server_ref.clone();
            }
            if op.parent.as_ref().and_then(EntityRef::local) == Some(temp_id) {
                op.parent = Some(server_ref.clone());
            }
            op.updated_at = now;
            self.store.update_operation(&op)?;
        }
        tracing::debug!("{temp_id} is now {server_ref}");
        Ok(())
    }

    /// Records a failed attempt. Returns the new status, or `None` when the
    /// operation was cleared while in flight.
    fn fail(
        &self,
        mut op: QueuedOperation,
        failure: &SyncFailure,
    ) -> Result<Option<OperationStatus>> {
        op.retry_count += 1;
        op.last_error = Some(failure.to_string());
        op.updated_at = Utc::now();
        op.status = if op.retry_count >= self.policy.max_retries {
            OperationStatus::Failed
        } else {
            OperationStatus::Pending
        };
        tracing::warn!(
            "#{} {:?} {:?} failed (attempt {}/{}): {failure}",
            op.seq,
            op.kind,
            op.entity,
            op.retry_count,
            self.policy.max_retries
        );
        if !self.store.update_operation(&op)? {
            tracing::debug!("#{} was cleared while in flight", op.seq);
            return Ok(None);
        }
        Ok(Some(op.status))
    }

    /// Moves every failed operation back to pending with a fresh retry
    /// budget, then runs the queue.
    pub async fn retry_failed(&self) -> Result<Option<SyncReport>> {
        let now = Utc::now();
        for mut op in self.store.operations()? {
            if op.status != OperationStatus::Failed {
                continue;
            }
            op.status = OperationStatus::Pending;
            op.retry_count = 0;
            op.updated_at = now;
            self.store.update_operation(&op)?;
        }
        self.process_queue().await
    }

    /// Deletes completed operations; returns how many were removed.
    pub fn clear_completed(&self) -> Result<usize> {
        self.delete_where(|op| op.status == OperationStatus::Completed)
    }

    /// Deletes every operation whatever its status; cached entities stay.
    pub fn clear_all(&self) -> Result<usize> {
        self.delete_where(|_| true)
    }

    /// Deletes completed operations older than the grace period.
    pub fn prune_completed(&self) -> Result<usize> {
        let grace = TimeDelta::from_std(self.policy.completed_grace).unwrap_or(TimeDelta::MAX);
        let Some(cutoff) = Utc::now().checked_sub_signed(grace) else {
            return Ok(0);
        };
        self.delete_where(|op| {
            op.status == OperationStatus::Completed
                && op.completed_at.is_some_and(|at| at <= cutoff)
        })
    }

    fn delete_where(&self, predicate: impl Fn(&QueuedOperation) -> bool) -> Result<usize> {
        let ids: Vec<Uuid> = self
            .store
            .operations()?
            .into_iter()
            .filter(|op| predicate(op))
            .map(|op| op.id)
            .collect();
        if !ids.is_empty() {
            self.store.delete_operations(&ids)?;
        }
        Ok(ids.len())
    }

    /// Reconciles a run that was interrupted before it could finish.
    ///
    /// Operations left in `syncing` go back to `pending` with their retry
    /// count untouched and the state token is reset to `Idle`. Returns the
    /// number of operations reset. Does nothing while a run is in flight.
    ///
    /// [`OfflineQueue::process_queue`] does the same before replaying when it
    /// finds the state token still at `Syncing`.
    pub fn recover(&self) -> Result<usize> {
        if self.is_running() {
            return Ok(0);
        }
        self.reset_interrupted()
    }

    fn reset_interrupted(&self) -> Result<usize> {
        let state = self.store.queue_state()?;
        let now = Utc::now();
        let mut reset = 0;
        for mut op in self.store.operations()? {
            if op.status != OperationStatus::Syncing {
                continue;
            }
            op.status = OperationStatus::Pending;
            op.updated_at = now;
            if self.store.update_operation(&op)? {
                reset += 1;
            }
        }

        if let QueueState::Syncing { started_at } = state {
            tracing::warn!(
                "queue run started at {started_at} was interrupted, {reset} operation(s) back to pending"
            );
            self.store.set_queue_state(QueueState::Idle)?;
        } else if reset > 0 {
            tracing::warn!("{reset} operation(s) were stuck in syncing, back to pending");
        }
        Ok(reset)
    }
}

/// The builder for `OfflineQueue`
pub struct OfflineQueueBuilder {
    store: Option<Arc<dyn LocalStore>>,
    backend: Option<Arc<dyn SyncBackend>>,
    policy: QueuePolicy,
    online: bool,
}

impl Default for OfflineQueueBuilder {
    fn default() -> Self {
        Self {
            store: None,
            backend: None,
            policy: QueuePolicy::default(),
            online: true,
        }
    }
}

impl OfflineQueueBuilder {
    /// Pass the required local store
    pub fn store(mut self, store: Arc<dyn LocalStore>) -> OfflineQueueBuilder {
        self.store = Some(store);
        self
    }

    /// Pass the required backend
    pub fn backend(mut self, backend: Arc<dyn SyncBackend>) -> OfflineQueueBuilder {
        self.backend = Some(backend);
        self
    }

    pub fn policy(mut self, policy: QueuePolicy) -> OfflineQueueBuilder {
        self.policy = policy;
        self
    }

    /// Initial connectivity; defaults to online.
    pub fn online(mut self, online: bool) -> OfflineQueueBuilder {
        self.online = online;
        self
    }

    /// Construct `OfflineQueue`
    pub fn build(self) -> Result<OfflineQueue> {
        let store = self
            .store
            .ok_or_else(|| OfflineError::InvalidArgument("queue store missing".to_string()))?;
        let backend = self
            .backend
            .ok_or_else(|| OfflineError::InvalidArgument("sync backend missing".to_string()))?;
        if self.policy.max_retries == 0 {
            return Err(OfflineError::InvalidArgument(
                "max_retries must be at least 1".to_string(),
            ));
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(OfflineQueue {
            store,
            backend,
            policy: self.policy,
            online: AtomicBool::new(self.online),
            running: AtomicBool::new(false),
            events,
        })
    }
}
