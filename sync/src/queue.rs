//! Durable, priority-ordered, rate-limited dispatcher (§4.5).
//!
//! Ground: the reference workspace's `sync::bridge` drives a sync
//! cycle with manual retry/backoff loops and `metrics`/`tracing`
//! instrumentation around each stage; this keeps that instrumentation
//! shape but replaces the ad hoc `while let Err` retry loop with the
//! pure `retry::next_delay` function so delays can be persisted as
//! `next_attempt` rather than awaited inline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, Semaphore};

use core::types::{
    CachedTransaction, QueueItemId, QueueStatus, SyncQueueItem, TransactionId, ENTITY_TYPE_PENDING_TRANSACTION,
};
use errors::{DispatchError, StoreError, SyncError};
use store::Store;

use crate::conflict::{ConflictResolver, ConflictType, ServerAuthoritativeDetail};
use crate::events::{SyncEvent, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::retry::{self, RetryPolicy};

/// The deadline a handler gets per attempt (§5: "every handler receives
/// a cancellation signal and a deadline (default 30s per attempt)").
/// Cancelled/timed-out calls count as `Timeout` and follow §4.3.
pub const DEFAULT_HANDLER_DEADLINE: Duration = Duration::from_secs(30);

/// What a registered handler reports back for one dispatched item.
/// Handlers are the pure `(payload) → Ack | RetryableError |
/// PermanentError | Conflict` functions §4.5 specifies.
#[derive(Debug)]
pub enum HandlerOutcome {
    Ack(AckDetail),
    Retryable(DispatchError),
    Permanent(DispatchError),
    Conflict { conflict_type: ConflictType, server_authoritative: Option<ServerAuthoritativeDetail> },
}

/// Server-confirmed detail attached to a successful ACK. `cached_transaction`
/// lets the `pending_transaction` handler hand back the row the server's
/// `201`/`200` response describes (§6), which the queue inserts
/// idempotently (§8's no-op-if-already-applied round-trip law).
#[derive(Debug, Clone, Default)]
pub struct AckDetail {
    pub cached_transaction: Option<CachedTransaction>,
}

/// A handler for one `entity_type`. Implementations must include the
/// item's idempotency key in any server call they make and rely on the
/// server to deduplicate (§4.5 "Idempotency").
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: Value) -> HandlerOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchSummary {
    pub started: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.started += 1;
        match outcome {
            ItemOutcome::Completed => self.completed += 1,
            ItemOutcome::Retried => self.retried += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.started == 0
    }
}

#[derive(Debug, Clone, Copy)]
enum ItemOutcome {
    Completed,
    Retried,
    Failed,
}

struct Inner {
    store: Store,
    handlers: DashMap<String, Arc<dyn Handler>>,
    conflict_resolver: ConflictResolver,
    events: broadcast::Sender<SyncEvent>,
    in_flight_entities: DashSet<String>,
    semaphore: Arc<Semaphore>,
    batch_size: usize,
    shutting_down: AtomicBool,
    active_dispatches: AtomicUsize,
}

/// The sole mutator of `sync_queue` rows (§5). Cheap to clone — it's a
/// handle around `Arc<Inner>`, matching `Store`'s own clone-a-handle
/// shape.
#[derive(Clone)]
pub struct SyncQueue {
    inner: Arc<Inner>,
}

impl SyncQueue {
    #[must_use]
    pub fn new(store: Store, batch_size: usize, max_in_flight: usize) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                handlers: DashMap::new(),
                conflict_resolver: ConflictResolver::default(),
                events,
                in_flight_entities: DashSet::new(),
                semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
                batch_size: batch_size.max(1),
                shutting_down: AtomicBool::new(false),
                active_dispatches: AtomicUsize::new(0),
            }),
        }
    }

    /// `register(entity_type, handler)` (§4.5).
    pub fn register(&self, entity_type: impl Into<String>, handler: Arc<dyn Handler>) {
        self.inner.handlers.insert(entity_type.into(), handler);
    }

    /// Subscribes to the event stream (§4.5 `events`).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// A clone of the underlying event publisher, so a [`crate::push::PushConsumer`]
    /// can fan `applyServerAlert` pushes out over the same bus dispatcher
    /// events travel on.
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<SyncEvent> {
        self.inner.events.clone()
    }

    /// The store this queue dispatches against, so a [`crate::push::PushConsumer`]
    /// can share the same durable cache rather than opening a second
    /// connection.
    #[must_use]
    pub fn store(&self) -> Store {
        self.inner.store.clone()
    }

    /// `enqueue(op) → id` (§4.5).
    pub async fn enqueue(&self, item: SyncQueueItem) -> Result<QueueItemId, SyncError> {
        store::sync_queue::insert(self.inner.store.pool(), &item).await?;
        let _ = self.inner.events.send(SyncEvent::Enqueued {
            item_id: item.id,
            entity_type: item.entity_type.clone(),
            entity_id: item.entity_id.clone(),
            timestamp: Utc::now(),
        });
        Ok(item.id)
    }

    /// `dispatch()` — a single pass (§4.5): select up to `batch_size`
    /// due items, invoke each one's handler, record the outcome.
    ///
    /// Per-entity FIFO (§4.5 "Ordering guarantees"): within one pass,
    /// at most one item per `entity_id` is dispatched — a second item
    /// for the same entity waits for the next pass, by which point the
    /// first has either completed or failed.
    pub async fn dispatch(&self) -> Result<DispatchSummary, SyncError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(SyncError::ShuttingDown);
        }
        self.inner.active_dispatches.fetch_add(1, Ordering::SeqCst);
        let result = self.dispatch_inner().await;
        self.inner.active_dispatches.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn dispatch_inner(&self) -> Result<DispatchSummary, SyncError> {
        let candidates =
            store::sync_queue::select_dispatchable(self.inner.store.pool(), self.inner.batch_size as i64).await?;

        let mut seen_entities = HashSet::new();
        let mut dispatchable = Vec::new();
        for item in candidates {
            if self.inner.in_flight_entities.contains(&item.entity_id) {
                continue;
            }
            if seen_entities.insert(item.entity_id.clone()) {
                dispatchable.push(item);
            }
        }

        let mut tasks = FuturesUnordered::new();
        for item in dispatchable {
            self.inner.in_flight_entities.insert(item.entity_id.clone());
            let this = self.clone();
            let semaphore = Arc::clone(&this.inner.semaphore);
            tasks.push(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                let outcome = this.process_item(&item).await;
                this.inner.in_flight_entities.remove(&item.entity_id);
                outcome
            });
        }

        let mut summary = DispatchSummary::default();
        while let Some(outcome) = tasks.next().await {
            summary.record(&outcome);
        }

        if summary.is_empty() {
            let _ = self.inner.events.send(SyncEvent::Drained { timestamp: Utc::now() });
        }

        Ok(summary)
    }

    /// Repeatedly calls `dispatch()` until a pass processes nothing,
    /// i.e. the queue is drained (§4.5 trigger 4, explicit `flush()`).
    pub async fn flush(&self) -> Result<DispatchSummary, SyncError> {
        let mut total = DispatchSummary::default();
        loop {
            let summary = self.dispatch().await?;
            total.started += summary.started;
            total.completed += summary.completed;
            total.retried += summary.retried;
            total.failed += summary.failed;
            if summary.is_empty() {
                break;
            }
        }
        Ok(total)
    }

    /// §4.5 trigger 3: a fixed heartbeat loop. Runs until `shutdown` is
    /// called; intended to be spawned as its own task by the caller.
    pub async fn run_heartbeat(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.inner.shutting_down.load(Ordering::SeqCst) {
                break;
            }
            if let Err(err) = self.dispatch().await {
                tracing::warn!(error = %err, "heartbeat dispatch pass failed");
            }
        }
    }

    /// `statsByStatus()` (§4.5).
    pub async fn stats_by_status(&self) -> Result<[(QueueStatus, i64); 4], StoreError> {
        let pool = self.inner.store.pool();
        Ok([
            (QueueStatus::Pending, store::sync_queue::count_by_status(pool, QueueStatus::Pending).await?),
            (QueueStatus::Processing, 0),
            (QueueStatus::Completed, store::sync_queue::count_by_status(pool, QueueStatus::Completed).await?),
            (QueueStatus::Failed, store::sync_queue::count_by_status(pool, QueueStatus::Failed).await?),
        ])
    }

    /// Stops accepting new dispatch passes, awaits any pass already in
    /// flight up to `grace`, then returns. Items whose handlers did not
    /// finish in time are left `pending` for the next process (§4.5
    /// "Cancellation").
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + grace;
        while self.inner.active_dispatches.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn process_item(&self, item: &SyncQueueItem) -> ItemOutcome {
        let _ = self.inner.events.send(SyncEvent::Started {
            item_id: item.id,
            entity_type: item.entity_type.clone(),
            attempt: item.retry_count + 1,
            timestamp: Utc::now(),
        });

        let handler = self.inner.handlers.get(&item.entity_type).map(|h| Arc::clone(h.value()));
        let Some(handler) = handler else {
            self.fail(item, "no handler registered for this entity_type").await;
            return ItemOutcome::Failed;
        };

        let outcome = match tokio::time::timeout(DEFAULT_HANDLER_DEADLINE, handler.handle(item.payload.clone())).await
        {
            Ok(outcome) => outcome,
            Err(_) => HandlerOutcome::Retryable(DispatchError::Timeout {
                timeout_ms: DEFAULT_HANDLER_DEADLINE.as_millis() as u64,
            }),
        };

        match outcome {
            HandlerOutcome::Ack(detail) => self.complete(item, detail).await,
            HandlerOutcome::Retryable(err) => self.retry_or_fail(item, err).await,
            HandlerOutcome::Permanent(err) => {
                self.fail(item, &err.to_string()).await;
                ItemOutcome::Failed
            }
            HandlerOutcome::Conflict { conflict_type, server_authoritative } => {
                self.resolve_conflict(item, conflict_type, server_authoritative).await
            }
        }
    }

    async fn complete(&self, item: &SyncQueueItem, detail: AckDetail) -> ItemOutcome {
        if item.entity_type == ENTITY_TYPE_PENDING_TRANSACTION {
            if let Ok(id) = item.entity_id.parse::<uuid::Uuid>() {
                let _ = store::pending_transactions::mark_synced(self.inner.store.pool(), TransactionId(id), None).await;
            }
        }
        if let Some(cached_transaction) = detail.cached_transaction {
            let _ = store::transactions::insert_or_ignore(self.inner.store.pool(), &cached_transaction).await;
        }

        match store::sync_queue::mark_completed(self.inner.store.pool(), item.id).await {
            Ok(()) => {
                let _ = self.inner.events.send(SyncEvent::Completed {
                    item_id: item.id,
                    entity_type: item.entity_type.clone(),
                    timestamp: Utc::now(),
                });
                ItemOutcome::Completed
            }
            Err(err) => {
                tracing::error!(error = %err, item_id = %item.id, "failed to record dispatch completion");
                ItemOutcome::Failed
            }
        }
    }

    async fn retry_or_fail(&self, item: &SyncQueueItem, err: DispatchError) -> ItemOutcome {
        let (category, retry_after) = retry::classify(&err);
        if !category.is_retryable() || item.retry_count + 1 > item.max_retries {
            self.fail(item, &err.to_string()).await;
            return ItemOutcome::Failed;
        }

        let policy = RetryPolicy::for_entity_type(&item.entity_type);
        let delay = retry_after.unwrap_or_else(|| retry::next_delay(policy, item.retry_count));
        let next_attempt = Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(60));

        if item.entity_type == ENTITY_TYPE_PENDING_TRANSACTION {
            if let Ok(id) = item.entity_id.parse::<uuid::Uuid>() {
                let _ = store::pending_transactions::record_retry(self.inner.store.pool(), TransactionId(id), &err.to_string())
                    .await;
            }
        }

        match store::sync_queue::mark_retry(self.inner.store.pool(), item.id, next_attempt, &err.to_string()).await {
            Ok(()) => {
                let _ = self.inner.events.send(SyncEvent::Retried {
                    item_id: item.id,
                    entity_type: item.entity_type.clone(),
                    retry_count: item.retry_count + 1,
                    next_attempt,
                    reason: err.to_string(),
                });
                ItemOutcome::Retried
            }
            Err(store_err) => {
                tracing::error!(error = %store_err, item_id = %item.id, "failed to record retry");
                ItemOutcome::Failed
            }
        }
    }

    async fn fail(&self, item: &SyncQueueItem, reason: &str) {
        if let Err(err) = store::sync_queue::mark_failed(self.inner.store.pool(), item.id, reason).await {
            tracing::error!(error = %err, item_id = %item.id, "failed to record permanent failure");
        }
        let _ = self.inner.events.send(SyncEvent::Failed {
            item_id: item.id,
            entity_type: item.entity_type.clone(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// §4.4: conflict resolution, delegated per entity type. A
    /// `ServerAuthoritative` rejection of a monetary
    /// `pending_transaction` always runs the mandatory reversal
    /// procedure below, regardless of any configured strategy — that
    /// invariant is enforced structurally rather than by trusting every
    /// caller's `ConflictResolver` configuration.
    async fn resolve_conflict(
        &self,
        item: &SyncQueueItem,
        conflict_type: ConflictType,
        server_authoritative: Option<ServerAuthoritativeDetail>,
    ) -> ItemOutcome {
        if item.entity_type == ENTITY_TYPE_PENDING_TRANSACTION && conflict_type == ConflictType::ServerAuthoritative {
            return self.resolve_payment_rejection(item, server_authoritative).await;
        }

        match self.inner.conflict_resolver.strategy_for(&item.entity_type) {
            crate::conflict::ResolutionStrategy::ServerWins
            | crate::conflict::ResolutionStrategy::ClientWins
            | crate::conflict::ResolutionStrategy::Merge => {
                // The handler already applied the server/merged state as
                // part of producing this conflict outcome; the queue's
                // job is only to record that the item is settled.
                match store::sync_queue::mark_completed(self.inner.store.pool(), item.id).await {
                    Ok(()) => {
                        let _ = self.inner.events.send(SyncEvent::Completed {
                            item_id: item.id,
                            entity_type: item.entity_type.clone(),
                            timestamp: Utc::now(),
                        });
                        ItemOutcome::Completed
                    }
                    Err(err) => {
                        tracing::error!(error = %err, item_id = %item.id, "failed to record conflict resolution");
                        ItemOutcome::Failed
                    }
                }
            }
            crate::conflict::ResolutionStrategy::Manual => {
                self.fail(item, &format!("manual resolution required: {conflict_type:?}")).await;
                let _ = self.inner.events.send(SyncEvent::ManualConflictDetected {
                    item_id: item.id,
                    entity_type: item.entity_type.clone(),
                    conflict_type,
                    timestamp: Utc::now(),
                });
                ItemOutcome::Failed
            }
        }
    }

    /// §4.4 monetary invariant: (a) revert the speculative local debit
    /// by setting the wallet to the server-reported balance, (b) mark
    /// the pending transaction synced with a failure note, (c) mark the
    /// queue item completed — the rejection is a resolved outcome, not
    /// a retryable failure, (d) emit `PaymentRejected`.
    async fn resolve_payment_rejection(
        &self,
        item: &SyncQueueItem,
        detail: Option<ServerAuthoritativeDetail>,
    ) -> ItemOutcome {
        let Some(detail) = detail else {
            self.fail(item, "ServerAuthoritative conflict missing required balance detail").await;
            return ItemOutcome::Failed;
        };

        let Ok(tx_id) = item.entity_id.parse::<uuid::Uuid>() else {
            self.fail(item, "pending_transaction entity_id was not a UUID").await;
            return ItemOutcome::Failed;
        };
        let tx_id = TransactionId(tx_id);

        let pending = match store::pending_transactions::get_by_id(self.inner.store.pool(), tx_id).await {
            Ok(Some(pending)) => pending,
            Ok(None) => {
                self.fail(item, "pending_transaction row not found for ServerAuthoritative rejection").await;
                return ItemOutcome::Failed;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load pending transaction for conflict resolution");
                return ItemOutcome::Failed;
            }
        };

        if let Err(err) =
            store::wallets::set_balance(self.inner.store.pool(), pending.wallet_id, detail.reported_balance).await
        {
            tracing::error!(error = %err, "failed to restore wallet balance on payment rejection");
            return ItemOutcome::Failed;
        }

        if let Err(err) =
            store::pending_transactions::mark_synced(self.inner.store.pool(), tx_id, Some(&detail.failure_note)).await
        {
            tracing::error!(error = %err, "failed to mark rejected pending transaction synced");
            return ItemOutcome::Failed;
        }

        let outcome = match store::sync_queue::mark_completed(self.inner.store.pool(), item.id).await {
            Ok(()) => ItemOutcome::Completed,
            Err(err) => {
                tracing::error!(error = %err, "failed to mark rejected payment's queue item completed");
                ItemOutcome::Failed
            }
        };

        let _ = self.inner.events.send(SyncEvent::PaymentRejected {
            pending_transaction_id: tx_id,
            wallet_id: pending.wallet_id,
            balance_after: detail.reported_balance,
            reason: detail.failure_note,
            timestamp: Utc::now(),
        });

        outcome
    }
}
