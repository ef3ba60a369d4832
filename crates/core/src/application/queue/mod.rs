// Operation Queue - single-flight asynchronous scheduler
//
// Serializes all remote-store work: at most one operation in flight
// network-wide, selected by priority with insertion-order ties, gated by
// dependency exit, offline admission and retry backoff. The single remote
// record is not safe for concurrent partial updates, so ordering is the
// whole job here.

pub mod constants;
mod handle;
mod options;
mod signals;
mod stats;

pub use handle::OperationHandle;
pub use options::{ClearOptions, EnqueueOptions, QueueSettings, SettingsPatch};
pub use signals::{
    connectivity_channel, shutdown_channel, ConnectivitySender, ConnectivityWatch, ShutdownSender,
    ShutdownToken,
};
pub use stats::{CurrentOperation, OperationSummary, QueueStatistics, QueueStatus};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tracing::{debug, error, info, warn};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::operation::{
    clamp_priority, Operation, OperationId, OperationType, Priority,
};
use crate::domain::work::{WorkItem, WorkOutput};
use crate::error::{Result, SyncError};
use crate::port::{IdProvider, TimeProvider, WorkExecutor};

use constants::DEFAULT_OPERATION_TIMEOUT_MS;

type Completion = oneshot::Sender<Result<WorkOutput>>;

struct PendingEntry {
    op: Operation,
    completion: Completion,
    /// Earliest eligible instant; set while backing off between retries.
    /// Uses the runtime clock so paused-time tests stay coherent.
    not_before: Option<tokio::time::Instant>,
}

struct InFlight {
    id: OperationId,
    op_type: OperationType,
    started_at: i64,
    abort: Option<tokio::task::AbortHandle>,
}

#[derive(Default)]
struct QueueState {
    /// Insertion-ordered; selection scans stably so FIFO breaks ties
    pending: Vec<PendingEntry>,
    processing: Option<InFlight>,
}

pub(crate) struct QueueCore {
    state: Mutex<QueueState>,
    settings: Mutex<QueueSettings>,
    stats: Mutex<QueueStatistics>,
    wake: Notify,
    executor: Arc<dyn WorkExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl QueueCore {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn settings(&self) -> MutexGuard<'_, QueueSettings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stats(&self) -> MutexGuard<'_, QueueStatistics> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn cancel_pending(&self, id: &OperationId) -> bool {
        let entry = {
            let mut state = self.state();
            match state.pending.iter().position(|e| e.op.id == *id) {
                Some(idx) => state.pending.remove(idx),
                None => return false,
            }
        };

        debug!(operation_id = %id, "Operation cancelled");
        let _ = entry.completion.send(Err(SyncError::Cancelled));
        // removal may have satisfied someone's dependency
        self.wake.notify_one();
        true
    }

    pub(super) fn increase_priority(&self, id: &OperationId, amount: Priority) -> Option<Priority> {
        let mut state = self.state();
        let entry = state.pending.iter_mut().find(|e| e.op.id == *id)?;
        entry.op.priority = clamp_priority(entry.op.priority.saturating_add(amount));
        Some(entry.op.priority)
    }
}

/// Single-flight asynchronous operation scheduler
pub struct OperationQueue {
    core: Arc<QueueCore>,
}

impl OperationQueue {
    pub fn new(
        executor: Arc<dyn WorkExecutor>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            core: Arc::new(QueueCore {
                state: Mutex::new(QueueState::default()),
                settings: Mutex::new(settings),
                stats: Mutex::new(QueueStatistics::default()),
                wake: Notify::new(),
                executor,
                time_provider,
                id_provider,
            }),
        }
    }

    /// Enqueue a work item; returns immediately with an awaitable handle.
    ///
    /// Malformed options pre-reject the handle with a Validation error
    /// instead of failing the call.
    pub fn enqueue(&self, work: WorkItem, opts: EnqueueOptions) -> OperationHandle {
        let (tx, rx) = oneshot::channel();
        let id = self.core.id_provider.generate_id();

        let timeout_ms = opts.timeout_ms.unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS);
        if timeout_ms == 0 {
            let _ = tx.send(Err(SyncError::Validation(
                "operation timeout must be non-zero".to_string(),
            )));
            return OperationHandle {
                id,
                core: None,
                rx,
            };
        }

        let now = self.core.time_provider.now_millis();
        let retries = opts
            .retries
            .unwrap_or_else(|| self.core.settings().max_retries);
        let op_type = opts.op_type.unwrap_or_else(|| work.op_type());

        let mut op = Operation::new(id.clone(), now, work, op_type);
        op.priority = clamp_priority(opts.priority);
        op.dependencies = opts.dependencies;
        op.metadata = opts.metadata;
        op.remaining_retries = retries;
        op.offline_safe = opts.offline_safe;
        op.timeout_ms = timeout_ms;

        debug!(
            operation_id = %op.id,
            op_type = %op.op_type.as_str(),
            priority = op.priority,
            "Operation enqueued"
        );

        self.core.stats().total_operations += 1;
        self.core.state().pending.push(PendingEntry {
            op,
            completion: tx,
            not_before: None,
        });
        self.core.wake.notify_one();

        OperationHandle {
            id,
            core: Some(Arc::clone(&self.core)),
            rx,
        }
    }

    /// Run the driver loop until shutdown, draining the queue strictly
    /// one operation at a time
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!("Operation queue driver started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            let processed = self.process_next().await;
            if !processed {
                tokio::select! {
                    _ = self.core.wake.notified() => {}
                    _ = shutdown.wait() => break,
                }
            }
        }
        info!("Operation queue driver stopped");
    }

    /// Process the next eligible operation. Idempotent: a no-op when one
    /// is already in flight or nothing is eligible. Returns whether an
    /// operation ran.
    pub async fn process_next(&self) -> bool {
        let Some((op, completion)) = self.select_next() else {
            return false;
        };

        // run the work on its own task so a panicking executor cannot
        // take down the driver
        let executor = Arc::clone(&self.core.executor);
        let work = op.work.clone();
        let mut join = tokio::spawn(async move { executor.execute(&work).await });

        if let Some(inflight) = self.core.state().processing.as_mut() {
            inflight.abort = Some(join.abort_handle());
        }

        // timeout race: whichever settles first wins, the loser is aborted
        let outcome =
            match tokio::time::timeout(Duration::from_millis(op.timeout_ms), &mut join).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) if join_err.is_cancelled() => Err(SyncError::Cancelled),
                Ok(Err(join_err)) => {
                    error!(operation_id = %op.id, error = %join_err, "Operation task panicked");
                    Err(SyncError::Internal(format!(
                        "operation task panicked: {join_err}"
                    )))
                }
                Err(_) => {
                    join.abort();
                    warn!(
                        operation_id = %op.id,
                        timeout_ms = op.timeout_ms,
                        "Operation timed out"
                    );
                    Err(SyncError::Timeout(op.timeout_ms))
                }
            };

        match outcome {
            Ok(output) => self.finish_success(op, completion, output),
            Err(err) => self.finish_failure(op, completion, err),
        }
        true
    }

    /// Snapshot of queue state and statistics; pure read
    pub fn get_status(&self) -> QueueStatus {
        let now = self.core.time_provider.now_millis();
        let offline = self.core.settings().offline_mode;
        let stats = self.core.stats().clone();
        let state = self.core.state();

        let current = state.processing.as_ref().map(|inflight| CurrentOperation {
            id: inflight.id.clone(),
            op_type: inflight.op_type.clone(),
            elapsed_ms: (now - inflight.started_at).max(0),
        });

        QueueStatus {
            queue_len: state.pending.len(),
            processing: current.is_some(),
            current,
            offline,
            stats,
            pending: state
                .pending
                .iter()
                .map(|entry| OperationSummary {
                    id: entry.op.id.clone(),
                    op_type: entry.op.op_type.clone(),
                    priority: entry.op.priority,
                    status: entry.op.status,
                    enqueued_at: entry.op.enqueued_at,
                })
                .collect(),
        }
    }

    /// Administrative escape hatch: remove matching operations, rejecting
    /// each handle with Cancelled. Returns the count removed.
    pub fn clear(&self, opts: ClearOptions) -> usize {
        let type_matches =
            |op_type: &OperationType| opts.op_type.as_ref().map_or(true, |t| t == op_type);

        let (removed, abort) = {
            let mut state = self.core.state();
            let mut removed = Vec::new();
            let mut kept = Vec::new();
            for entry in state.pending.drain(..) {
                if type_matches(&entry.op.op_type) {
                    removed.push(entry);
                } else {
                    kept.push(entry);
                }
            }
            state.pending = kept;

            let mut abort = None;
            if opts.force || !opts.only_pending {
                if let Some(inflight) = state.processing.as_mut() {
                    if type_matches(&inflight.op_type) {
                        abort = inflight.abort.take();
                    }
                }
            }
            (removed, abort)
        };

        let mut count = removed.len();
        for entry in removed {
            let _ = entry.completion.send(Err(SyncError::Cancelled));
        }
        if let Some(handle) = abort {
            handle.abort();
            count += 1;
        }

        if count > 0 {
            info!(removed = count, "Queue cleared");
            self.core.wake.notify_one();
        }
        count
    }

    /// Merge a settings update; connectivity restoration wakes the driver
    pub fn update_settings(&self, patch: SettingsPatch) {
        let (was_offline, offline) = {
            let mut settings = self.core.settings();
            let was_offline = settings.offline_mode;
            settings.merge(patch);
            (was_offline, settings.offline_mode)
        };

        if was_offline && !offline {
            info!("Connectivity restored, resuming queue");
            self.core.wake.notify_one();
        } else if !was_offline && offline {
            info!("Offline mode enabled, deferring non-offline-safe operations");
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.update_settings(SettingsPatch {
            offline_mode: Some(offline),
            ..Default::default()
        });
    }

    pub fn is_offline(&self) -> bool {
        self.core.settings().offline_mode
    }

    pub fn settings(&self) -> QueueSettings {
        self.core.settings().clone()
    }

    /// Forward connectivity transitions into offline-mode toggles on a
    /// detached task
    pub fn attach_connectivity(self: &Arc<Self>, mut watch: ConnectivityWatch) {
        self.set_offline(!watch.is_online());
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(online) = watch.next_transition().await {
                queue.set_offline(!online);
            }
        });
    }

    /// Selection: among pending operations whose dependencies have left
    /// the queue - and, when offline, which are offline-safe - pick the
    /// highest priority; ties go to the earliest enqueued.
    fn select_next(&self) -> Option<(Operation, Completion)> {
        let now = self.core.time_provider.now_millis();
        let offline = self.core.settings().offline_mode;
        let runtime_now = tokio::time::Instant::now();

        let mut state = self.core.state();
        if state.processing.is_some() {
            return None;
        }

        let pending_ids: HashSet<&str> =
            state.pending.iter().map(|e| e.op.id.as_str()).collect();

        let mut best: Option<(usize, Priority)> = None;
        for (idx, entry) in state.pending.iter().enumerate() {
            if offline && !entry.op.offline_safe {
                continue;
            }
            if entry.not_before.is_some_and(|t| runtime_now < t) {
                continue;
            }
            // a dependency on an id no longer (or never) in the queue is
            // already satisfied
            let blocked = entry
                .op
                .dependencies
                .iter()
                .any(|dep| *dep != entry.op.id && pending_ids.contains(dep.as_str()));
            if blocked {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, priority)) => entry.op.priority > priority,
            };
            if better {
                best = Some((idx, entry.op.priority));
            }
        }

        let (idx, _) = best?;
        let mut entry = state.pending.remove(idx);
        if let Err(err) = entry.op.start(now) {
            error!(operation_id = %entry.op.id, error = %err, "Refusing to start operation");
            let _ = entry.completion.send(Err(err.into()));
            return None;
        }

        state.processing = Some(InFlight {
            id: entry.op.id.clone(),
            op_type: entry.op.op_type.clone(),
            started_at: now,
            abort: None,
        });

        debug!(
            operation_id = %entry.op.id,
            op_type = %entry.op.op_type.as_str(),
            priority = entry.op.priority,
            "Operation selected"
        );
        Some((entry.op, entry.completion))
    }

    fn finish_success(&self, mut op: Operation, completion: Completion, output: WorkOutput) {
        let now = self.core.time_provider.now_millis();
        let duration_ms = op
            .started_at
            .map(|started| (now - started).max(0) as u64)
            .unwrap_or(0);

        if let Err(err) = op.complete() {
            warn!(operation_id = %op.id, error = %err, "Completion bookkeeping failed");
        }

        self.core.stats().record_success(duration_ms, now);
        self.core.state().processing = None;

        info!(
            operation_id = %op.id,
            op_type = %op.op_type.as_str(),
            duration_ms,
            "Operation completed"
        );
        let _ = completion.send(Ok(output));
        self.core.wake.notify_one();
    }

    fn finish_failure(&self, mut op: Operation, completion: Completion, err: SyncError) {
        let now = self.core.time_provider.now_millis();
        let policy = RetryPolicy::from_settings(&self.core.settings());

        if err.is_retryable() {
            if let RetryDecision::Retry(delay_ms) = policy.decide(&op) {
                warn!(
                    operation_id = %op.id,
                    attempt = op.attempts + 1,
                    delay_ms,
                    error = %err,
                    "Retrying operation after failure"
                );

                if let Err(transition_err) = op.requeue() {
                    warn!(operation_id = %op.id, error = %transition_err, "Requeue bookkeeping failed");
                }
                self.core.stats().record_retry();

                // the entry stays in the queue during backoff, so
                // dependents remain blocked on it
                let not_before = tokio::time::Instant::now() + Duration::from_millis(delay_ms);
                {
                    let mut state = self.core.state();
                    state.processing = None;
                    state.pending.push(PendingEntry {
                        op,
                        completion,
                        not_before: Some(not_before),
                    });
                }

                let core = Arc::clone(&self.core);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    core.wake.notify_one();
                });
                return;
            }
        }

        error!(
            operation_id = %op.id,
            op_type = %op.op_type.as_str(),
            attempts = op.attempts + 1,
            error = %err,
            "Operation failed permanently"
        );
        op.fail();
        self.core.stats().record_failure(now);
        self.core.state().processing = None;
        let _ = completion.send(Err(err));
        self.core.wake.notify_one();
    }
}
