//! Background coordinator for embedding jobs.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::item::{PendingList, PendingSummary, QueueItem, QueuePayload};
use crate::config::QueueConfig;
use crate::error::{Error, ProviderError, Result, VectorStoreError};
use crate::metrics::{QUEUE_DROPPED, QUEUE_FAILED, QUEUE_LENGTH, QUEUE_PROCESSED};
use crate::model::{Profile, Project};

/// Does the actual work for one queue item.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, item: &QueueItem) -> Result<()>;
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue_length: usize,
    pub processing_count: usize,
    pub max_concurrent: usize,
    pub processed: u64,
    pub failed: u64,
    pub dropped: u64,
}

struct Shared {
    pending: Mutex<PendingList>,
    handler: Arc<dyn JobHandler>,
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    wake: Notify,
    /// Signalled when the last in-flight job finishes with nothing pending.
    idle: Notify,
    processing: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    async fn finish(&self, mut item: QueueItem, result: Result<()>) {
        match result {
            Ok(()) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(QUEUE_PROCESSED).increment(1);
                info!(kind = %item.content_type(), id = %item.id(), "Embedding updated");
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(QUEUE_FAILED).increment(1);
                if is_permanent(&e) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(QUEUE_DROPPED).increment(1);
                    error!(
                        kind = %item.content_type(),
                        id = %item.id(),
                        error = %e,
                        "Embedding job cannot succeed, dropped"
                    );
                } else if item.retries < self.config.max_retries {
                    item.retries += 1;
                    item.priority -= self.config.retry_priority_penalty;
                    warn!(
                        kind = %item.content_type(),
                        id = %item.id(),
                        retries = item.retries,
                        priority = item.priority,
                        error = %e,
                        "Embedding job failed, requeued"
                    );
                    let mut pending = self.pending.lock().await;
                    pending.insert(item);
                    metrics::gauge!(QUEUE_LENGTH).set(pending.len() as f64);
                } else {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(QUEUE_DROPPED).increment(1);
                    error!(
                        kind = %item.content_type(),
                        id = %item.id(),
                        retries = item.retries,
                        error = %e,
                        "Embedding job dropped after max retries"
                    );
                }
            }
        }
    }

    async fn is_idle(&self) -> bool {
        let pending = self.pending.lock().await;
        pending.is_empty() && self.processing.load(Ordering::SeqCst) == 0
    }

    async fn signal_if_idle(&self) {
        if self.is_idle().await {
            self.idle.notify_waiters();
        }
    }

    /// Start jobs until the queue is empty or every slot is taken.
    async fn dispatch(self: &Arc<Self>) {
        loop {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let item = {
                let mut pending = self.pending.lock().await;
                let item = pending.pop();
                if item.is_some() {
                    // counted before the lock drops so stats never miss it
                    self.processing.fetch_add(1, Ordering::SeqCst);
                }
                metrics::gauge!(QUEUE_LENGTH).set(pending.len() as f64);
                item
            };
            let Some(item) = item else {
                return;
            };

            debug!(kind = %item.content_type(), id = %item.id(), priority = item.priority, "Dispatching embedding job");
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let result = shared.handler.handle(&item).await;
                shared.finish(item, result).await;
                shared.processing.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
                shared.signal_if_idle().await;
                shared.wake.notify_one();
            });
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let poll_interval = self.config.poll_interval();
        info!(
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Embedding queue started"
        );

        while !*shutdown_rx.borrow() {
            self.dispatch().await;
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        // in-flight jobs hold permits; taking them all waits for completion
        let slots = self.config.max_concurrent as u32;
        if let Ok(permits) = self.semaphore.acquire_many(slots).await {
            drop(permits);
        }
        info!("Embedding queue stopped");
    }
}

/// Failures that retrying cannot fix.
fn is_permanent(err: &Error) -> bool {
    matches!(
        err,
        Error::Provider(ProviderError::InvalidInput(_) | ProviderError::Rejected { .. })
            | Error::VectorStore(VectorStoreError::DimensionMismatch { .. })
    )
}

struct Worker {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

fn is_alive(worker: &Option<Worker>) -> bool {
    worker.as_ref().is_some_and(|w| !w.task.is_finished())
}

/// Priority queue of re-embedding jobs processed in the background.
///
/// Nothing is processed until [`start`](Self::start) is called. Items are
/// dispatched highest priority first with at most `max_concurrent` jobs in
/// flight. A failed job is requeued with its priority lowered until it has
/// been retried `max_retries` times, then dropped. Failures that cannot
/// succeed on retry (invalid input, rejected request, wrong dimension) are
/// dropped at once.
pub struct EmbeddingQueue {
    shared: Arc<Shared>,
    worker: std::sync::Mutex<Option<Worker>>,
}

impl EmbeddingQueue {
    pub fn new(handler: Arc<dyn JobHandler>, config: QueueConfig) -> Self {
        let slots = config.max_concurrent.max(1);
        let config = QueueConfig {
            max_concurrent: slots,
            ..config
        };
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(PendingList::default()),
                handler,
                semaphore: Arc::new(Semaphore::new(slots)),
                config,
                wake: Notify::new(),
                idle: Notify::new(),
                processing: AtomicUsize::new(0),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            worker: std::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub async fn enqueue_profile_update(&self, profile: Profile, priority: f64) {
        self.enqueue(QueuePayload::Profile(profile), priority).await;
    }

    pub async fn enqueue_project_update(&self, project: Project, priority: f64) {
        self.enqueue(QueuePayload::Project(project), priority).await;
    }

    async fn enqueue(&self, payload: QueuePayload, priority: f64) {
        let priority = if priority.is_finite() {
            priority
        } else {
            warn!(priority, id = %payload.id(), "Non-finite priority replaced with 0");
            0.0
        };
        debug!(kind = %payload.content_type(), id = %payload.id(), priority, "Queued embedding update");
        {
            let mut pending = self.shared.pending.lock().await;
            pending.push(payload, priority);
            metrics::gauge!(QUEUE_LENGTH).set(pending.len() as f64);
        }
        self.shared.wake.notify_one();
    }

    /// Remove pending jobs for documents owned by `owner_id`.
    pub async fn cancel_owner(&self, owner_id: &str) -> usize {
        let mut pending = self.shared.pending.lock().await;
        let removed = pending.remove_where(|item| item.payload.owner_id() == owner_id);
        metrics::gauge!(QUEUE_LENGTH).set(pending.len() as f64);
        drop(pending);
        self.shared.signal_if_idle().await;
        removed
    }

    /// Pending jobs in dispatch order.
    pub async fn pending(&self) -> Vec<PendingSummary> {
        self.shared.pending.lock().await.summaries()
    }

    pub async fn stats(&self) -> QueueStats {
        let queue_length = self.shared.pending.lock().await.len();
        QueueStats {
            queue_length,
            processing_count: self.shared.processing.load(Ordering::SeqCst),
            max_concurrent: self.shared.config.max_concurrent,
            processed: self.shared.processed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .map(|worker| is_alive(&worker))
            .unwrap_or(false)
    }

    /// Spawn the coordinator task. Calling it while running is a no-op.
    pub fn start(&self) {
        let mut worker = match self.worker.lock() {
            Ok(worker) => worker,
            Err(poisoned) => poisoned.into_inner(),
        };
        if is_alive(&worker) {
            warn!("Embedding queue already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&self.shared).run(shutdown_rx));
        *worker = Some(Worker { shutdown_tx, task });
    }

    /// Stop dispatching and wait for in-flight jobs. Pending items are kept.
    pub async fn stop(&self) {
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(worker) = worker else {
            return;
        };
        let _ = worker.shutdown_tx.send(true);
        if let Err(e) = worker.task.await {
            error!(error = %e, "Embedding queue task failed");
        }
    }

    /// Wait until nothing is pending or in flight.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.is_idle().await {
                return;
            }
            notified.await;
        }
    }
}
