//! Conversation Logger
//!
//! Fire-and-forget persistence of conversation logs. Request paths hand a
//! [`LogJob`] to a bounded MPSC queue and return immediately; a fixed pool of
//! workers drains the queue, extracts token usage and appends the log.
//!
//! Overflow policy: when the queue is full the job is dropped, counted and
//! logged. Submission never blocks and never fails the client request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::accountant::extract_usage;
use crate::routes::metrics::{record_accounting_skipped, record_log_dropped, record_log_persist_failure};
use crate::store::{CallType, LogStore, NewConversationLog, ProviderKind};

/// Configuration for the logger queue and worker pool
#[derive(Debug, Clone, Copy)]
pub struct LoggerConfig {
    /// Jobs held before new ones are dropped
    pub capacity: usize,
    /// Number of concurrent persistence workers
    pub workers: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            workers: 4,
        }
    }
}

/// What is known about a call before its response settles
#[derive(Debug, Clone)]
pub struct PendingLog {
    pub user_id: Uuid,
    pub model_id: Uuid,
    pub connection_id: Uuid,
    pub call_type: CallType,
    pub provider: ProviderKind,
    pub request_payload: Bytes,
}

impl PendingLog {
    /// Complete the log with the settled response
    pub fn finish(self, response_payload: Bytes, account: bool) -> LogJob {
        LogJob {
            pending: self,
            response_payload,
            account,
        }
    }
}

/// One unit of work for the logger
#[derive(Debug, Clone)]
pub struct LogJob {
    pub pending: PendingLog,
    pub response_payload: Bytes,
    /// Whether token usage should be extracted from the response
    pub account: bool,
}

impl LogJob {
    fn into_record(self) -> NewConversationLog {
        let LogJob {
            pending,
            response_payload,
            account,
        } = self;

        let usage = if account {
            let usage = extract_usage(pending.provider, pending.call_type, &response_payload);
            if usage.is_none() {
                debug!(model_id = %pending.model_id, "No usage in response, logging zero tokens");
                record_accounting_skipped(pending.provider.as_str());
            }
            usage.unwrap_or_default()
        } else {
            Default::default()
        };

        NewConversationLog {
            user_id: pending.user_id,
            model_id: pending.model_id,
            connection_id: pending.connection_id,
            request_payload: pending.request_payload,
            response_payload,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            call_type: pending.call_type,
        }
    }
}

/// Bounded, multi-worker conversation logger
pub struct ConversationLogger {
    sender: RwLock<Option<mpsc::Sender<LogJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl ConversationLogger {
    /// Create the logger and spawn its workers
    pub fn new(store: Arc<dyn LogStore>, config: LoggerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        info!(
            capacity = config.capacity,
            workers = config.workers,
            "Starting conversation logger"
        );

        let workers = (0..config.workers.max(1))
            .map(|worker| tokio::spawn(Self::worker(worker, store.clone(), receiver.clone())))
            .collect();

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a job; returns `false` when it was dropped
    pub fn submit(&self, job: LogJob) -> bool {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            self.count_drop(&job, "Conversation logger stopped, dropping log");
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.count_drop(&job, "Conversation log queue full, dropping log");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.count_drop(&job, "Conversation log queue closed, dropping log");
                false
            }
        }
    }

    /// Jobs dropped since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting jobs, drain what is queued and wait for the workers
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Conversation log worker panicked");
            }
        }

        info!(dropped = self.dropped(), "Conversation logger stopped");
    }

    fn count_drop(&self, job: &LogJob, message: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        record_log_dropped();
        warn!(
            user_id = %job.pending.user_id,
            model_id = %job.pending.model_id,
            call_type = job.pending.call_type.as_str(),
            "{}",
            message
        );
    }

    async fn worker(
        worker: usize,
        store: Arc<dyn LogStore>,
        receiver: Arc<Mutex<mpsc::Receiver<LogJob>>>,
    ) {
        loop {
            let job = { receiver.lock().await.recv().await };
            let Some(job) = job else {
                break;
            };

            let record = job.into_record();
            let model_id = record.model_id;
            match store.append_conversation_log(record).await {
                Ok(id) => debug!(worker, log_id = %id, "Conversation log persisted"),
                Err(e) => {
                    record_log_persist_failure();
                    warn!(worker, model_id = %model_id, error = %e, "Failed to persist conversation log");
                }
            }
        }

        debug!(worker, "Conversation log worker exiting");
    }
}
