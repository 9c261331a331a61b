pub mod auth;
pub mod notify;
pub mod outbox;
pub mod remote;
pub mod replay;

pub use auth::{require_live_session, AuthError, AuthProvider, BlockReason, Blocked, CachedSession};
pub use notify::{ObserverRegistry, QueueObserver};
pub use outbox::{
    OutboxConfig, OutboxQueue, FEEDBACK_QUEUE_CAP, FEEDBACK_QUEUE_KEY, INVENTORY_QUEUE_KEY,
};
pub use remote::{ConnectivitySignal, RemoteError, RemoteStore};
pub use replay::{ReplayRecord, FEEDBACK_TABLE, PRODUCTS_TABLE};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use tillsync_core::QueuedMutation;

#[derive(Debug, Clone, Copy, Default)]
pub struct FlushOptions {
    /// Suppress the user-facing flush summary; queue-change notifications
    /// still fire so badge counts stay live.
    pub silent: bool,
}

/// Result of one flush attempt. Failures are encoded here and in the retained
/// queue, never raised: a background sync must not crash a foreground action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushOutcome {
    pub processed: usize,
    pub failed: usize,
    pub blocked: Option<BlockReason>,
}

/// Consumer-level filter: records it declines are retained unchanged without
/// being attempted (e.g. "only replay records owned by the active identity").
pub type RecordFilter<R> = Box<dyn Fn(&QueuedMutation<R>) -> bool>;

/// Drains the outbox against the remote store: FIFO replay, per-record
/// failure isolation, authenticated-gated, write-back of survivors.
///
/// Callers must serialize flushes externally; overlapping invocations are a
/// misuse, detected and refused rather than interleaved.
pub struct SyncEngine<R> {
    outbox: OutboxQueue<R>,
    auth: Box<dyn AuthProvider>,
    remote: Box<dyn RemoteStore>,
    connectivity: Box<dyn ConnectivitySignal>,
    observers: ObserverRegistry,
    record_filter: Option<RecordFilter<R>>,
    flush_in_flight: bool,
}

impl<R> SyncEngine<R>
where
    R: ReplayRecord + Serialize + DeserializeOwned + Clone,
{
    pub fn new(
        outbox: OutboxQueue<R>,
        auth: Box<dyn AuthProvider>,
        remote: Box<dyn RemoteStore>,
        connectivity: Box<dyn ConnectivitySignal>,
        observers: ObserverRegistry,
    ) -> Self {
        Self {
            outbox,
            auth,
            remote,
            connectivity,
            observers,
            record_filter: None,
            flush_in_flight: false,
        }
    }

    pub fn with_record_filter(mut self, filter: RecordFilter<R>) -> Self {
        self.record_filter = Some(filter);
        self
    }

    pub fn enqueue(&mut self, record: R) {
        self.outbox.enqueue(record);
    }

    pub fn count(&mut self) -> usize {
        self.outbox.count()
    }

    pub fn current_queue(&mut self) -> Vec<QueuedMutation<R>> {
        self.outbox.current_queue()
    }

    pub fn failed_records(&mut self) -> Vec<QueuedMutation<R>> {
        self.outbox.failed_records()
    }

    /// One attempt to drain the queue. Never returns an error; the outcome and
    /// the retained queue carry everything the caller needs.
    pub fn flush(&mut self, options: FlushOptions) -> FlushOutcome {
        if self.flush_in_flight {
            warn!("flush invoked while another flush is in progress; refusing to interleave");
            return FlushOutcome::default();
        }
        self.flush_in_flight = true;
        let outcome = self.flush_serialized(options);
        self.flush_in_flight = false;
        outcome
    }

    fn flush_serialized(&mut self, options: FlushOptions) -> FlushOutcome {
        // 1. Connectivity is a fast precondition, not an error.
        if !self.connectivity.is_online() {
            debug!(queue = %self.outbox.storage_key(), "offline; queue untouched");
            return FlushOutcome::default();
        }

        // 2. One consistent snapshot for the whole flush.
        let snapshot = self.outbox.current_queue();
        if snapshot.is_empty() {
            return FlushOutcome::default();
        }

        // 3. Gate on a live remote session before the first remote write.
        //    Blocked: annotate every record with the reason so observers can
        //    see why nothing is syncing, and leave the set intact.
        if let Err(blocked) = require_live_session(self.auth.as_ref()) {
            debug!(
                queue = %self.outbox.storage_key(),
                reason = blocked.reason.as_str(),
                "flush blocked by authentication gate"
            );
            let mut annotated = snapshot;
            for mutation in &mut annotated {
                mutation.mark_failed(blocked.message.as_str());
            }
            let failed = annotated.len();
            self.outbox.replace_all(annotated);
            return FlushOutcome {
                processed: 0,
                failed,
                blocked: Some(blocked.reason),
            };
        }

        // 4. Replay in insertion order. Failures are independent per record:
        //    one rejected row does not hold up the rest.
        let mut processed = 0;
        let mut retained = Vec::new();
        for mut mutation in snapshot {
            if let Some(filter) = &self.record_filter {
                if !filter(&mutation) {
                    retained.push(mutation);
                    continue;
                }
            }
            match mutation.record.replay(self.remote.as_mut()) {
                Ok(()) => {
                    debug!(record = %mutation.record.describe(), "replayed");
                    processed += 1;
                }
                Err(e) => {
                    debug!(record = %mutation.record.describe(), error = %e, "replay failed; retained");
                    mutation.mark_failed(e.to_string());
                    retained.push(mutation);
                }
            }
        }

        // 5. Re-persist survivors under the scope active right now; this also
        //    fires the unconditional queue-change notification.
        let failed = retained.len();
        self.outbox.replace_all(retained);

        let outcome = FlushOutcome {
            processed,
            failed,
            blocked: None,
        };

        // 6. User-facing summary only when the caller asked for one.
        if !options.silent {
            self.observers.notify_flush_completed(&outcome);
        }

        outcome
    }
}
