//! # Autosave Scheduler
//!
//! Coalesces rapid local edits into single debounced saves and bounds the
//! save backlog per document.
//!
//! - Debounce: each `schedule_debounced` call restarts the session's timer;
//!   only the last content within the window reaches the pipeline.
//! - Forced: an explicit Save bypasses the debounce entirely.
//! - Gate: at most one in-flight save per document, with a single queued
//!   slot behind it. A superseding request replaces the queued one, so the
//!   backlog depth never exceeds one. Every submission goes through the
//!   gate, the close-path flush included.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::errors::{SaveError, SaveResult};
use super::pipeline::{SaveOutcome, SavePipeline, SaveRequest};
use crate::observability::{Logger, Severity};

static GENERATION: AtomicU64 = AtomicU64::new(1);

type SaveWaiter = oneshot::Sender<SaveResult<SaveOutcome>>;

struct PendingDebounce {
    generation: u64,
    timer: JoinHandle<()>,
    request: SaveRequest,
}

struct QueuedSave {
    request: SaveRequest,
    waiters: Vec<SaveWaiter>,
}

#[derive(Default)]
struct DocGate {
    in_flight: bool,
    queued: Option<QueuedSave>,
}

/// Per-session debounce timers plus per-document save gates
pub struct AutosaveScheduler {
    inner: Arc<SchedulerCore>,
}

struct SchedulerCore {
    pipeline: Arc<SavePipeline>,
    debounce: Duration,
    pending: StdMutex<HashMap<Uuid, PendingDebounce>>,
    gates: StdMutex<HashMap<Uuid, DocGate>>,
}

impl AutosaveScheduler {
    /// Create a scheduler over the given pipeline
    pub fn new(pipeline: Arc<SavePipeline>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerCore {
                pipeline,
                debounce,
                pending: StdMutex::new(HashMap::new()),
                gates: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// The pipeline this scheduler submits to
    pub fn pipeline(&self) -> &Arc<SavePipeline> {
        &self.inner.pipeline
    }

    /// Restart the session's debounce timer with fresh content
    ///
    /// When the window elapses without a newer call, the latest request is
    /// submitted as a minor save.
    pub fn schedule_debounced(&self, session_id: Uuid, mut request: SaveRequest) {
        request.is_major = false;
        let generation = GENERATION.fetch_add(1, Ordering::SeqCst);

        let core = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(core.debounce).await;
            core.fire(session_id, generation);
        });

        let mut pending = self.inner.lock_pending();
        if let Some(previous) = pending.insert(
            session_id,
            PendingDebounce {
                generation,
                timer,
                request,
            },
        ) {
            previous.timer.abort();
        }
    }

    /// Submit an explicit Save immediately, bypassing the debounce
    ///
    /// Any pending debounced save for the session is cancelled; the forced
    /// content supersedes it.
    pub fn schedule_forced(&self, session_id: Uuid, mut request: SaveRequest) {
        request.is_major = true;
        self.cancel(session_id);
        Arc::clone(&self.inner).submit(request, None);
    }

    /// Drain the session's pending debounce on the close path
    ///
    /// The timer is cancelled and the pending content submitted through the
    /// document's gate as a minor save, awaited to completion. While a save
    /// is in flight the flushed content takes the queued slot, displacing
    /// any stale request parked there; a request queued after the flush
    /// supersedes it in turn, and the waiter resolves with that save's
    /// outcome (last-writer-wins).
    pub async fn flush(&self, session_id: Uuid) -> SaveResult<Option<SaveOutcome>> {
        let Some(entry) = self.inner.take(session_id) else {
            return Ok(None);
        };
        entry.timer.abort();

        let (done_tx, done_rx) = oneshot::channel();
        Arc::clone(&self.inner).submit(entry.request, Some(done_tx));

        match done_rx.await {
            Ok(result) => result.map(Some),
            Err(_) => Err(SaveError::Persistence("save worker dropped".into())),
        }
    }

    /// Drop the session's pending debounce without saving
    pub fn cancel(&self, session_id: Uuid) {
        if let Some(entry) = self.inner.take(session_id) {
            entry.timer.abort();
        }
    }

    /// True while a debounced save is pending for the session
    pub fn has_pending(&self, session_id: Uuid) -> bool {
        self.inner.lock_pending().contains_key(&session_id)
    }
}

impl SchedulerCore {
    fn fire(self: Arc<Self>, session_id: Uuid, generation: u64) {
        let request = {
            let mut pending = self.lock_pending();
            match pending.get(&session_id) {
                Some(entry) if entry.generation == generation => {
                    pending.remove(&session_id).map(|e| e.request)
                }
                // A newer schedule superseded this timer.
                _ => None,
            }
        };

        if let Some(request) = request {
            self.submit(request, None);
        }
    }

    /// Hand a request to the per-document gate
    fn submit(self: Arc<Self>, request: SaveRequest, waiter: Option<SaveWaiter>) {
        let document_id = request.document_id;

        {
            let mut gates = self.lock_gates();
            let gate = gates.entry(document_id).or_default();
            if gate.in_flight {
                // FIFO depth 1: replace the queued content, never stack.
                // Waiters already parked behind the slot carry over to the
                // superseding request.
                let mut waiters = gate
                    .queued
                    .take()
                    .map(|queued| queued.waiters)
                    .unwrap_or_default();
                waiters.extend(waiter);
                gate.queued = Some(QueuedSave { request, waiters });
                return;
            }
            gate.in_flight = true;
        }

        let waiters = waiter.into_iter().collect();
        tokio::spawn(self.run(document_id, request, waiters));
    }

    async fn run(
        self: Arc<Self>,
        document_id: Uuid,
        mut request: SaveRequest,
        mut waiters: Vec<SaveWaiter>,
    ) {
        loop {
            let result = self.pipeline.save(request).await;
            if let Err(e) = &result {
                // Not retried here; the next debounce tick retries naturally.
                Logger::log_stderr(
                    Severity::Warn,
                    "autosave.failed",
                    &[
                        ("document", &document_id.to_string()),
                        ("error", &e.to_string()),
                    ],
                );
            }
            for waiter in waiters.drain(..) {
                let _ = waiter.send(result.clone());
            }

            let next = {
                let mut gates = self.lock_gates();
                let next = gates
                    .get_mut(&document_id)
                    .and_then(|gate| gate.queued.take());
                if next.is_none() {
                    // Idle gate; drop the entry so the map does not grow with
                    // every document ever saved.
                    gates.remove(&document_id);
                }
                next
            };

            match next {
                Some(queued) => {
                    request = queued.request;
                    waiters = queued.waiters;
                }
                None => break,
            }
        }
    }

    fn take(&self, session_id: Uuid) -> Option<PendingDebounce> {
        self.lock_pending().remove(&session_id)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, PendingDebounce>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_gates(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, DocGate>> {
        match self.gates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
