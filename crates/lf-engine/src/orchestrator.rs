//! Worker orchestrator
//!
//! Drives one transform unit per job and turns its message stream into
//! state the presentation layer can watch.
//!
//! ```text
//! Uninitialized ──request──► Initializing ──Ready──► Idle ──dispatch──► Busy
//!                                 │                                      │
//!                                 ▼                                      ├─Output───► Idle
//!                               Error ◄──────────────────────────────────┼─Error────► Error
//!                                                                        ├─cancel()─► Cancelled
//!                                                                        └─watchdog─► TimedOut
//! ```
//!
//! Only messages tagged with the current job id are honoured. Cancel,
//! timeout, failure and completion all clear the current job, so whatever a
//! torn-down unit still manages to send is dropped on arrival.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::watch;
use tokio::time::Instant;

use lf_core::{Observable, SampleBuffer, TransformKey};
use lf_worker::{EngineFactory, Envelope, JobId, TransformRequest, UnitMessage, WorkerUnit};

use crate::error::{TransformError, TransformResult};

/// Status shown while a fresh unit spins up
pub const STATUS_STARTING: &str = "Starting...";
/// Status after a successful job
pub const STATUS_COMPLETE: &str = "Complete";
/// Status after cancellation
pub const STATUS_CANCELLED: &str = "Cancelled";

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Initializing,
    Idle,
    Busy,
    Error,
    Cancelled,
    TimedOut,
}

impl WorkerState {
    /// States in which a job occupies the unit
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing | Self::Busy)
    }
}

/// Terminal outcome of a job
#[derive(Debug)]
pub enum OrchestratorEvent {
    Completed {
        job_id: JobId,
        key: TransformKey,
        buffer: SampleBuffer,
    },
    Failed {
        job_id: JobId,
        key: TransformKey,
        error: TransformError,
    },
}

/// The job the orchestrator currently answers to
#[derive(Debug)]
struct ActiveJob {
    id: JobId,
    key: TransformKey,
    sample_rate: u32,
    /// Held back until the unit reports ready
    pending: Option<TransformRequest>,
    deadline: Instant,
    started: Instant,
}

impl ActiveJob {
    fn dispatched(&self) -> bool {
        self.pending.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct WorkerOrchestrator {
    factory: Arc<dyn EngineFactory>,
    job_timeout: Duration,
    progress_interval: Duration,

    events_tx: UnboundedSender<Envelope>,
    events_rx: UnboundedReceiver<Envelope>,

    unit: Option<WorkerUnit>,
    current: Option<ActiveJob>,
    next_job_id: JobId,

    state: Observable<WorkerState>,
    is_processing: Observable<bool>,
    progress: Observable<u8>,
    status: Observable<String>,
    error: Observable<Option<String>>,
}

impl WorkerOrchestrator {
    pub fn new(factory: Arc<dyn EngineFactory>, job_timeout: Duration, progress_interval: Duration) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            factory,
            job_timeout,
            progress_interval,
            events_tx,
            events_rx,
            unit: None,
            current: None,
            next_job_id: 1,
            state: Observable::new(WorkerState::Uninitialized),
            is_processing: Observable::new(false),
            progress: Observable::new(0),
            status: Observable::new(String::new()),
            error: Observable::new(None),
        }
    }

    /// Start a job for `key` over `input`. Any job in flight is cancelled
    /// first and the previous unit is discarded.
    pub fn request(&mut self, key: TransformKey, input: &SampleBuffer, now: Instant) -> TransformResult<JobId> {
        self.cancel();
        self.unit = None;

        let job_id = self.next_job_id;
        self.next_job_id += 1;

        self.state.set(WorkerState::Initializing);
        self.is_processing.set_if_changed(true);
        self.progress.set(0);
        self.status.set(STATUS_STARTING.to_string());
        self.error.set_if_changed(None);

        let unit = match WorkerUnit::spawn(
            job_id,
            self.factory.clone(),
            self.events_tx.clone(),
            self.progress_interval,
        ) {
            Ok(unit) => unit,
            Err(e) => {
                log::error!("[Orchestrator] Job {job_id}: {e}");
                self.enter_error(e.to_string());
                return Err(TransformError::Unit(e));
            }
        };

        log::info!("[Orchestrator] Job {job_id} requested for {key}");

        self.unit = Some(unit);
        self.current = Some(ActiveJob {
            id: job_id,
            key,
            sample_rate: input.sample_rate(),
            pending: Some(TransformRequest::new(input, key)),
            deadline: now + self.job_timeout,
            started: now,
        });
        Ok(job_id)
    }

    /// Abort the current job and destroy its unit. Returns the aborted id.
    pub fn cancel(&mut self) -> Option<JobId> {
        let job = self.current.take()?;
        self.teardown_unit();

        self.state.set(WorkerState::Cancelled);
        self.is_processing.set_if_changed(false);
        self.status.set(STATUS_CANCELLED.to_string());

        log::info!("[Orchestrator] Job {} cancelled ({})", job.id, job.key);
        Some(job.id)
    }

    /// Apply one unit message. Returns an event when the job finishes.
    pub fn handle(&mut self, envelope: Envelope, now: Instant) -> Option<OrchestratorEvent> {
        let Envelope { job_id, message } = envelope;

        let Some(job) = self.current.as_mut().filter(|job| job.id == job_id) else {
            log::trace!("[Orchestrator] Dropped stale message from job {job_id}");
            return None;
        };

        match message {
            UnitMessage::Ready => {
                let request = job.pending.take()?;
                self.state.set(WorkerState::Idle);
                let submitted = match self.unit.as_mut() {
                    Some(unit) => unit.submit(request),
                    None => Err(lf_worker::UnitError::Terminated),
                };
                match submitted {
                    Ok(()) => {
                        self.state.set(WorkerState::Busy);
                        log::debug!("[Orchestrator] Job {job_id} dispatched");
                        None
                    }
                    Err(e) => {
                        let job = self.current.take()?;
                        Some(self.fail(job, TransformError::Unit(e)))
                    }
                }
            }
            UnitMessage::Status(status) => {
                self.status.set_if_changed(status);
                None
            }
            UnitMessage::Progress(percent) => {
                let percent = percent.min(100);
                self.progress.update(|current| {
                    if percent > *current {
                        *current = percent;
                        true
                    } else {
                        false
                    }
                });
                None
            }
            UnitMessage::Error(message) => {
                let error = if job.dispatched() {
                    TransformError::Processing(message)
                } else {
                    TransformError::Initialization(message)
                };
                let job = self.current.take()?;
                Some(self.fail(job, error))
            }
            UnitMessage::Output(channels) => {
                let job = self.current.take()?;
                match SampleBuffer::new(channels, job.sample_rate) {
                    Ok(buffer) => Some(self.complete(job, buffer, now)),
                    Err(e) => Some(self.fail(job, TransformError::Processing(e.to_string()))),
                }
            }
        }
    }

    /// Fire the watchdog if the current job is past its deadline
    pub fn check_timeout(&mut self, now: Instant) -> Option<OrchestratorEvent> {
        let deadline = self.current.as_ref()?.deadline;
        if now < deadline {
            return None;
        }
        let job = self.current.take()?;
        self.teardown_unit();

        let message = format!(
            "Processing timed out after {}s",
            self.job_timeout.as_secs_f64()
        );
        log::error!("[Orchestrator] Job {} ({}): {message}", job.id, job.key);

        self.state.set(WorkerState::TimedOut);
        self.is_processing.set_if_changed(false);
        self.error.set(Some(message));

        Some(OrchestratorEvent::Failed {
            job_id: job.id,
            key: job.key,
            error: TransformError::Timeout(self.job_timeout),
        })
    }

    /// Watchdog deadline of the current job
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|job| job.deadline)
    }

    /// Next message from any unit, current or stale
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.events_rx.recv().await
    }

    /// Cancel anything in flight and release the unit
    pub fn shutdown(&mut self) {
        self.cancel();
        self.teardown_unit();
        log::debug!("[Orchestrator] Shut down");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Finish `job`, already taken out of `current`
    fn complete(&mut self, job: ActiveJob, buffer: SampleBuffer, now: Instant) -> OrchestratorEvent {
        let ActiveJob {
            id: job_id,
            key,
            started,
            ..
        } = job;

        self.state.set(WorkerState::Idle);
        self.is_processing.set_if_changed(false);
        self.progress.set(100);
        self.status.set(STATUS_COMPLETE.to_string());

        log::info!(
            "[Orchestrator] Job {job_id} complete ({key}, {:.2}s output) in {:?}",
            buffer.duration(),
            now.saturating_duration_since(started)
        );

        OrchestratorEvent::Completed { job_id, key, buffer }
    }

    fn fail(&mut self, job: ActiveJob, error: TransformError) -> OrchestratorEvent {
        let ActiveJob { id: job_id, key, .. } = job;
        self.teardown_unit();

        log::error!("[Orchestrator] Job {job_id} ({key}) failed: {error}");
        self.enter_error(error.to_string());

        OrchestratorEvent::Failed { job_id, key, error }
    }

    fn enter_error(&mut self, message: String) {
        self.state.set(WorkerState::Error);
        self.is_processing.set_if_changed(false);
        self.error.set(Some(message));
    }

    fn teardown_unit(&mut self) {
        if let Some(mut unit) = self.unit.take() {
            unit.terminate();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.get()
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub fn status(&self) -> String {
        self.status.get()
    }

    pub fn error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current.as_ref().map(|job| job.id)
    }

    pub fn current_key(&self) -> Option<TransformKey> {
        self.current.as_ref().map(|job| job.key)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn subscribe_is_processing(&self) -> watch::Receiver<bool> {
        self.is_processing.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }
}

impl Drop for WorkerOrchestrator {
    fn drop(&mut self) {
        self.teardown_unit();
    }
}
