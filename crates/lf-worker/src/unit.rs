//! Transform unit
//!
//! One OS thread per job. The thread initializes the engine, posts `Ready`,
//! accepts exactly one request, runs the study and process passes and posts
//! the result. Every message is tagged with the job id the unit was spawned
//! for, so the owner can drop anything from a unit it no longer cares about.
//!
//! Termination is destructive and does not wait: the kill flag is raised,
//! the request channel is closed and the thread is detached. A running
//! transform notices the flag at the next block boundary and exits without
//! posting anything further.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::{EngineFactory, EngineSpec, FALLBACK_BLOCK_FRAMES, StretchEngine};
use crate::error::{EngineError, UnitError, UnitResult};
use crate::progress::ProgressThrottle;
use crate::protocol::{Envelope, JobId, JobPhase, TransformRequest, UnitMessage};

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner-side handle to a unit thread
#[derive(Debug)]
pub struct WorkerUnit {
    job_id: JobId,
    request_tx: Option<Sender<TransformRequest>>,
    kill: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerUnit {
    /// Start a unit for `job_id`. Messages arrive on `events`.
    pub fn spawn(
        job_id: JobId,
        factory: Arc<dyn EngineFactory>,
        events: UnboundedSender<Envelope>,
        progress_interval: Duration,
    ) -> UnitResult<Self> {
        let (request_tx, request_rx) = bounded::<TransformRequest>(1);
        let kill = Arc::new(AtomicBool::new(false));

        let runner = UnitRunner {
            job_id,
            factory,
            events,
            kill: kill.clone(),
            progress_interval,
        };

        let handle = thread::Builder::new()
            .name(format!("lf-unit-{job_id}"))
            .spawn(move || runner.run(request_rx))
            .map_err(|e| UnitError::SpawnFailed(e.to_string()))?;

        log::debug!("[Unit {job_id}] Spawned");

        Ok(Self {
            job_id,
            request_tx: Some(request_tx),
            kill,
            handle: Some(handle),
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Hand the unit its single request
    pub fn submit(&mut self, request: TransformRequest) -> UnitResult<()> {
        if self.is_terminated() {
            return Err(UnitError::Terminated);
        }
        let tx = self.request_tx.take().ok_or(UnitError::AlreadySubmitted)?;
        match tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(UnitError::AlreadySubmitted),
            Err(TrySendError::Disconnected(_)) => Err(UnitError::Disconnected),
        }
    }

    pub fn has_request(&self) -> bool {
        self.request_tx.is_none()
    }

    /// Stop the unit and detach its thread
    pub fn terminate(&mut self) {
        if self.kill.swap(true, Ordering::SeqCst) {
            return;
        }
        self.request_tx = None;
        // Detached: the thread exits at its next block boundary
        self.handle = None;
        log::debug!("[Unit {}] Terminated", self.job_id);
    }

    pub fn is_terminated(&self) -> bool {
        self.kill.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerUnit {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// THREAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a transform that was not aborted by an engine error
enum Transform {
    Finished(Vec<Vec<f32>>),
    Abandoned,
}

struct UnitRunner {
    job_id: JobId,
    factory: Arc<dyn EngineFactory>,
    events: UnboundedSender<Envelope>,
    kill: Arc<AtomicBool>,
    progress_interval: Duration,
}

impl UnitRunner {
    fn run(self, request_rx: Receiver<TransformRequest>) {
        let started = Instant::now();
        let init = panic::catch_unwind(AssertUnwindSafe(|| self.factory.initialize()));
        match init {
            Ok(Ok(())) => {
                log::debug!(
                    "[Unit {}] Engine ready in {:?}",
                    self.job_id,
                    started.elapsed()
                );
                if !self.post(UnitMessage::Ready) {
                    return;
                }
            }
            Ok(Err(e)) => {
                log::error!("[Unit {}] Initialization error: {e}", self.job_id);
                self.post(UnitMessage::Error(format!("Failed to initialize engine: {e}")));
                return;
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                log::error!("[Unit {}] Engine panicked during initialization: {reason}", self.job_id);
                self.post(UnitMessage::Error(format!("Failed to initialize engine: {reason}")));
                return;
            }
        }

        // Sender dropped means the owner terminated us before submitting
        let Ok(request) = request_rx.recv() else {
            return;
        };
        if self.killed() {
            return;
        }

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.transform(&request)));
        match outcome {
            Ok(Ok(Transform::Finished(channels))) => {
                log::info!(
                    "[Unit {}] Transformed {} frames ({}) in {:?}",
                    self.job_id,
                    request.frames(),
                    request.key(),
                    started.elapsed()
                );
                self.post(UnitMessage::Output(channels));
            }
            Ok(Ok(Transform::Abandoned)) => {
                log::debug!("[Unit {}] Abandoned mid-transform", self.job_id);
            }
            Ok(Err(e)) => {
                log::error!("[Unit {}] Processing error: {e}", self.job_id);
                self.post(UnitMessage::Error(format!("Audio processing failed: {e}")));
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                log::error!("[Unit {}] Engine panicked: {reason}", self.job_id);
                self.post(UnitMessage::Error(format!("Audio processing failed: {reason}")));
            }
        }
    }

    fn transform(&self, request: &TransformRequest) -> Result<Transform, EngineError> {
        request.validate().map_err(EngineError::Config)?;

        let spec = EngineSpec::for_request(request);
        let mut engine = self.factory.create(&spec)?;

        let frames = request.frames();
        let block = match engine.samples_required() {
            0 => FALLBACK_BLOCK_FRAMES,
            n => n,
        };
        engine.set_expected_input_duration(frames);

        let mut throttle = ProgressThrottle::new(self.progress_interval);

        // Study: 0 – 50%
        if !self.begin_phase(JobPhase::Study, &mut throttle) {
            return Ok(Transform::Abandoned);
        }
        let mut read = 0;
        while read < frames {
            if self.killed() || !self.report(JobPhase::Study, read, frames, &mut throttle) {
                return Ok(Transform::Abandoned);
            }
            let end = (read + block).min(frames);
            let chunk = slice_block(&request.channel_buffers, read, end);
            read = end;
            engine.study(&chunk, read >= frames)?;
        }

        // Process: 50 – 100%
        if !self.begin_phase(JobPhase::Process, &mut throttle) {
            return Ok(Transform::Abandoned);
        }
        let expected = spec.expected_output_frames(frames);
        let mut output: Vec<Vec<f32>> = (0..spec.channels)
            .map(|_| Vec::with_capacity(expected))
            .collect();

        read = 0;
        while read < frames {
            if self.killed() || !self.report(JobPhase::Process, read, frames, &mut throttle) {
                return Ok(Transform::Abandoned);
            }
            let end = (read + block).min(frames);
            let chunk = slice_block(&request.channel_buffers, read, end);
            read = end;
            engine.process(&chunk, read >= frames)?;
            drain(engine.as_mut(), &mut output, block, false);
        }
        drain(engine.as_mut(), &mut output, block, true);

        if self.killed() {
            return Ok(Transform::Abandoned);
        }

        // Output length is fixed by the time ratio, whatever the engine's latency
        for channel in &mut output {
            channel.resize(expected, 0.0);
        }

        if throttle.should_emit(100, Instant::now()) && !self.post(UnitMessage::Progress(100)) {
            return Ok(Transform::Abandoned);
        }

        Ok(Transform::Finished(output))
    }

    /// Post the phase label and its starting percent
    fn begin_phase(&self, phase: JobPhase, throttle: &mut ProgressThrottle) -> bool {
        if self.killed() || !self.post(UnitMessage::Status(phase.status().to_string())) {
            return false;
        }
        let percent = phase.start_percent();
        if throttle.should_emit(percent, Instant::now()) {
            return self.post(UnitMessage::Progress(percent));
        }
        true
    }

    fn report(
        &self,
        phase: JobPhase,
        read: usize,
        frames: usize,
        throttle: &mut ProgressThrottle,
    ) -> bool {
        let percent = phase.overall_percent(read as f64 / frames as f64);
        if throttle.should_emit(percent, Instant::now()) {
            return self.post(UnitMessage::Progress(percent));
        }
        true
    }

    /// Returns false once nobody is listening
    fn post(&self, message: UnitMessage) -> bool {
        self.events.send(Envelope::new(self.job_id, message)).is_ok()
    }

    fn killed(&self) -> bool {
        self.kill.load(Ordering::SeqCst)
    }
}

fn slice_block(channels: &[Vec<f32>], start: usize, end: usize) -> Vec<&[f32]> {
    channels.iter().map(|c| &c[start..end]).collect()
}

/// Move ready output into `output`. Outside the final drain, only whole
/// blocks are taken.
fn drain(engine: &mut dyn StretchEngine, output: &mut [Vec<f32>], block: usize, is_final: bool) {
    loop {
        let available = engine.available();
        if available == 0 || (!is_final && available < block) {
            break;
        }
        let retrieved = engine.retrieve(available.min(block));
        if retrieved.first().is_none_or(Vec::is_empty) {
            break;
        }
        for (out, data) in output.iter_mut().zip(retrieved) {
            out.extend_from_slice(&data);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }

    #[test]
    fn test_slice_block() {
        let channels = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let block = slice_block(&channels, 1, 3);
        assert_eq!(block, vec![&[2.0, 3.0][..], &[5.0, 6.0][..]]);
    }
}
