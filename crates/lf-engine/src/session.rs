//! Session control loop
//!
//! A [`Session`] owns the parameter store, debounce scheduler, transform
//! cache, orchestrator and playback engine, and runs them on one tokio task.
//! The outside world talks to it through a cloneable [`SessionHandle`]
//! (commands over an mpsc channel) and watches it through [`SessionState`].
//!
//! Wakeup sources polled by `select!`:
//! - a transport command
//! - a message from the transform unit
//! - the debounce deadline
//! - the job watchdog deadline
//! - the playback tick

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use lf_core::{Observable, SampleBuffer, TransformKey};
use lf_state::PracticeSettings;
use lf_worker::{EngineFactory, Envelope};

use crate::cache::TransformCache;
use crate::config::PipelineConfig;
use crate::debounce::Debouncer;
use crate::error::{PlaybackResult, SessionError, SessionResult};
use crate::orchestrator::{OrchestratorEvent, WorkerOrchestrator, WorkerState};
use crate::output::AudioOutput;
use crate::params::ParameterStore;
use crate::playback::{LoopRegion, PlaybackEngine, TickOutcome};

type Reply<T> = oneshot::Sender<T>;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

enum Command {
    Load(Arc<SampleBuffer>),
    SetPitch(i32),
    SetPlaybackRate(f64),
    Play(Reply<PlaybackResult<()>>),
    Pause,
    Seek { seconds: f64, reply: Reply<PlaybackResult<()>> },
    SetVolume(f64),
    ToggleMute(Reply<bool>),
    SetMuted(bool),
    SetLoopPoints { start: f64, end: f64, reply: Reply<PlaybackResult<()>> },
    ToggleLoop(Reply<bool>),
    ClearLoop,
    ClearCache,
    ApplySettings(PracticeSettings),
    Snapshot(Reply<PracticeSettings>),
    CachedKeys(Reply<Vec<TransformKey>>),
    Shutdown,
}

impl Command {
    /// Commands after which the auto-save feed is republished
    fn changes_state(&self) -> bool {
        !matches!(self, Self::Snapshot(_) | Self::CachedKeys(_) | Self::Shutdown)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Load(_) => "Load",
            Self::SetPitch(_) => "SetPitch",
            Self::SetPlaybackRate(_) => "SetPlaybackRate",
            Self::Play(_) => "Play",
            Self::Pause => "Pause",
            Self::Seek { .. } => "Seek",
            Self::SetVolume(_) => "SetVolume",
            Self::ToggleMute(_) => "ToggleMute",
            Self::SetMuted(_) => "SetMuted",
            Self::SetLoopPoints { .. } => "SetLoopPoints",
            Self::ToggleLoop(_) => "ToggleLoop",
            Self::ClearLoop => "ClearLoop",
            Self::ClearCache => "ClearCache",
            Self::ApplySettings(_) => "ApplySettings",
            Self::Snapshot(_) => "Snapshot",
            Self::CachedKeys(_) => "CachedKeys",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of everything a session publishes
#[derive(Debug, Clone)]
pub struct SessionState {
    pub pitch: watch::Receiver<i32>,
    pub tempo: watch::Receiver<f64>,

    pub is_playing: watch::Receiver<bool>,
    pub current_time: watch::Receiver<f64>,
    pub duration: watch::Receiver<f64>,
    pub volume: watch::Receiver<f64>,
    pub is_muted: watch::Receiver<bool>,
    pub loop_region: watch::Receiver<Option<LoopRegion>>,
    pub loop_enabled: watch::Receiver<bool>,

    pub worker_state: watch::Receiver<WorkerState>,
    pub is_processing: watch::Receiver<bool>,
    pub progress: watch::Receiver<u8>,
    pub status: watch::Receiver<String>,
    pub error: watch::Receiver<Option<String>>,

    /// Key of the buffer currently playing
    pub active_key: watch::Receiver<TransformKey>,
    /// Auto-save feed
    pub settings: watch::Receiver<PracticeSettings>,
}

impl SessionState {
    pub fn has_error(&self) -> bool {
        self.error.borrow().is_some()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.borrow().clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Transport surface of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: SessionState,
}

impl SessionHandle {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    async fn send(&self, command: Command) -> SessionResult<()> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }

    async fn ask<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> SessionResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Make `buffer` the original track
    pub async fn load(&self, buffer: SampleBuffer) -> SessionResult<()> {
        self.send(Command::Load(Arc::new(buffer))).await
    }

    /// Decode a WAV file on the blocking pool and load it
    pub async fn load_wav(&self, path: impl AsRef<Path>) -> SessionResult<()> {
        let path = path.as_ref().to_path_buf();
        let buffer = tokio::task::spawn_blocking(move || lf_core::load_wav(&path))
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))??;
        self.load(buffer).await
    }

    pub async fn set_pitch(&self, semitones: i32) -> SessionResult<()> {
        self.send(Command::SetPitch(semitones)).await
    }

    pub async fn set_playback_rate(&self, ratio: f64) -> SessionResult<()> {
        self.send(Command::SetPlaybackRate(ratio)).await
    }

    pub async fn play(&self) -> SessionResult<()> {
        Ok(self.ask(Command::Play).await??)
    }

    pub async fn pause(&self) -> SessionResult<()> {
        self.send(Command::Pause).await
    }

    pub async fn seek_to(&self, seconds: f64) -> SessionResult<()> {
        Ok(self.ask(|reply| Command::Seek { seconds, reply }).await??)
    }

    pub async fn set_volume(&self, volume: f64) -> SessionResult<()> {
        self.send(Command::SetVolume(volume)).await
    }

    /// Returns the new muted state
    pub async fn toggle_mute(&self) -> SessionResult<bool> {
        self.ask(Command::ToggleMute).await
    }

    pub async fn set_muted(&self, muted: bool) -> SessionResult<()> {
        self.send(Command::SetMuted(muted)).await
    }

    pub async fn set_loop_points(&self, start: f64, end: f64) -> SessionResult<()> {
        Ok(self.ask(|reply| Command::SetLoopPoints { start, end, reply }).await??)
    }

    /// Returns whether looping is now enabled
    pub async fn toggle_loop(&self) -> SessionResult<bool> {
        self.ask(Command::ToggleLoop).await
    }

    pub async fn clear_loop(&self) -> SessionResult<()> {
        self.send(Command::ClearLoop).await
    }

    /// Drop every transformed buffer, keeping the original
    pub async fn clear_cache(&self) -> SessionResult<()> {
        self.send(Command::ClearCache).await
    }

    /// Restore a saved practice state
    pub async fn apply_settings(&self, settings: PracticeSettings) -> SessionResult<()> {
        self.send(Command::ApplySettings(settings)).await
    }

    /// Current practice state, ordered after every command sent before it
    pub async fn practice_settings(&self) -> SessionResult<PracticeSettings> {
        self.ask(Command::Snapshot).await
    }

    pub async fn cached_keys(&self) -> SessionResult<Vec<TransformKey>> {
        self.ask(Command::CachedKeys).await
    }

    pub async fn shutdown(&self) -> SessionResult<()> {
        self.send(Command::Shutdown).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Loop and position waiting for the buffer of `key` to go live
#[derive(Debug, Clone)]
struct PendingRestore {
    key: TransformKey,
    position: f64,
    loop_region: Option<(f64, f64)>,
    loop_enabled: bool,
}

impl PendingRestore {
    fn from_settings(settings: &PracticeSettings) -> Self {
        Self {
            key: settings.key(),
            position: settings.current_time,
            loop_region: settings.loop_region(),
            loop_enabled: settings.loop_enabled,
        }
    }
}

enum Event {
    Command(Command),
    Unit(Envelope),
    DebounceDue,
    WatchdogDue,
    Tick,
    Closed,
}

pub struct Session {
    config: PipelineConfig,
    commands: mpsc::Receiver<Command>,

    params: ParameterStore,
    debouncer: Debouncer,
    cache: TransformCache,
    orchestrator: WorkerOrchestrator,
    playback: PlaybackEngine,

    original: Option<Arc<SampleBuffer>>,
    active_key: Observable<TransformKey>,
    pending_restore: Option<PendingRestore>,
    settings: Observable<PracticeSettings>,
}

impl Session {
    /// Start a session on the current tokio runtime
    pub fn spawn(
        config: PipelineConfig,
        factory: Arc<dyn EngineFactory>,
        output: Box<dyn AudioOutput>,
    ) -> SessionResult<(SessionHandle, JoinHandle<()>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.command_capacity);
        let session = Self {
            commands: rx,
            params: ParameterStore::new(),
            debouncer: Debouncer::new(config.debounce()),
            cache: TransformCache::new(),
            orchestrator: WorkerOrchestrator::new(factory, config.job_timeout(), config.progress_interval()),
            playback: PlaybackEngine::new(output),
            original: None,
            active_key: Observable::new(TransformKey::IDENTITY),
            pending_restore: None,
            settings: Observable::new(PracticeSettings::default()),
            config,
        };

        let state = SessionState {
            pitch: session.params.subscribe_pitch(),
            tempo: session.params.subscribe_tempo(),
            is_playing: session.playback.subscribe_is_playing(),
            current_time: session.playback.subscribe_current_time(),
            duration: session.playback.subscribe_duration(),
            volume: session.playback.subscribe_volume(),
            is_muted: session.playback.subscribe_is_muted(),
            loop_region: session.playback.subscribe_loop_region(),
            loop_enabled: session.playback.subscribe_loop_enabled(),
            worker_state: session.orchestrator.subscribe_state(),
            is_processing: session.orchestrator.subscribe_is_processing(),
            progress: session.orchestrator.subscribe_progress(),
            status: session.orchestrator.subscribe_status(),
            error: session.orchestrator.subscribe_error(),
            active_key: session.active_key.subscribe(),
            settings: session.settings.subscribe(),
        };

        let task = tokio::spawn(session.run());
        log::info!("[Session] Started");
        Ok((SessionHandle { commands: tx, state }, task))
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let debounce_at = self.debouncer.deadline();
            let watchdog_at = self.orchestrator.deadline();

            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::Closed,
                },
                Some(envelope) = self.orchestrator.recv() => Event::Unit(envelope),
                _ = sleep_until_opt(debounce_at) => Event::DebounceDue,
                _ = sleep_until_opt(watchdog_at) => Event::WatchdogDue,
                _ = ticker.tick() => Event::Tick,
            };

            let now = Instant::now();
            match event {
                Event::Command(Command::Shutdown) | Event::Closed => break,
                Event::Command(command) => {
                    let publish = command.changes_state();
                    self.handle_command(command, now);
                    if publish {
                        self.publish_settings(now);
                    }
                }
                Event::Unit(envelope) => {
                    if let Some(event) = self.orchestrator.handle(envelope, now) {
                        self.on_job_finished(event, now);
                    }
                }
                Event::DebounceDue => {
                    if self.debouncer.take_if_due(now) {
                        self.start_transform(now);
                    }
                }
                Event::WatchdogDue => {
                    if let Some(event) = self.orchestrator.check_timeout(now) {
                        self.on_job_finished(event, now);
                    }
                }
                Event::Tick => {
                    if self.playback.tick(now) == TickOutcome::Ended {
                        self.publish_settings(now);
                    }
                }
            }
        }

        self.orchestrator.shutdown();
        self.playback.pause(Instant::now());
        log::info!("[Session] Stopped");
    }

    fn handle_command(&mut self, command: Command, now: Instant) {
        log::trace!("[Session] {command:?}");
        match command {
            Command::Load(buffer) => self.load(buffer, now),
            Command::SetPitch(semitones) => {
                if self.params.set_pitch(semitones) {
                    self.on_params_changed(now);
                }
            }
            Command::SetPlaybackRate(ratio) => {
                if self.params.set_playback_rate(ratio) {
                    self.on_params_changed(now);
                }
            }
            Command::Play(reply) => {
                let _ = reply.send(self.playback.play(now));
            }
            Command::Pause => self.playback.pause(now),
            Command::Seek { seconds, reply } => {
                let _ = reply.send(self.playback.seek(seconds, now));
            }
            Command::SetVolume(volume) => self.playback.set_volume(volume),
            Command::ToggleMute(reply) => {
                let _ = reply.send(self.playback.toggle_mute());
            }
            Command::SetMuted(muted) => self.playback.set_muted(muted),
            Command::SetLoopPoints { start, end, reply } => {
                let _ = reply.send(self.playback.set_loop_points(start, end));
            }
            Command::ToggleLoop(reply) => {
                let _ = reply.send(self.playback.toggle_loop());
            }
            Command::ClearLoop => self.playback.clear_loop(),
            Command::ClearCache => self.clear_cache(),
            Command::ApplySettings(settings) => self.apply_settings(settings, now),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot(now));
            }
            Command::CachedKeys(reply) => {
                let _ = reply.send(self.cache.keys());
            }
            Command::Shutdown => {}
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────

    fn load(&mut self, buffer: Arc<SampleBuffer>, now: Instant) {
        self.orchestrator.cancel();
        self.debouncer.cancel();
        self.pending_restore = None;

        self.cache.clear();
        self.cache.seed_identity(buffer.clone());
        self.playback.load(buffer.clone());
        self.active_key.set(TransformKey::IDENTITY);

        log::info!(
            "[Session] Loaded {:.2}s, {} ch @ {} Hz",
            buffer.duration(),
            buffer.channel_count(),
            buffer.sample_rate()
        );
        self.original = Some(buffer);

        if !self.params.key().is_identity() {
            self.debouncer.arm(now);
        }
    }

    fn on_params_changed(&mut self, now: Instant) {
        self.orchestrator.cancel();
        self.debouncer.arm(now);
        log::debug!("[Session] Parameters now {}", self.params.key());
    }

    /// Debounce fired: make the settled key live, computing it if needed
    fn start_transform(&mut self, now: Instant) {
        let Some(original) = self.original.clone() else {
            log::debug!("[Session] No track loaded; nothing to transform");
            return;
        };
        let key = self.params.key();

        if key == self.active_key.get() {
            log::debug!("[Session] {key} already live");
            return;
        }
        if let Some(buffer) = self.cache.get(&key) {
            log::debug!("[Session] Cache hit for {key}");
            self.install(key, buffer, now);
            return;
        }
        if self.orchestrator.current_key() == Some(key) {
            return;
        }
        if let Err(e) = self.orchestrator.request(key, &original, now) {
            log::error!("[Session] Could not start transform for {key}: {e}");
        }
    }

    fn on_job_finished(&mut self, event: OrchestratorEvent, now: Instant) {
        match event {
            OrchestratorEvent::Completed { job_id, key, buffer } => {
                let buffer = Arc::new(buffer);
                self.cache.put(key, buffer.clone());
                if key == self.params.key() {
                    self.install(key, buffer, now);
                    self.publish_settings(now);
                } else {
                    log::debug!("[Session] Job {job_id} result for {key} cached but not wanted");
                }
            }
            OrchestratorEvent::Failed { job_id, key, error } => {
                log::warn!("[Session] Job {job_id} for {key} produced nothing: {error}");
            }
        }
    }

    fn install(&mut self, key: TransformKey, buffer: Arc<SampleBuffer>, now: Instant) {
        match self.playback.swap_buffer(buffer, key.tempo_ratio(), now) {
            Ok(report) => {
                self.active_key.set(key);
                log::info!(
                    "[Session] Now playing {key} ({:.2}s at {:.2}s)",
                    report.new_duration,
                    report.position
                );
                if let Some(restore) = self.pending_restore.take_if(|r| r.key == key) {
                    self.restore(restore, now);
                }
            }
            Err(e) => log::warn!("[Session] Buffer for {key} not installed: {e}"),
        }
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
        if let Some(original) = self.original.clone() {
            self.cache.seed_identity(original);
        }
        log::debug!("[Session] Cache cleared");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Practice settings
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_settings(&mut self, settings: PracticeSettings, now: Instant) {
        let settings = settings.normalized();
        let key = settings.key();

        let pitch_changed = self.params.set_pitch(settings.pitch);
        let tempo_changed = self.params.set_playback_rate(settings.playback_rate);
        self.playback.set_volume(settings.volume);
        self.playback.set_muted(settings.is_muted);

        let restore = PendingRestore::from_settings(&settings);
        if self.playback.has_buffer() && key == self.active_key.get() {
            self.pending_restore = None;
            self.restore(restore, now);
            return;
        }

        self.pending_restore = Some(restore);
        let in_flight = self.debouncer.is_armed() || self.orchestrator.current_key() == Some(key);
        if pitch_changed || tempo_changed || !in_flight {
            self.on_params_changed(now);
        }
    }

    fn restore(&mut self, restore: PendingRestore, now: Instant) {
        match restore.loop_region {
            Some((start, end)) => {
                if let Err(e) = self.playback.set_loop_points(start, end) {
                    log::warn!("[Session] Saved loop not restored: {e}");
                    self.playback.clear_loop();
                }
            }
            None => self.playback.clear_loop(),
        }
        let enabled = restore.loop_enabled && self.playback.loop_region().is_some();
        self.playback.set_loop_enabled(enabled);

        if let Err(e) = self.playback.seek(restore.position, now) {
            log::warn!("[Session] Saved position not restored: {e}");
        }
    }

    fn snapshot(&self, now: Instant) -> PracticeSettings {
        let mut settings = PracticeSettings {
            pitch: self.params.pitch(),
            playback_rate: self.params.tempo(),
            current_time: self.playback.position_at(now),
            loop_start: None,
            loop_end: None,
            loop_enabled: self.playback.loop_enabled(),
            volume: self.playback.volume(),
            is_muted: self.playback.is_muted(),
        };

        match &self.pending_restore {
            Some(restore) => {
                settings.current_time = restore.position;
                settings.loop_start = restore.loop_region.map(|(start, _)| start);
                settings.loop_end = restore.loop_region.map(|(_, end)| end);
                settings.loop_enabled = restore.loop_enabled;
            }
            None => {
                if let Some(region) = self.playback.loop_region() {
                    settings.loop_start = Some(region.start);
                    settings.loop_end = Some(region.end);
                }
            }
        }
        settings
    }

    fn publish_settings(&self, now: Instant) {
        self.settings.set_if_changed(self.snapshot(now));
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NullOutput;
    use lf_worker::{EngineError, EngineResult, EngineSpec, StretchEngine};

    struct Unavailable;

    impl EngineFactory for Unavailable {
        fn initialize(&self) -> EngineResult<()> {
            Err(EngineError::Init("no engine in this build".into()))
        }

        fn create(&self, _spec: &EngineSpec) -> EngineResult<Box<dyn StretchEngine>> {
            Err(EngineError::Init("no engine in this build".into()))
        }
    }

    fn spawn() -> (SessionHandle, JoinHandle<()>) {
        Session::spawn(
            PipelineConfig::default().with_debounce_ms(10),
            Arc::new(Unavailable),
            Box::new(NullOutput::new()),
        )
        .unwrap()
    }

    fn track(seconds: usize) -> SampleBuffer {
        SampleBuffer::silent(1, seconds * 100, 100).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        // Rejected before anything is spawned, so no runtime is needed
        let result = Session::spawn(
            PipelineConfig::default().with_tick_interval_ms(0),
            Arc::new(Unavailable),
            Box::new(NullOutput::new()),
        );
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[tokio::test]
    async fn test_transport_without_track() {
        let (handle, _task) = spawn();
        assert!(matches!(handle.play().await, Err(SessionError::Playback(_))));
        assert!(matches!(handle.set_loop_points(1.0, 2.0).await, Err(SessionError::Playback(_))));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_commands() {
        let (handle, _task) = spawn();
        handle.load(track(10)).await.unwrap();
        handle.set_volume(40.0).await.unwrap();
        assert!(handle.toggle_mute().await.unwrap());
        handle.set_loop_points(2.0, 4.0).await.unwrap();
        assert!(handle.toggle_loop().await.unwrap());
        handle.seek_to(3.0).await.unwrap();

        let settings = handle.practice_settings().await.unwrap();
        assert_eq!(settings.volume, 40.0);
        assert!(settings.is_muted);
        assert_eq!(settings.loop_start, Some(2.0));
        assert_eq!(settings.loop_end, Some(4.0));
        assert!(settings.loop_enabled);
        assert_eq!(settings.current_time, 3.0);
        assert_eq!(*handle.state().settings.borrow(), settings);
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let (handle, task) = spawn();
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.pause().await, Err(SessionError::Closed)));
    }
}
