//! Playback engine
//!
//! Owns the live buffer and the transport: play, pause, seek, volume, mute
//! and the A/B loop. Position is not read back from the device; it is
//! derived from an anchor:
//!
//! ```text
//! position = anchor_position + (now - anchor_time) × clock_rate
//! ```
//!
//! where `clock_rate` is the tempo of the buffer currently playing (not the
//! one being computed). Pausing freezes the position and clears the anchor
//! time. Every time-dependent call takes `now` explicitly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use lf_core::{Observable, SampleBuffer, TEMPO_DEFAULT};

use crate::error::{PlaybackError, PlaybackResult};
use crate::output::AudioOutput;

/// Full-scale volume
pub const VOLUME_MAX: f64 = 100.0;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// A/B loop markers in seconds of the live buffer. Always `0 <= start < end <= duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

impl LoopRegion {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    fn fits(&self, duration: f64) -> bool {
        self.start >= 0.0 && self.start < self.end && self.end <= duration
    }

    /// Carry the markers from a buffer of `old_duration` onto one of
    /// `new_duration`. A loop ending at the old buffer's end ends at the new
    /// buffer's end; `None` when nothing usable is left.
    fn rescaled(&self, old_duration: f64, new_duration: f64) -> Option<LoopRegion> {
        let ratio = if old_duration > 0.0 {
            new_duration / old_duration
        } else {
            1.0
        };
        // Scaling can land a few ulps past the new end
        let end = if self.end >= old_duration {
            new_duration
        } else {
            (self.end * ratio).min(new_duration)
        };
        let scaled = LoopRegion {
            start: (self.start * ratio).min(new_duration),
            end,
        };
        scaled.fits(new_duration).then_some(scaled)
    }
}

/// What a transport tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing
    Idle,
    /// Position moved forward
    Advanced,
    /// Reached the loop end and restarted at the loop start
    Looped,
    /// Reached the end of the buffer and paused there
    Ended,
}

/// Result of replacing the live buffer
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReport {
    pub old_duration: f64,
    pub new_duration: f64,
    /// Position in the new buffer
    pub position: f64,
    pub was_playing: bool,
    /// Rescaled loop, if one survived
    pub loop_region: Option<LoopRegion>,
    /// A loop existed but did not fit after rescaling
    pub loop_cleared: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

pub struct PlaybackEngine {
    output: Box<dyn AudioOutput>,
    buffer: Option<Arc<SampleBuffer>>,
    clock_rate: f64,
    anchor_position: f64,
    /// Some while playing
    anchor_time: Option<Instant>,

    is_playing: Observable<bool>,
    current_time: Observable<f64>,
    duration: Observable<f64>,
    volume: Observable<f64>,
    is_muted: Observable<bool>,
    loop_region: Observable<Option<LoopRegion>>,
    loop_enabled: Observable<bool>,
}

impl PlaybackEngine {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let mut engine = Self {
            output,
            buffer: None,
            clock_rate: TEMPO_DEFAULT,
            anchor_position: 0.0,
            anchor_time: None,
            is_playing: Observable::new(false),
            current_time: Observable::new(0.0),
            duration: Observable::new(0.0),
            volume: Observable::new(VOLUME_MAX),
            is_muted: Observable::new(false),
            loop_region: Observable::new(None),
            loop_enabled: Observable::new(false),
        };
        engine.apply_gain();
        engine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Buffer
    // ─────────────────────────────────────────────────────────────────────────

    /// Install a freshly decoded track: paused at 0, no loop, clock at 1.0
    pub fn load(&mut self, buffer: Arc<SampleBuffer>) {
        self.output.stop();
        self.duration.set(buffer.duration());
        self.buffer = Some(buffer);
        self.clock_rate = TEMPO_DEFAULT;
        self.anchor_position = 0.0;
        self.anchor_time = None;
        self.is_playing.set_if_changed(false);
        self.current_time.set(0.0);
        self.clear_loop();
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.buffer.as_ref()
    }

    /// Replace the live buffer with one transformed at `tempo`.
    ///
    /// Play state carries over. Position and loop markers scale by
    /// `new_duration / old_duration`; a loop that no longer fits is cleared.
    /// With no live buffer nothing changes.
    pub fn swap_buffer(
        &mut self,
        buffer: Arc<SampleBuffer>,
        tempo: f64,
        now: Instant,
    ) -> PlaybackResult<SwapReport> {
        if self.buffer.is_none() {
            log::warn!("[Playback] Swap requested with no active buffer; ignored");
            return Err(PlaybackError::NoActiveBuffer);
        }

        let old_duration = self.duration();
        let new_duration = buffer.duration();
        let was_playing = self.is_playing();
        let position = self.position_at(now);

        if was_playing {
            self.output.stop();
        }

        let ratio = if old_duration > 0.0 {
            new_duration / old_duration
        } else {
            1.0
        };
        let new_position = (position * ratio).clamp(0.0, new_duration);

        let old_loop = self.loop_region.get();
        let new_loop = old_loop.and_then(|region| region.rescaled(old_duration, new_duration));
        let loop_cleared = old_loop.is_some() && new_loop.is_none();

        self.buffer = Some(buffer.clone());
        self.clock_rate = tempo;
        self.duration.set(new_duration);
        self.anchor_position = new_position;
        self.current_time.set(new_position);
        self.loop_region.set(new_loop);
        if loop_cleared {
            self.loop_enabled.set(false);
            log::warn!("[Playback] Loop no longer fits after swap; cleared");
        }

        if was_playing {
            self.anchor_time = Some(now);
            self.output.start(buffer, new_position);
        }

        log::debug!(
            "[Playback] Swapped buffer {:.2}s → {:.2}s, position {:.2}s → {:.2}s",
            old_duration,
            new_duration,
            position,
            new_position
        );

        Ok(SwapReport {
            old_duration,
            new_duration,
            position: new_position,
            was_playing,
            loop_region: new_loop,
            loop_cleared,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    pub fn play(&mut self, now: Instant) -> PlaybackResult<()> {
        let Some(buffer) = self.buffer.clone() else {
            log::warn!("[Playback] Play with no buffer loaded");
            return Err(PlaybackError::NoActiveBuffer);
        };
        if self.is_playing() {
            return Ok(());
        }

        // From the end, start over
        if self.anchor_position >= self.duration() {
            self.anchor_position = 0.0;
        }

        self.anchor_time = Some(now);
        self.output.start(buffer, self.anchor_position);
        self.is_playing.set(true);
        self.current_time.set(self.anchor_position);
        Ok(())
    }

    pub fn pause(&mut self, now: Instant) {
        if !self.is_playing() {
            return;
        }
        let position = self.position_at(now);
        self.anchor_position = position;
        self.anchor_time = None;
        self.output.stop();
        self.is_playing.set(false);
        self.current_time.set(position);
    }

    /// Jump to `seconds`, clamped to the buffer. Keeps playing if playing.
    pub fn seek(&mut self, seconds: f64, now: Instant) -> PlaybackResult<()> {
        let Some(buffer) = self.buffer.clone() else {
            return Err(PlaybackError::NoActiveBuffer);
        };
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration())
        } else {
            0.0
        };

        self.anchor_position = target;
        if self.is_playing() {
            self.anchor_time = Some(now);
            self.output.start(buffer, target);
        }
        self.current_time.set(target);
        Ok(())
    }

    /// Advance the published position and enforce loop and end-of-track
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }
        let position = self.raw_position(now);

        if self.loop_enabled.get() {
            if let Some(region) = self.loop_region.get() {
                if position >= region.end {
                    // Re-anchor rather than subtract, so error does not accumulate
                    self.anchor_position = region.start;
                    self.anchor_time = Some(now);
                    if let Some(buffer) = self.buffer.clone() {
                        self.output.start(buffer, region.start);
                    }
                    self.current_time.set(region.start);
                    return TickOutcome::Looped;
                }
            }
        }

        let duration = self.duration();
        if position >= duration {
            self.anchor_position = duration;
            self.anchor_time = None;
            self.output.stop();
            self.is_playing.set(false);
            self.current_time.set(duration);
            log::debug!("[Playback] Reached end of track");
            return TickOutcome::Ended;
        }

        self.current_time.set(position);
        TickOutcome::Advanced
    }

    /// Position at `now`, within `[0, duration]`
    pub fn position_at(&self, now: Instant) -> f64 {
        self.raw_position(now).clamp(0.0, self.duration().max(0.0))
    }

    fn raw_position(&self, now: Instant) -> f64 {
        match self.anchor_time {
            Some(anchor) => {
                self.anchor_position
                    + now.saturating_duration_since(anchor).as_secs_f64() * self.clock_rate
            }
            None => self.anchor_position,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Level
    // ─────────────────────────────────────────────────────────────────────────

    /// 0–100; non-finite input is ignored
    pub fn set_volume(&mut self, volume: f64) {
        if !volume.is_finite() {
            return;
        }
        if self.volume.set_if_changed(volume.clamp(0.0, VOLUME_MAX)) {
            self.apply_gain();
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = !self.is_muted.get();
        self.set_muted(muted);
        muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.is_muted.set_if_changed(muted) {
            self.apply_gain();
        }
    }

    /// Linear gain sent to the output
    pub fn gain(&self) -> f32 {
        if self.is_muted.get() {
            0.0
        } else {
            (self.volume.get() / VOLUME_MAX) as f32
        }
    }

    fn apply_gain(&mut self) {
        let gain = self.gain();
        self.output.set_gain(gain);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Markers are clamped to the buffer; `start >= end` after clamping is
    /// rejected and leaves the current loop untouched
    pub fn set_loop_points(&mut self, start: f64, end: f64) -> PlaybackResult<()> {
        if self.buffer.is_none() {
            return Err(PlaybackError::NoActiveBuffer);
        }
        let duration = self.duration();
        let start = if start.is_finite() { start.clamp(0.0, duration) } else { 0.0 };
        let end = if end.is_finite() { end.clamp(0.0, duration) } else { duration };

        if start >= end {
            log::warn!("[Playback] Rejected loop [{start:.3}, {end:.3}]");
            return Err(PlaybackError::InvalidLoop { start, end });
        }

        self.loop_region.set(Some(LoopRegion { start, end }));
        Ok(())
    }

    pub fn toggle_loop(&mut self) -> bool {
        let enabled = !self.loop_enabled.get();
        self.loop_enabled.set(enabled);
        enabled
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled.set_if_changed(enabled);
    }

    pub fn clear_loop(&mut self) {
        self.loop_region.set_if_changed(None);
        self.loop_enabled.set_if_changed(false);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_playing(&self) -> bool {
        self.is_playing.get()
    }

    pub fn duration(&self) -> f64 {
        self.duration.get()
    }

    pub fn volume(&self) -> f64 {
        self.volume.get()
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted.get()
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.loop_region.get()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled.get()
    }

    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    pub fn subscribe_is_playing(&self) -> watch::Receiver<bool> {
        self.is_playing.subscribe()
    }

    pub fn subscribe_current_time(&self) -> watch::Receiver<f64> {
        self.current_time.subscribe()
    }

    pub fn subscribe_duration(&self) -> watch::Receiver<f64> {
        self.duration.subscribe()
    }

    pub fn subscribe_volume(&self) -> watch::Receiver<f64> {
        self.volume.subscribe()
    }

    pub fn subscribe_is_muted(&self) -> watch::Receiver<bool> {
        self.is_muted.subscribe()
    }

    pub fn subscribe_loop_region(&self) -> watch::Receiver<Option<LoopRegion>> {
        self.loop_region.subscribe()
    }

    pub fn subscribe_loop_enabled(&self) -> watch::Receiver<bool> {
        self.loop_enabled.subscribe()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.output.stop();
    }
}
