//! Audio output seam
//!
//! The playback engine owns transport state; the device behind it only
//! needs to start a buffer at an offset, stop, and apply gain.

use std::sync::Arc;

use lf_core::SampleBuffer;

pub trait AudioOutput: Send {
    /// Begin rendering `buffer` from `offset` seconds, replacing whatever
    /// was playing
    fn start(&mut self, buffer: Arc<SampleBuffer>, offset: f64);

    fn stop(&mut self);

    /// Linear gain, 0.0–1.0
    fn set_gain(&mut self, gain: f32);
}

/// Headless output: accepts everything, renders nothing
#[derive(Debug, Default)]
pub struct NullOutput {
    running: bool,
    gain: f32,
}

impl NullOutput {
    pub fn new() -> Self {
        Self {
            running: false,
            gain: 1.0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl AudioOutput for NullOutput {
    fn start(&mut self, buffer: Arc<SampleBuffer>, offset: f64) {
        log::trace!("[Output] start at {offset:.3}s of {:.3}s", buffer.duration());
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}
