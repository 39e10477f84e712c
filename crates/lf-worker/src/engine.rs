//! Engine seam
//!
//! The pitch/time-stretch engine is opaque to LoopForge. A unit drives it in
//! two passes over the whole input: `study` sees every block once so the
//! engine can plan, then `process` feeds the same blocks again while output
//! is drained with `available`/`retrieve`.

use crate::error::EngineResult;
use crate::protocol::TransformRequest;

/// Block size used when an engine does not state a preference
pub const FALLBACK_BLOCK_FRAMES: usize = 1024;

/// Parameters an engine instance is created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSpec {
    pub channels: usize,
    pub sample_rate: u32,
    /// Frequency multiplier, 2^(semitones / 12)
    pub pitch_scale: f64,
    /// Output length divided by input length
    pub time_ratio: f64,
}

impl EngineSpec {
    pub fn for_request(request: &TransformRequest) -> Self {
        let key = request.key();
        Self {
            channels: request.channel_buffers.len(),
            sample_rate: request.sample_rate,
            pitch_scale: key.pitch_scale(),
            time_ratio: key.time_ratio(),
        }
    }

    /// Output frames for `input_frames` of input
    pub fn expected_output_frames(&self, input_frames: usize) -> usize {
        (input_frames as f64 * self.time_ratio).ceil() as usize
    }
}

/// One configured engine instance, used for exactly one transform
pub trait StretchEngine: Send {
    /// Preferred input block size in frames; 0 means no preference
    fn samples_required(&self) -> usize;

    /// Total input length, announced before the study pass
    fn set_expected_input_duration(&mut self, frames: usize);

    /// Analysis pass over one block. `input` holds one slice per channel.
    fn study(&mut self, input: &[&[f32]], is_final: bool) -> EngineResult<()>;

    /// Synthesis pass over one block
    fn process(&mut self, input: &[&[f32]], is_final: bool) -> EngineResult<()>;

    /// Output frames ready for retrieval
    fn available(&self) -> usize;

    /// Take up to `max_frames` of output, one vector per channel
    fn retrieve(&mut self, max_frames: usize) -> Vec<Vec<f32>>;
}

/// Source of engine instances, shared by every unit
pub trait EngineFactory: Send + Sync + 'static {
    /// One-time setup run on the unit thread before it reports ready.
    /// May be slow (module compilation, table generation).
    fn initialize(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Build an engine configured for `spec`
    fn create(&self, spec: &EngineSpec) -> EngineResult<Box<dyn StretchEngine>>;
}
