//! Immutable planar sample buffer
//!
//! The original decoded track and every transform result are `SampleBuffer`s.
//! Once built they are never mutated: the cache and the playback engine hold
//! `Arc<SampleBuffer>` and replace the pointer instead of the contents.

use crate::error::{CoreError, CoreResult};

// ═══════════════════════════════════════════════════════════════════════════════
// SAMPLE BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

/// Planar multi-channel f32 audio with a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build a buffer from per-channel sample arrays.
    ///
    /// Requires at least one channel, equal channel lengths and a non-zero
    /// sample rate.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> CoreResult<Self> {
        if sample_rate == 0 {
            return Err(CoreError::InvalidSampleRate(sample_rate));
        }
        let Some(first) = channels.first() else {
            return Err(CoreError::InvalidBuffer("no channels".to_string()));
        };

        let expected = first.len();
        for (channel, data) in channels.iter().enumerate().skip(1) {
            if data.len() != expected {
                return Err(CoreError::ChannelMismatch {
                    channel,
                    expected,
                    actual: data.len(),
                });
            }
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Silent buffer of the given shape
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> CoreResult<Self> {
        Self::new(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    /// Deinterleave `samples` into `channel_count` planes
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> CoreResult<Self> {
        if channel_count == 0 {
            return Err(CoreError::InvalidBuffer("no channels".to_string()));
        }
        if samples.len() % channel_count != 0 {
            return Err(CoreError::InvalidBuffer(format!(
                "{} interleaved samples do not divide into {} channels",
                samples.len(),
                channel_count
            )));
        }

        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (plane, &sample) in channels.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }

        Self::new(channels, sample_rate)
    }

    /// Number of channels
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// One channel's samples
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channel planes
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Give the planes back (used when a copy is moved into a worker request)
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Memory held by the sample data
    pub fn size_bytes(&self) -> usize {
        self.channels.len() * self.frames() * std::mem::size_of::<f32>()
    }

    /// Peak absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .map(|s| s.abs())
            .fold(0.0, f32::max)
    }
}
