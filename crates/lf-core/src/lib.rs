//! lf-core: Shared types for LoopForge
//!
//! Everything the transform pipeline and the playback side agree on:
//! - `SampleBuffer`: immutable planar audio, shared as `Arc`
//! - `TransformKey`: the clamped (pitch, tempo) pair used as cache index
//! - `Observable<T>`: owned value with change broadcast
//! - WAV decoding for the original buffer

mod buffer;
mod decode;
mod error;
mod key;
mod observable;

pub use buffer::*;
pub use decode::*;
pub use error::*;
pub use key::*;
pub use observable::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
