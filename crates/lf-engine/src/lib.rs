//! LF-Engine — Audio Transformation Pipeline
//!
//! Turns pitch/tempo requests into transformed sample buffers and keeps the
//! live playback buffer in step with them.
//!
//! ## Flow
//!
//! ```text
//! SessionHandle ──► ParameterStore ──► Debouncer ──► TransformCache ──hit──┐
//!                                                        │ miss            │
//!                                                        ▼                 ▼
//!                                              WorkerOrchestrator ──► PlaybackEngine
//!                                              (one unit per job)     (buffer swap)
//! ```
//!
//! Everything runs on a single control task ([`Session`]); the only other
//! thread is the transform unit doing the DSP work.

mod cache;
mod config;
mod debounce;
mod error;
mod orchestrator;
mod output;
mod params;
mod playback;
mod session;

pub use cache::*;
pub use config::*;
pub use debounce::*;
pub use error::*;
pub use orchestrator::*;
pub use output::*;
pub use params::*;
pub use playback::*;
pub use session::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
