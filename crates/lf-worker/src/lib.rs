//! LF-Worker — Background Transform Unit
//!
//! Runs the opaque pitch/time-stretch engine away from the control task.
//! The unit and its owner share no memory: sample arrays are moved in with
//! the request and moved back out with the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   TransformRequest    ┌───────────────────────────┐
//! │  orchestrator        │ ────────────────────► │  unit thread              │
//! │  (control task)      │   (crossbeam, once)   │                           │
//! │                      │                       │  initialize() → Ready     │
//! │                      │ ◄──────────────────── │  study   blocks  0 – 50%  │
//! │                      │   Envelope{job_id,    │  process blocks 50 – 100% │
//! │                      │   UnitMessage}        │  Output                   │
//! └──────────────────────┘   (tokio mpsc)        └───────────────────────────┘
//! ```
//!
//! The engine itself is reached through [`EngineFactory`] and
//! [`StretchEngine`]; this crate only drives it.

mod engine;
mod error;
mod progress;
mod protocol;
mod unit;

pub use engine::*;
pub use error::*;
pub use progress::*;
pub use protocol::*;
pub use unit::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
