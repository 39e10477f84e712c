//! lf-state: practice settings and favorites
//!
//! The session publishes a [`PracticeSettings`] snapshot after every change;
//! callers persist it however they like. Favorites bundle an audio file with
//! the settings it was last practised at and live behind [`FavoriteStore`].

mod error;
mod favorite;
mod settings;
mod store;
mod validate;

pub use error::*;
pub use favorite::*;
pub use settings::*;
pub use store::*;
pub use validate::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
