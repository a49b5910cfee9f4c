//! Player for the University Radio York MP3 streams.
//!
//! The heart of the crate is [`engine::PlaybackEngine`], which streams,
//! decodes and plays on a background thread behind a small thread-safe
//! control surface. [`facade::StreamPlayerFacade`] is what front ends talk to.

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod facade;
pub mod output;
pub mod script;
pub mod source;
pub mod streams;
pub mod utils;
pub mod webcam;

pub use engine::{EngineConfig, PlaybackEngine, RunState, StopOutcome};
pub use error::{PlayerError, PlayerResult};
pub use facade::{PlayerStatus, StreamPlayer, StreamPlayerFacade};
pub use streams::Quality;
