//! Recording session lifecycle.

/// Session controller: debounce, stuck-state recovery, transcription pipeline
pub mod controller;

pub use controller::{SessionController, SessionPolicy};
