//! Remote speech-to-text behind a narrow interface.

/// Remote transcription API client
pub mod client;
/// Hallucination and filler cleanup
pub mod post_process;

pub use client::{RemoteTranscriber, TranscribeError};

use crate::audio::Capture;

/// Transcription as seen by the session controller.
///
/// Blocking by design: the controller runs it on a blocking task, mirroring
/// how the rest of the lifecycle keeps slow work off the event loop.
#[cfg_attr(test, mockall::automock)]
pub trait Transcriber: Send + Sync {
    /// Transcribes a finished recording into cleaned-up text.
    ///
    /// An empty string means the recording had no usable speech.
    ///
    /// # Errors
    /// Returns error if the credential is missing or the API call fails.
    fn transcribe(&self, capture: &Capture) -> Result<String, TranscribeError>;
}
