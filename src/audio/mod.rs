//! Microphone capture behind a narrow interface.

/// CPAL-backed recorder implementation
pub mod capture;

pub use capture::CpalRecorder;

/// Callback invoked from the audio thread with the current input level
/// (normalized to `0.0..=1.0`), for the overlay visualizer.
pub type LevelCallback = Box<dyn Fn(f32) + Send + Sync + 'static>;

/// A finished recording: 16kHz mono samples plus the loudest RMS chunk
/// observed while recording (used by the quiet-skip policy).
#[derive(Debug, Clone)]
pub struct Capture {
    /// Captured samples, 16kHz mono f32
    pub samples: Vec<f32>,
    /// Peak per-chunk RMS over the whole recording (unscaled)
    pub peak_rms: f32,
}

/// Audio capture lifecycle as seen by the session controller.
#[cfg_attr(test, mockall::automock)]
pub trait AudioRecorder: Send + Sync {
    /// Starts capturing from the default input device.
    ///
    /// `on_level` receives the live input level until the recording stops.
    ///
    /// # Errors
    /// Returns error if the audio stream cannot be resumed.
    fn start(&self, on_level: LevelCallback) -> anyhow::Result<()>;

    /// Stops capturing and returns the recorded audio.
    ///
    /// # Errors
    /// Returns error if the audio stream cannot be paused.
    fn stop(&self) -> anyhow::Result<Capture>;
}
