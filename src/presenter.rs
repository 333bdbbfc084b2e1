//! Presentation seam.
//!
//! The tray icon, floating overlay and settings dialog all live behind this
//! trait: the session controller reports state transitions, the UI layer
//! decides how to show them. The default implementation just logs, which is
//! enough for headless runs and tests.

use tracing::{debug, info, trace, warn};

/// State transitions the UI layer consumes.
#[cfg_attr(test, mockall::automock)]
pub trait Presenter: Send + Sync {
    /// Recording has started; show the overlay.
    fn recording_started(&self);

    /// Live input level while recording, `0.0..=1.0`.
    fn level(&self, level: f32);

    /// Recording stopped, transcription in flight; show the thinking state.
    fn processing_started(&self);

    /// Back to idle; hide the overlay.
    fn idle(&self);

    /// A usable API credential is missing; the settings dialog should open.
    fn settings_requested(&self);
}

/// Logs state transitions instead of drawing them.
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn recording_started(&self) {
        info!("recording started");
    }

    fn level(&self, level: f32) {
        trace!(level, "input level");
    }

    fn processing_started(&self) {
        info!("transcribing...");
    }

    fn idle(&self) {
        debug!("idle");
    }

    fn settings_requested(&self) {
        warn!("API credential missing - open settings to configure one");
    }
}
