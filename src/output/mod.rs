//! Delivering transcribed text into the focused application.

/// Clipboard-based paste implementation
pub mod paste;

pub use paste::{ClipboardPaster, PasteError};

/// Text delivery as seen by the session controller.
#[cfg_attr(test, mockall::automock)]
pub trait TextOutput: Send + Sync {
    /// Places `text` into the focused application.
    ///
    /// # Errors
    /// Returns error if the text is empty or clipboard/keystroke glue fails.
    fn paste(&self, text: &str) -> Result<(), PasteError>;
}
