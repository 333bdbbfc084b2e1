use arboard::Clipboard;
use enigo::{Enigo, Key, KeyboardControllable};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use super::TextOutput;

/// How long to wait between setting the clipboard and sending the paste
/// keystroke, so the clipboard contents have settled system-wide.
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(100);

/// Delay before restoring the previous clipboard contents.
const CLIPBOARD_RESTORE_DELAY: Duration = Duration::from_millis(150);

/// Text delivery errors
#[derive(Debug, Error)]
pub enum PasteError {
    /// Text is empty
    #[error("text is empty")]
    EmptyText,

    /// Clipboard access failed
    #[error("clipboard access failed: {0}")]
    Clipboard(String),
}

/// Generate preview of text for logging (pure, testable)
///
/// Truncates long text, respecting UTF-8 char boundaries.
#[must_use]
pub fn text_preview(text: &str) -> String {
    const MAX_CHARS: usize = 40;
    if text.chars().count() <= MAX_CHARS {
        return text.to_owned();
    }
    let mut preview: String = text.chars().take(MAX_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Pastes via the clipboard: set text, send Ctrl+V, restore what was there.
pub struct ClipboardPaster;

impl TextOutput for ClipboardPaster {
    fn paste(&self, text: &str) -> Result<(), PasteError> {
        if text.is_empty() {
            error!("attempted to paste empty text");
            return Err(PasteError::EmptyText);
        }

        info!(
            text_len = text.len(),
            text_preview = %text_preview(text),
            "pasting transcription"
        );

        let mut clipboard = Clipboard::new().map_err(|e| PasteError::Clipboard(e.to_string()))?;
        let previous = clipboard.get_text().ok();
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| PasteError::Clipboard(e.to_string()))?;

        // Give the clipboard time to propagate before the keystroke.
        std::thread::sleep(CLIPBOARD_SETTLE);
        send_paste_keystroke();

        if let Some(previous) = previous {
            std::thread::spawn(move || {
                std::thread::sleep(CLIPBOARD_RESTORE_DELAY);
                if let Ok(mut clipboard) = Clipboard::new() {
                    let _ = clipboard.set_text(previous);
                }
            });
        }

        debug!("paste keystroke sent");
        Ok(())
    }
}

fn send_paste_keystroke() {
    let mut enigo = Enigo::new();
    enigo.key_down(Key::Control);
    enigo.key_click(Key::Layout('v'));
    enigo.key_up(Key::Control);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_rejected() {
        let result = ClipboardPaster.paste("");
        assert!(matches!(result, Err(PasteError::EmptyText)));
    }

    #[test]
    fn preview_short_text_unchanged() {
        assert_eq!(text_preview("hello"), "hello");
        assert_eq!(text_preview(""), "");
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "a".repeat(100);
        let preview = text_preview(&long);
        assert_eq!(preview.chars().count(), 43);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn preview_respects_multibyte_boundaries() {
        let long = "あ".repeat(60);
        let preview = text_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 43);
    }

    #[test]
    #[ignore = "requires a desktop session with clipboard access"]
    fn paste_simple_text() {
        assert!(ClipboardPaster.paste("hello").is_ok());
    }
}
