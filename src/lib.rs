//! Dictation Hotkey - push-to-talk dictation for the desktop
//!
//! A global hotkey starts microphone recording (hold to record, or double-tap
//! to toggle), the captured audio is transcribed by a remote speech-to-text
//! API, and the resulting text is pasted into the focused application.
//!
//! This library exports core modules for testing and potential future reuse.

/// Audio capture and level metering
pub mod audio;
/// Configuration management and API credential storage
pub mod config;
/// Input handling (gesture state machine, global key hook)
pub mod input;
/// Text output (clipboard paste)
pub mod output;
/// Presentation seam (tray icon, overlay, settings dialog)
pub mod presenter;
/// Recording session lifecycle
pub mod session;
/// Telemetry and crash logging
pub mod telemetry;
/// Remote transcription client and transcript cleanup
pub mod transcription;
