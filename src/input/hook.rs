use anyhow::{anyhow, Result};
use rdev::{Event, EventType, Key};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Raw input events surfaced to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// The configured hotkey changed state
    Target {
        /// true on key-down, false on key-up
        pressed: bool,
    },
    /// Esc went down; cancel an in-progress recording
    CancelRequested,
    /// Some other key went down (interference tracking)
    OtherKeyDown,
}

/// Hook supervision as seen by the session controller's watchdog.
#[cfg_attr(test, mockall::automock)]
pub trait InputHook: Send + Sync {
    /// Re-arms the OS-level hook after a suspend/resume gap.
    ///
    /// # Errors
    /// Returns error if the hook cannot be re-registered.
    fn reinstall(&self) -> Result<()>;
}

/// rdev-backed hook handle.
pub struct RdevHook;

impl InputHook for RdevHook {
    fn reinstall(&self) -> Result<()> {
        // The low-level keyboard hook survives sleep; what gets lost across
        // the gap are key transitions, which the caller handles by resetting
        // the gesture machine. Nothing to re-register here.
        info!("input hook checked after resume");
        Ok(())
    }
}

/// Spawns the blocking rdev listener on its own thread.
///
/// Key transitions are classified against `target` and forwarded to the main
/// loop over `tx`. Key-ups of non-target keys are not interesting and are
/// dropped at the source.
///
/// # Errors
/// Returns error if the listener thread cannot be spawned.
pub fn spawn_listener(target: Key, tx: mpsc::Sender<HookEvent>) -> Result<()> {
    std::thread::Builder::new()
        .name("input-hook".into())
        .spawn(move || {
            let callback = move |event: Event| {
                let hook_event = match event.event_type {
                    EventType::KeyPress(key) if key == target => {
                        Some(HookEvent::Target { pressed: true })
                    }
                    EventType::KeyRelease(key) if key == target => {
                        Some(HookEvent::Target { pressed: false })
                    }
                    EventType::KeyPress(Key::Escape) => Some(HookEvent::CancelRequested),
                    EventType::KeyPress(_) => Some(HookEvent::OtherKeyDown),
                    _ => None,
                };
                if let Some(ev) = hook_event {
                    // The main loop going away is the only send failure; the
                    // process is exiting then, so drop the event.
                    let _ = tx.blocking_send(ev);
                }
            };
            if let Err(e) = rdev::listen(callback) {
                error!("global key listener failed: {:?}", e);
            }
        })
        .map_err(|e| anyhow!("failed to spawn input hook thread: {e}"))?;
    Ok(())
}

/// Parses a configured key name into an rdev key.
///
/// # Errors
/// Returns error for names with no mapping.
pub fn parse_key_name(name: &str) -> Result<Key> {
    let key = match name {
        "A" => Key::KeyA,
        "B" => Key::KeyB,
        "C" => Key::KeyC,
        "D" => Key::KeyD,
        "E" => Key::KeyE,
        "F" => Key::KeyF,
        "G" => Key::KeyG,
        "H" => Key::KeyH,
        "I" => Key::KeyI,
        "J" => Key::KeyJ,
        "K" => Key::KeyK,
        "L" => Key::KeyL,
        "M" => Key::KeyM,
        "N" => Key::KeyN,
        "O" => Key::KeyO,
        "P" => Key::KeyP,
        "Q" => Key::KeyQ,
        "R" => Key::KeyR,
        "S" => Key::KeyS,
        "T" => Key::KeyT,
        "U" => Key::KeyU,
        "V" => Key::KeyV,
        "W" => Key::KeyW,
        "X" => Key::KeyX,
        "Y" => Key::KeyY,
        "Z" => Key::KeyZ,
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        "Space" => Key::Space,
        "CapsLock" => Key::CapsLock,
        "ScrollLock" => Key::ScrollLock,
        "Pause" => Key::Pause,
        "LeftShift" | "ShiftLeft" => Key::ShiftLeft,
        "RightShift" | "ShiftRight" => Key::ShiftRight,
        "LeftCtrl" | "ControlLeft" => Key::ControlLeft,
        "RightCtrl" | "ControlRight" => Key::ControlRight,
        "Alt" => Key::Alt,
        _ => return Err(anyhow!("unsupported hotkey: {}", name)),
    };
    Ok(key)
}
