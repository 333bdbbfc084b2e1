//! Input handling: gesture classification and the global key hook.

/// Hold / double-tap gesture state machine
pub mod gesture;
/// Global keyboard hook (rdev) and key name parsing
pub mod hook;

pub use gesture::{GestureIntent, GestureMachine, GestureSettings, RecordTrigger};
pub use hook::{HookEvent, InputHook, RdevHook};
