//! Hotkey gesture classification.
//!
//! Raw key transitions come in from the global hook; what comes out are
//! recording intents. Two gestures share one key: holding it past the hold
//! threshold records while held (push-to-talk), and two quick taps toggle
//! recording on or off. Pressing any other key while the hotkey is down marks
//! the press as interference (the user is typing a shortcut chord, not
//! dictating) and suppresses both classifications.
//!
//! The machine is pure: it never reads the clock or arms timers itself.
//! Callers pass `now` into time-sensitive entry points and are responsible
//! for scheduling the hold timer a [`GestureMachine::target_key_down`] call
//! may request, then reporting back via [`GestureMachine::hold_timer_fired`].

use std::time::{Duration, Instant};
use tracing::debug;

/// How the machine decided to start or stop a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTrigger {
    /// Hotkey held past the hold threshold; releasing it stops.
    Hold,
    /// Two taps within the double-tap window; another double-tap stops.
    DoubleTap,
}

/// High-level intent emitted by the gesture machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureIntent {
    /// Begin a recording session.
    Start(RecordTrigger),
    /// End the current recording session and transcribe.
    Stop(RecordTrigger),
}

/// Token for a pending hold timer.
///
/// Returned by [`GestureMachine::target_key_down`] when a timer must be
/// armed for [`GestureSettings::hold_threshold`]. The generation ties the
/// firing back to the press that requested it; a [`GestureMachine::reset`]
/// invalidates all outstanding tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldTimer {
    generation: u64,
}

/// Gesture timing knobs.
#[derive(Debug, Clone, Copy)]
pub struct GestureSettings {
    /// How long the hotkey must stay down before hold-to-record kicks in.
    pub hold_threshold: Duration,
    /// Maximum gap between two releases that still counts as a double-tap.
    pub double_tap_window: Duration,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            hold_threshold: Duration::from_millis(300),
            double_tap_window: Duration::from_millis(400),
        }
    }
}

/// Classifies raw hotkey transitions into hold / double-tap intents.
#[derive(Debug)]
pub struct GestureMachine {
    settings: GestureSettings,
    key_held: bool,
    toggled: bool,
    interference: bool,
    timer_pending: bool,
    timer_generation: u64,
    last_release_at: Option<Instant>,
    /// Optimistic view of the session state. Updated as intents are emitted
    /// and re-synced to the controller's truth via [`Self::sync_recording`]
    /// (the controller may reject an intent, e.g. while busy processing).
    recording: bool,
}

impl GestureMachine {
    /// Creates a machine with the given timing settings.
    #[must_use]
    pub const fn new(settings: GestureSettings) -> Self {
        Self {
            settings,
            key_held: false,
            toggled: false,
            interference: false,
            timer_pending: false,
            timer_generation: 0,
            last_release_at: None,
            recording: false,
        }
    }

    /// Duration the caller must wait before delivering a requested timer.
    #[must_use]
    pub const fn hold_threshold(&self) -> Duration {
        self.settings.hold_threshold
    }

    /// Hotkey went down.
    ///
    /// Returns a timer token when a hold timer must be armed. OS auto-repeat
    /// events (key-down while already held) are ignored.
    pub fn target_key_down(&mut self) -> Option<HoldTimer> {
        if self.key_held {
            return None;
        }
        self.key_held = true;
        self.interference = false;

        if self.timer_pending {
            // A timer from the previous press is still in flight; its firing
            // will observe the current held state, so don't arm a second one.
            return None;
        }
        self.timer_pending = true;
        self.timer_generation += 1;
        Some(HoldTimer {
            generation: self.timer_generation,
        })
    }

    /// A key other than the hotkey went down.
    pub fn other_key_down(&mut self) {
        if self.key_held {
            debug!("interference while hotkey held");
            self.interference = true;
        }
    }

    /// A previously requested hold timer elapsed.
    pub fn hold_timer_fired(&mut self, timer: HoldTimer) -> Option<GestureIntent> {
        if !self.timer_pending || timer.generation != self.timer_generation {
            return None;
        }
        self.timer_pending = false;

        if self.key_held && !self.interference && !self.recording {
            debug!("hold threshold reached");
            self.toggled = false;
            self.recording = true;
            return Some(GestureIntent::Start(RecordTrigger::Hold));
        }
        None
    }

    /// Hotkey went up.
    ///
    /// May emit more than one intent: releasing a hold always stops the
    /// recording, and a clean release inside the double-tap window then runs
    /// the toggle logic on top of that.
    pub fn target_key_up(&mut self, now: Instant) -> Vec<GestureIntent> {
        let mut intents = Vec::new();
        self.key_held = false;

        if self.recording && !self.toggled {
            debug!("hold released");
            self.recording = false;
            intents.push(GestureIntent::Stop(RecordTrigger::Hold));
        }

        if !self.interference {
            let tapped = self
                .last_release_at
                .is_some_and(|prev| now.duration_since(prev) < self.settings.double_tap_window);
            if tapped {
                if let Some(intent) = self.double_tap() {
                    intents.push(intent);
                }
                // Consume the release so a triple tap does not chain.
                self.last_release_at = None;
            } else {
                self.last_release_at = Some(now);
            }
        }

        intents
    }

    fn double_tap(&mut self) -> Option<GestureIntent> {
        if self.toggled {
            debug!("double-tap: toggled off");
            self.toggled = false;
            if self.recording {
                self.recording = false;
                return Some(GestureIntent::Stop(RecordTrigger::DoubleTap));
            }
            None
        } else if self.recording {
            None
        } else {
            debug!("double-tap: toggled on");
            self.toggled = true;
            self.recording = true;
            Some(GestureIntent::Start(RecordTrigger::DoubleTap))
        }
    }

    /// Pushes the controller's authoritative session state into the machine.
    ///
    /// Covers every path where recording ends outside a gesture: cancel,
    /// quiet-skip, stuck-state reset, or an intent the controller rejected.
    pub fn sync_recording(&mut self, recording: bool) {
        self.recording = recording;
        if !recording {
            // A toggle latch without a live recording is meaningless.
            self.toggled = false;
        }
    }

    /// Clears all transient state and invalidates pending timers.
    ///
    /// Used after a suspend/resume gap, when key-up transitions may have been
    /// swallowed and `key_held` can no longer be trusted.
    pub fn reset(&mut self) {
        self.key_held = false;
        self.toggled = false;
        self.interference = false;
        self.timer_pending = false;
        self.timer_generation += 1;
        self.last_release_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn machine() -> GestureMachine {
        GestureMachine::new(GestureSettings::default())
    }

    #[test]
    fn hold_records_while_held() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.target_key_down().unwrap();
        assert_eq!(
            m.hold_timer_fired(timer),
            Some(GestureIntent::Start(RecordTrigger::Hold))
        );
        assert_eq!(
            m.target_key_up(t0 + ms(900)),
            vec![GestureIntent::Stop(RecordTrigger::Hold)]
        );
    }

    #[test]
    fn quick_tap_emits_nothing() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.target_key_down().unwrap();
        assert!(m.target_key_up(t0 + ms(100)).is_empty());
        // Timer fires after the key already went up.
        assert_eq!(m.hold_timer_fired(timer), None);
    }

    #[test]
    fn double_tap_toggles_on() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.target_key_down().unwrap();
        assert!(m.target_key_up(t0).is_empty());

        // Second press reuses the in-flight timer; no new one is armed.
        assert_eq!(m.target_key_down(), None);
        assert_eq!(
            m.target_key_up(t0 + ms(200)),
            vec![GestureIntent::Start(RecordTrigger::DoubleTap)]
        );

        // The stale timer firing afterwards must not double-start.
        assert_eq!(m.hold_timer_fired(timer), None);
    }

    #[test]
    fn double_tap_toggles_off() {
        let mut m = machine();
        let t0 = Instant::now();

        // Toggle on.
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0);
        let _ = m.target_key_down();
        assert_eq!(
            m.target_key_up(t0 + ms(200)),
            vec![GestureIntent::Start(RecordTrigger::DoubleTap)]
        );

        // Toggle off well past the window of the consumed release.
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0 + ms(1000));
        let _ = m.target_key_down();
        assert_eq!(
            m.target_key_up(t0 + ms(1200)),
            vec![GestureIntent::Stop(RecordTrigger::DoubleTap)]
        );
    }

    #[test]
    fn slow_second_tap_does_not_toggle() {
        let mut m = machine();
        let t0 = Instant::now();

        let _ = m.target_key_down();
        let _ = m.target_key_up(t0);
        let _ = m.target_key_down();
        assert!(m.target_key_up(t0 + ms(600)).is_empty());
    }

    #[test]
    fn triple_tap_does_not_chain() {
        let mut m = machine();
        let t0 = Instant::now();

        let _ = m.target_key_down();
        let _ = m.target_key_up(t0);
        let _ = m.target_key_down();
        // Second release: double-tap, starts toggle recording.
        assert_eq!(
            m.target_key_up(t0 + ms(200)),
            vec![GestureIntent::Start(RecordTrigger::DoubleTap)]
        );
        // Third release 150ms later: the second release was consumed, so this
        // is treated as a fresh first tap, not another double-tap.
        let _ = m.target_key_down();
        assert!(m.target_key_up(t0 + ms(350)).is_empty());
    }

    #[test]
    fn interference_suppresses_hold() {
        let mut m = machine();

        let timer = m.target_key_down().unwrap();
        m.other_key_down();
        assert_eq!(m.hold_timer_fired(timer), None);
    }

    #[test]
    fn interference_suppresses_double_tap() {
        let mut m = machine();
        let t0 = Instant::now();

        let _ = m.target_key_down();
        let _ = m.target_key_up(t0);

        let _ = m.target_key_down();
        m.other_key_down();
        // Release within the window, but the press was a shortcut chord.
        assert!(m.target_key_up(t0 + ms(200)).is_empty());
        // The tainted release was not remembered: had it been, this release
        // 300ms later would pair with it and toggle.
        let _ = m.target_key_down();
        assert!(m.target_key_up(t0 + ms(500)).is_empty());
    }

    #[test]
    fn interference_after_hold_started_still_stops_on_release() {
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.target_key_down().unwrap();
        assert_eq!(
            m.hold_timer_fired(timer),
            Some(GestureIntent::Start(RecordTrigger::Hold))
        );
        m.other_key_down();
        // Releasing the key always ends a hold recording.
        assert_eq!(
            m.target_key_up(t0 + ms(900)),
            vec![GestureIntent::Stop(RecordTrigger::Hold)]
        );
    }

    #[test]
    fn auto_repeat_downs_are_ignored() {
        let mut m = machine();

        let timer = m.target_key_down().unwrap();
        assert_eq!(m.target_key_down(), None);
        assert_eq!(m.target_key_down(), None);
        assert_eq!(
            m.hold_timer_fired(timer),
            Some(GestureIntent::Start(RecordTrigger::Hold))
        );
    }

    #[test]
    fn hold_release_inside_tap_window_restarts_as_toggle() {
        // Tap, then press again quickly and hold just past the threshold:
        // the release stops the hold recording and the release pair still
        // counts as a double-tap, flipping straight into toggle mode.
        let mut m = machine();
        let t0 = Instant::now();

        let timer = m.target_key_down().unwrap();
        let _ = m.target_key_up(t0);

        let _ = m.target_key_down();
        assert_eq!(
            m.hold_timer_fired(timer),
            Some(GestureIntent::Start(RecordTrigger::Hold))
        );
        assert_eq!(
            m.target_key_up(t0 + ms(380)),
            vec![
                GestureIntent::Stop(RecordTrigger::Hold),
                GestureIntent::Start(RecordTrigger::DoubleTap),
            ]
        );
    }

    #[test]
    fn no_double_start_while_recording() {
        let mut m = machine();
        let t0 = Instant::now();

        // Toggle on.
        let timer = m.target_key_down().unwrap();
        let _ = m.target_key_up(t0);
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0 + ms(200));

        // The stale first-press timer fires while toggled recording: no-op.
        assert_eq!(m.hold_timer_fired(timer), None);

        // A fresh hold press must not start a second recording either.
        let timer = m.target_key_down().unwrap();
        assert_eq!(m.hold_timer_fired(timer), None);
        assert!(m.target_key_up(t0 + ms(2000)).is_empty());
    }

    #[test]
    fn sync_recording_false_clears_toggle_latch() {
        let mut m = machine();
        let t0 = Instant::now();

        // Toggle on, then the session ends externally (cancel / quiet-skip).
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0);
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0 + ms(200));
        m.sync_recording(false);

        // The next double-tap starts fresh instead of toggling off nothing.
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0 + ms(1000));
        let _ = m.target_key_down();
        assert_eq!(
            m.target_key_up(t0 + ms(1200)),
            vec![GestureIntent::Start(RecordTrigger::DoubleTap)]
        );
    }

    #[test]
    fn reset_invalidates_pending_timer() {
        let mut m = machine();

        let timer = m.target_key_down().unwrap();
        m.reset();
        assert_eq!(m.hold_timer_fired(timer), None);

        // And the machine accepts a fresh gesture afterwards.
        let timer = m.target_key_down().unwrap();
        assert_eq!(
            m.hold_timer_fired(timer),
            Some(GestureIntent::Start(RecordTrigger::Hold))
        );
    }

    #[test]
    fn rejected_start_heals_via_sync() {
        let mut m = machine();
        let t0 = Instant::now();

        // Double-tap start that the controller rejects (e.g. busy).
        let stale = m.target_key_down().unwrap();
        let _ = m.target_key_up(t0);
        let _ = m.target_key_down();
        let _ = m.target_key_up(t0 + ms(200));
        assert_eq!(m.hold_timer_fired(stale), None);
        m.sync_recording(false);

        // Hold now works; the stale toggle latch is gone.
        let timer = m.target_key_down().unwrap();
        assert_eq!(
            m.hold_timer_fired(timer),
            Some(GestureIntent::Start(RecordTrigger::Hold))
        );
        assert_eq!(
            m.target_key_up(t0 + ms(2000)),
            vec![GestureIntent::Stop(RecordTrigger::Hold)]
        );
    }
}
