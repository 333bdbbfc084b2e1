//! The recording session controller.
//!
//! Owns the `recording` / `processing` flags and everything that guards them:
//! toggle debouncing, stuck-state recovery, the quiet-skip policy, and the
//! suspend/resume watchdog. Audio capture, transcription, text output and the
//! UI are all reached through traits, so the lifecycle is testable end to end
//! with mocks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioRecorder, Capture};
use crate::config::CredentialStore;
use crate::input::gesture::{GestureIntent, RecordTrigger};
use crate::input::hook::InputHook;
use crate::output::TextOutput;
use crate::presenter::Presenter;
use crate::transcription::Transcriber;

/// How often [`SessionController::watchdog_tick`] should be driven.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// A tick gap beyond this means the machine slept in between.
/// Watchdog interval plus scheduling margin.
const RESUME_GAP: Duration = Duration::from_secs(8);

/// Lifecycle policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Minimum gap between accepted double-tap toggles
    pub toggle_debounce: Duration,
    /// Processing older than this is considered stuck and force-reset
    pub stuck_processing_timeout: Duration,
    /// Recordings quieter than this peak RMS are discarded unsent
    pub min_peak_rms: f32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            toggle_debounce: Duration::from_millis(500),
            stuck_processing_timeout: Duration::from_secs(35),
            min_peak_rms: 0.01,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    recording: bool,
    processing: bool,
    processing_started_at: Option<Instant>,
    last_toggle_at: Option<Instant>,
    /// Bumped whenever a session ends or is invalidated; in-flight
    /// transcription results from an older generation are dropped.
    generation: u64,
    last_watchdog_at: Option<Instant>,
}

/// Coordinates recorder, transcriber, text output and presenter.
pub struct SessionController {
    recorder: Arc<dyn AudioRecorder>,
    transcriber: Arc<dyn Transcriber>,
    output: Arc<dyn TextOutput>,
    presenter: Arc<dyn Presenter>,
    credentials: Arc<dyn CredentialStore>,
    hook: Arc<dyn InputHook>,
    policy: SessionPolicy,
    /// Shared with the background transcription task.
    state: Arc<Mutex<SessionState>>,
}

impl SessionController {
    /// Wires the controller to its collaborators.
    pub fn new(
        recorder: Arc<dyn AudioRecorder>,
        transcriber: Arc<dyn Transcriber>,
        output: Arc<dyn TextOutput>,
        presenter: Arc<dyn Presenter>,
        credentials: Arc<dyn CredentialStore>,
        hook: Arc<dyn InputHook>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            recorder,
            transcriber,
            output,
            presenter,
            credentials,
            hook,
            policy,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    /// Whether a recording is currently in progress.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.lock_state().recording
    }

    /// Whether a transcription is currently in flight.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.lock_state().processing
    }

    /// Applies a gesture intent to the session.
    ///
    /// Must run inside a tokio runtime: stopping spawns the transcription
    /// pipeline on the blocking pool.
    pub fn handle_intent(&self, intent: GestureIntent, now: Instant) {
        match intent {
            GestureIntent::Start(trigger) => self.start(trigger, now),
            GestureIntent::Stop(trigger) => self.stop_and_transcribe(trigger, now),
        }
    }

    fn start(&self, trigger: RecordTrigger, now: Instant) {
        if !self.credentials.has_valid_key() {
            info!("no API credential configured, requesting settings");
            self.presenter.settings_requested();
            return;
        }

        {
            let mut state = self.lock_state();

            if state.processing {
                if is_stuck(
                    state.processing_started_at,
                    now,
                    self.policy.stuck_processing_timeout,
                ) {
                    warn!("processing state stuck, force resetting");
                    state.processing = false;
                    state.processing_started_at = None;
                    state.generation += 1;
                } else {
                    debug!("start ignored while processing");
                    return;
                }
            }

            if state.recording {
                debug!("start ignored, already recording");
                return;
            }

            if trigger == RecordTrigger::DoubleTap {
                if within_debounce(state.last_toggle_at, now, self.policy.toggle_debounce) {
                    debug!("toggle debounced");
                    return;
                }
                state.last_toggle_at = Some(now);
            }

            state.recording = true;
        }

        info!(?trigger, "recording starting");
        self.presenter.recording_started();

        let presenter = Arc::clone(&self.presenter);
        let on_level = Box::new(move |level: f32| presenter.level(level));
        if let Err(e) = self.recorder.start(on_level) {
            error!("failed to start recording: {:#}", e);
            self.lock_state().recording = false;
            self.presenter.idle();
        }
    }

    fn stop_and_transcribe(&self, trigger: RecordTrigger, now: Instant) {
        let generation = {
            let mut state = self.lock_state();

            if !state.recording {
                debug!("stop ignored, not recording");
                return;
            }

            if trigger == RecordTrigger::DoubleTap {
                if within_debounce(state.last_toggle_at, now, self.policy.toggle_debounce) {
                    debug!("toggle debounced");
                    return;
                }
                state.last_toggle_at = Some(now);
            }

            state.recording = false;
            state.processing = true;
            state.processing_started_at = Some(now);
            state.generation += 1;
            state.generation
        };

        info!(?trigger, "recording stopping");
        self.presenter.processing_started();

        let capture = match self.recorder.stop() {
            Ok(capture) => capture,
            Err(e) => {
                error!("failed to stop recording: {:#}", e);
                self.finish_processing(generation);
                return;
            }
        };

        if capture.peak_rms < self.policy.min_peak_rms {
            info!(
                peak_rms = capture.peak_rms,
                "skipping transcription, input too quiet"
            );
            self.finish_processing(generation);
            return;
        }

        let transcriber = Arc::clone(&self.transcriber);
        let output = Arc::clone(&self.output);
        let presenter = Arc::clone(&self.presenter);
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            transcribe_and_paste(
                &*transcriber,
                &*output,
                &*presenter,
                &state,
                &capture,
                generation,
            );
        });
    }

    fn finish_processing(&self, generation: u64) {
        finish_processing(&self.state, &*self.presenter, generation);
    }

    /// Aborts a recording in progress, discarding the captured audio.
    pub fn cancel(&self) {
        {
            let mut state = self.lock_state();
            if !state.recording {
                return;
            }
            state.recording = false;
            state.generation += 1;
        }

        info!("recording cancelled");
        if let Err(e) = self.recorder.stop() {
            warn!("failed to stop recorder on cancel: {:#}", e);
        }
        self.presenter.idle();
    }

    /// Periodic liveness tick.
    ///
    /// Detects suspend/resume by the gap since the previous tick. On resume
    /// the input hook is reinstalled; the caller must also reset the gesture
    /// machine, so the detection result is returned.
    pub fn watchdog_tick(&self, now: Instant) -> bool {
        let resumed = {
            let mut state = self.lock_state();
            let resumed = resume_gap(state.last_watchdog_at, now);
            state.last_watchdog_at = Some(now);
            resumed
        };

        if resumed {
            info!("system resume detected, reinstalling input hook");
            if let Err(e) = self.hook.reinstall() {
                warn!("failed to reinstall input hook: {:#}", e);
            }
        }
        resumed
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The background half of the stop path. Runs on the blocking pool; every
/// collaborator it needs comes in as a clone so the controller itself is not
/// captured.
fn transcribe_and_paste(
    transcriber: &dyn Transcriber,
    output: &dyn TextOutput,
    presenter: &dyn Presenter,
    state: &Mutex<SessionState>,
    capture: &Capture,
    generation: u64,
) {
    match transcriber.transcribe(capture) {
        Ok(text) if text.is_empty() => {
            debug!("empty transcription, nothing to paste");
        }
        Ok(text) => {
            if lock(state).generation == generation {
                if let Err(e) = output.paste(&text) {
                    error!("paste failed: {}", e);
                }
            } else {
                debug!("discarding transcription from a superseded session");
            }
        }
        Err(e) => {
            error!("transcription failed: {}", e);
        }
    }
    finish_processing(state, presenter, generation);
}

fn finish_processing(state: &Mutex<SessionState>, presenter: &dyn Presenter, generation: u64) {
    {
        let mut state = lock(state);
        if state.generation != generation || !state.processing {
            // A stuck reset or cancel already took over this session.
            return;
        }
        state.processing = false;
        state.processing_started_at = None;
    }
    presenter.idle();
}

fn within_debounce(last: Option<Instant>, now: Instant, window: Duration) -> bool {
    last.is_some_and(|last| now.duration_since(last) < window)
}

fn is_stuck(started: Option<Instant>, now: Instant, timeout: Duration) -> bool {
    started.is_some_and(|started| now.duration_since(started) > timeout)
}

fn resume_gap(previous: Option<Instant>, now: Instant) -> bool {
    previous.is_some_and(|previous| now.duration_since(previous) > RESUME_GAP)
}
