mod audio;
mod config;
mod input;
mod output;
mod presenter;
mod session;
mod telemetry;
mod transcription;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config::CredentialStore;
use crate::input::gesture::{GestureMachine, GestureSettings, HoldTimer};
use crate::input::hook::{self, HookEvent};
use crate::presenter::Presenter;
use crate::session::{controller::WATCHDOG_INTERVAL, SessionController, SessionPolicy};

/// Timers and hook events multiplexed into the one event loop.
enum AppEvent {
    Hook(HookEvent),
    HoldTimerFired(HoldTimer),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::load()?;
    println!("✓ Config loaded from ~/.dictation-hotkey.toml");

    // Initialize telemetry
    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
    tracing::info!("dictation-hotkey starting");
    println!("✓ Telemetry initialized");

    // Collaborators behind the session controller
    let credentials: Arc<dyn CredentialStore> = Arc::new(config::KeyringCredentials);
    let recorder = Arc::new(audio::CpalRecorder::new(&config.audio)?);
    println!("✓ Audio capture ready (paused)");

    let transcriber = Arc::new(transcription::RemoteTranscriber::new(
        config.api.clone(),
        Arc::clone(&credentials),
    ));
    let presenter = Arc::new(presenter::LogPresenter);

    let policy = SessionPolicy {
        toggle_debounce: Duration::from_millis(config.hotkey.debounce_ms),
        min_peak_rms: config.audio.min_peak_rms,
        ..SessionPolicy::default()
    };
    let controller = Arc::new(SessionController::new(
        recorder,
        transcriber,
        Arc::new(output::ClipboardPaster),
        Arc::clone(&presenter) as Arc<dyn presenter::Presenter>,
        Arc::clone(&credentials),
        Arc::new(input::RdevHook),
        policy,
    ));

    // Startup credential check, so the first hotkey press is not a surprise
    if credentials.has_valid_key() {
        println!("✓ Ready to record (press {})", config.hotkey.key);
    } else {
        presenter.settings_requested();
        println!("! No API key found - set one before recording");
    }

    // Gesture machine plus the global hook feeding it
    let mut machine = GestureMachine::new(GestureSettings {
        hold_threshold: Duration::from_millis(config.hotkey.hold_threshold_ms),
        double_tap_window: Duration::from_millis(config.hotkey.double_tap_window_ms),
    });

    let (tx, mut rx) = mpsc::channel::<AppEvent>(64);
    let (hook_tx, mut hook_rx) = mpsc::channel::<HookEvent>(64);
    let target_key = hook::parse_key_name(&config.hotkey.key)
        .with_context(|| format!("invalid hotkey in config: {}", config.hotkey.key))?;
    hook::spawn_listener(target_key, hook_tx)?;
    println!("✓ Hotkey registered: {}", config.hotkey.key);

    // Forward hook events into the app channel so timers and keys share it
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = hook_rx.recv().await {
                if tx.send(AppEvent::Hook(ev)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Main event loop
    tracing::info!("event loop starting (press Ctrl+C to exit)");
    println!("\nDictation Hotkey is running. Hold or double-tap the hotkey to dictate.");
    println!("Press Ctrl+C to exit.\n");

    let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                controller.cancel();
                break;
            }
            _ = watchdog.tick() => {
                if controller.watchdog_tick(Instant::now()) {
                    machine.reset();
                    machine.sync_recording(controller.is_recording());
                }
            }
            Some(event) = rx.recv() => {
                handle_event(event, &mut machine, &controller, &tx);
            }
        }
    }

    Ok(())
}

fn handle_event(
    event: AppEvent,
    machine: &mut GestureMachine,
    controller: &Arc<SessionController>,
    tx: &mpsc::Sender<AppEvent>,
) {
    let now = Instant::now();
    match event {
        AppEvent::Hook(HookEvent::Target { pressed: true }) => {
            if let Some(timer) = machine.target_key_down() {
                arm_hold_timer(machine.hold_threshold(), timer, tx);
            }
        }
        AppEvent::Hook(HookEvent::Target { pressed: false }) => {
            for intent in machine.target_key_up(now) {
                controller.handle_intent(intent, now);
            }
            machine.sync_recording(controller.is_recording());
        }
        AppEvent::Hook(HookEvent::CancelRequested) => {
            machine.other_key_down();
            controller.cancel();
            machine.sync_recording(controller.is_recording());
        }
        AppEvent::Hook(HookEvent::OtherKeyDown) => {
            machine.other_key_down();
        }
        AppEvent::HoldTimerFired(timer) => {
            if let Some(intent) = machine.hold_timer_fired(timer) {
                controller.handle_intent(intent, now);
                machine.sync_recording(controller.is_recording());
            }
        }
    }
}

/// Schedules delivery of a hold timer back into the event loop.
fn arm_hold_timer(delay: Duration, timer: HoldTimer, tx: &mpsc::Sender<AppEvent>) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(AppEvent::HoldTimerFired(timer)).await;
    });
}
