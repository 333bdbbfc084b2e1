use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapRb,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::AudioConfig;

use super::{AudioRecorder, Capture, LevelCallback};

/// Sample rate the transcription API expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Gain applied to chunk RMS before clamping to `0.0..=1.0` for the
/// level callback. Rough normalization for typical microphone input.
const LEVEL_GAIN: f32 = 10.0;

/// Commands for the thread that owns the CPAL stream.
enum StreamCmd {
    Resume,
    Pause,
}

/// State shared with the audio callback.
struct CallbackState {
    recording: AtomicBool,
    on_level: Mutex<Option<LevelCallback>>,
    peak_rms: Mutex<f32>,
}

/// Microphone capture on the default input device.
///
/// The CPAL stream is not `Send`, so a dedicated thread owns it and receives
/// resume/pause commands over a channel. Captured samples flow through a
/// lock-free ring buffer sized for the maximum recording duration; the stream
/// stays paused while idle so the microphone indicator is off.
pub struct CpalRecorder {
    cmd_tx: mpsc::Sender<StreamCmd>,
    consumer: Mutex<HeapCons<f32>>,
    state: Arc<CallbackState>,
    device_sample_rate: u32,
    device_channels: u16,
}

/// What the stream thread reports back after initialization.
struct StreamInfo {
    consumer: HeapCons<f32>,
    sample_rate: u32,
    channels: u16,
}

impl CpalRecorder {
    /// Opens the default input device and prepares a paused stream.
    ///
    /// # Errors
    /// Returns error if no input device is available or stream creation fails.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        info!("initializing audio capture");

        let state = Arc::new(CallbackState {
            recording: AtomicBool::new(false),
            on_level: Mutex::new(None),
            peak_rms: Mutex::new(0.0),
        });

        let (cmd_tx, cmd_rx) = mpsc::channel::<StreamCmd>();
        let (init_tx, init_rx) = mpsc::channel::<Result<StreamInfo>>();

        let max_secs = config.max_recording_secs;
        let cb_state = Arc::clone(&state);
        std::thread::Builder::new()
            .name("audio-stream".into())
            .spawn(move || run_stream_thread(&cmd_rx, &init_tx, &cb_state, max_secs))
            .context("failed to spawn audio stream thread")?;

        let info = init_rx
            .recv()
            .context("audio stream thread exited before reporting")??;

        info!(
            "device config: {} Hz, {} channels",
            info.sample_rate, info.channels
        );

        Ok(Self {
            cmd_tx,
            consumer: Mutex::new(info.consumer),
            state,
            device_sample_rate: info.sample_rate,
            device_channels: info.channels,
        })
    }

    fn send_cmd(&self, cmd: StreamCmd) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow!("audio stream thread is gone"))
    }

    fn lock_consumer(&self) -> std::sync::MutexGuard<'_, HeapCons<f32>> {
        self.consumer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl AudioRecorder for CpalRecorder {
    fn start(&self, on_level: LevelCallback) -> Result<()> {
        let start = std::time::Instant::now();
        debug!("starting recording");

        self.lock_consumer().clear();
        *self
            .state
            .peak_rms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = 0.0;
        *self
            .state
            .on_level
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(on_level);

        // Set the flag before resuming so the first callback already records.
        self.state.recording.store(true, Ordering::Relaxed);
        self.send_cmd(StreamCmd::Resume)?;

        info!(latency_us = start.elapsed().as_micros(), "recording started");
        Ok(())
    }

    fn stop(&self) -> Result<Capture> {
        debug!("stopping recording");

        self.state.recording.store(false, Ordering::Relaxed);
        self.send_cmd(StreamCmd::Pause)?;
        *self
            .state
            .on_level
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;

        let mut raw = Vec::new();
        {
            let mut consumer = self.lock_consumer();
            while let Some(sample) = consumer.try_pop() {
                raw.push(sample);
            }
        }

        let mono = downmix_to_mono(&raw, self.device_channels);
        let samples = resample_linear(&mono, self.device_sample_rate, TARGET_SAMPLE_RATE);
        let peak_rms = *self
            .state
            .peak_rms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        info!(
            raw = raw.len(),
            samples = samples.len(),
            peak_rms,
            "recording stopped"
        );

        Ok(Capture { samples, peak_rms })
    }
}

/// Builds the CPAL stream, reports readiness, then serves resume/pause
/// commands until the recorder is dropped.
fn run_stream_thread(
    cmd_rx: &mpsc::Receiver<StreamCmd>,
    init_tx: &mpsc::Sender<Result<StreamInfo>>,
    state: &Arc<CallbackState>,
    max_recording_secs: u32,
) {
    let built = build_stream(state, max_recording_secs);
    let (stream, info) = match built {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };
    let _ = init_tx.send(Ok(info));

    while let Ok(cmd) = cmd_rx.recv() {
        let result: Result<()> = match cmd {
            StreamCmd::Resume => stream.play().map_err(anyhow::Error::from),
            StreamCmd::Pause => stream.pause().map_err(anyhow::Error::from),
        };
        if let Err(e) = result {
            warn!("audio stream control failed: {}", e);
        }
    }
    // Channel closed: recorder dropped, stream drops with this thread.
}

fn build_stream(
    state: &Arc<CallbackState>,
    max_recording_secs: u32,
) -> Result<(cpal::Stream, StreamInfo)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no input device available")?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());
    info!("using input device: {}", device_name);

    let supported = device
        .default_input_config()
        .context("failed to get default input config")?;
    let sample_rate = supported.sample_rate();
    let channels = supported.channels();

    // Sized so nothing is dropped for the longest allowed recording.
    let capacity = sample_rate as usize * channels as usize * max_recording_secs as usize;
    debug!(capacity, "ring buffer allocated");
    let (mut producer, consumer) = HeapRb::<f32>::new(capacity).split();

    let cb_state = Arc::clone(state);
    let stream = device
        .build_input_stream(
            &supported.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !cb_state.recording.load(Ordering::Relaxed) {
                    return;
                }
                let pushed = producer.push_slice(data);
                if pushed < data.len() {
                    warn!("ring buffer full, dropped {} samples", data.len() - pushed);
                }

                let rms = chunk_rms(data);
                {
                    let mut peak = cb_state
                        .peak_rms
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    if rms > *peak {
                        *peak = rms;
                    }
                }
                let level = (rms * LEVEL_GAIN).min(1.0);
                if let Some(on_level) = cb_state
                    .on_level
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .as_ref()
                {
                    on_level(level);
                }
            },
            move |err| {
                warn!("audio stream error: {}", err);
            },
            None,
        )
        .context("failed to build input stream")?;

    // Start then immediately pause: mic stays inactive until the hotkey.
    stream.play().context("failed to start audio stream")?;
    stream.pause().context("failed to pause audio stream")?;
    info!("audio stream initialized (paused)");

    Ok((
        stream,
        StreamInfo {
            consumer,
            sample_rate,
            channels,
        },
    ))
}

/// Root-mean-square of one callback chunk.
#[must_use]
pub fn chunk_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    // f64 → f32: audio level precision is more than sufficient
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    {
        (sum_sq / samples.len() as f64).sqrt() as f32
    }
}

/// Averages interleaved frames down to a single channel.
#[must_use]
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels_f64 = f64::from(channels);
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&s| f64::from(s)).sum();
            // f64 → f32: samples are stored as f32, precision sufficient
            #[allow(clippy::cast_possible_truncation)]
            {
                (sum / channels_f64) as f32
            }
        })
        .collect()
}

/// Linear-interpolation resampling of mono samples.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    let last = samples.len() - 1;

    let mut out = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src = i as f64 * ratio;
        let lo = (src.floor() as usize).min(last);
        let hi = (lo + 1).min(last);
        let fract = src - src.floor();
        let s = f64::from(samples[lo]).mul_add(1.0 - fract, f64::from(samples[hi]) * fract);
        out.push(s as f32);
    }
    out
}

#[cfg(test)]
#[allow(clippy::float_cmp)] // Assertions against known exact values
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(chunk_rms(&[0.0; 512]), 0.0);
        assert_eq!(chunk_rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        let rms = chunk_rms(&[0.5; 1024]);
        assert!((rms - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rms_is_sign_independent() {
        let rms = chunk_rms(&[-0.25, 0.25, -0.25, 0.25]);
        assert!((rms - 0.25).abs() < 1e-6);
    }

    #[test]
    fn downmix_averages_stereo_frames() {
        let stereo = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn downmix_mono_passthrough() {
        let mono = vec![1.0, 2.0, 3.0];
        assert_eq!(downmix_to_mono(&mono, 1), mono);
    }

    #[test]
    fn downmix_four_channels() {
        let quad = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(downmix_to_mono(&quad, 4), vec![2.5, 6.5]);
    }

    #[test]
    fn resample_same_rate_passthrough() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn resample_empty() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn downsample_3_to_1() {
        let samples: Vec<f32> = (1..=9).map(|i| i as f32).collect();
        let out = resample_linear(&samples, 48_000, 16_000);
        assert_eq!(out.len(), 3);
        for &s in &out {
            assert!((1.0..=9.0).contains(&s));
        }
    }

    #[test]
    fn upsample_doubles_length() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let out = resample_linear(&samples, 8_000, 16_000);
        assert_eq!(out.len(), 8);
        for &s in &out {
            assert!((1.0..=4.0).contains(&s));
        }
    }

    #[test]
    fn resample_preserves_bounds() {
        let samples = vec![-1.0, -0.5, 0.0, 0.5, 1.0];
        for &s in &resample_linear(&samples, 22_050, 16_000) {
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn resample_length_tracks_ratio() {
        let out = resample_linear(&vec![0.0; 20], 32_000, 16_000);
        assert!((out.len() as i64 - 10).abs() <= 1);

        let out = resample_linear(&vec![0.0; 10], 8_000, 16_000);
        assert!((out.len() as i64 - 20).abs() <= 1);
    }
}
