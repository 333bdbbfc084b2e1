use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::Capture;
use crate::audio::capture::TARGET_SAMPLE_RATE;
use crate::config::{ApiConfig, CredentialStore};

use super::{post_process, Transcriber};

/// Errors that can occur during remote transcription
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// No usable API credential is stored
    #[error("API credential is not set")]
    MissingCredential,

    /// Captured samples could not be encoded as WAV
    #[error("failed to encode audio: {0}")]
    Encode(#[from] hound::Error),

    /// Transport-level failure talking to the API
    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("transcription API returned {status}: {body}")]
    Api {
        /// HTTP status code
        status: reqwest::StatusCode,
        /// Response body, for the log
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Client for a hosted Whisper-style `/audio/transcriptions` endpoint.
///
/// The blocking HTTP client is built per request so its whole lifecycle stays
/// on the blocking thread the controller runs transcriptions on.
pub struct RemoteTranscriber {
    config: ApiConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl RemoteTranscriber {
    /// Creates a client for the configured endpoint.
    #[must_use]
    pub fn new(config: ApiConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            credentials,
        }
    }

    fn request(&self, api_key: &str, wav: Vec<u8>) -> Result<String, TranscribeError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("prompt", self.config.prompt.clone())
            .text("response_format", "json")
            .part("file", part);

        let url = format!(
            "{}/audio/transcriptions",
            self.config.endpoint.trim_end_matches('/')
        );
        let response = http
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(%status, "transcription API error");
            return Err(TranscribeError::Api { status, body });
        }

        let parsed: TranscriptionResponse = response.json()?;
        Ok(parsed.text)
    }
}

impl Transcriber for RemoteTranscriber {
    fn transcribe(&self, capture: &Capture) -> Result<String, TranscribeError> {
        let api_key = self
            .credentials
            .api_key()
            .ok_or(TranscribeError::MissingCredential)?;

        let wav = encode_wav(&capture.samples)?;
        debug!(
            samples = capture.samples.len(),
            wav_bytes = wav.len(),
            "uploading recording"
        );

        let start = std::time::Instant::now();
        let raw = self.request(&api_key, wav)?;
        let text = post_process::clean_transcript(&raw);

        info!(
            raw_len = raw.len(),
            text_len = text.len(),
            request_ms = start.elapsed().as_millis(),
            "transcription completed"
        );
        Ok(text)
    }
}

/// Encodes 16kHz mono f32 samples as an in-memory 16-bit PCM WAV.
///
/// # Errors
/// Returns error if the WAV writer fails (it writes to memory, so only on
/// malformed spec or overflow).
pub fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            // f32 → i16 with clipping; out-of-range input would wrap otherwise
            #[allow(clippy::cast_possible_truncation)]
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
