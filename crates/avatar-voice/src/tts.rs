//! **SpeechSynthesizer**: segment text to an audio file via ElevenLabs.
//!
//! The response body is streamed straight to disk; `synthesize_to_file` returns only
//! after the file is flushed and closed.

use crate::config::{redact, AvatarConfig};
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const SERVICE: &str = "TTS";
const XI_API_KEY_HEADER: &str = "xi-api-key";

/// Backend that turns text into an audio artifact on disk.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and write the clip to `destination`, overwriting any prior file.
    async fn synthesize_to_file(&self, text: &str, destination: &Path) -> PipelineResult<()>;

    /// Voices available to the account, passed through as returned by the service.
    async fn list_voices(&self) -> PipelineResult<serde_json::Value>;
}

/// ElevenLabs text-to-speech with a fixed voice.
#[derive(Clone)]
pub struct ElevenLabsTts {
    /// Base URL without trailing slash (e.g. https://api.elevenlabs.io/v1).
    pub base_url: String,
    api_key: String,
    pub voice_id: String,
    /// Optional model id (e.g. eleven_multilingual_v2); service default when None.
    pub model_id: Option<String>,
    client: reqwest::Client,
}

impl fmt::Debug for ElevenLabsTts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsTts")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(!self.api_key.is_empty()))
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl ElevenLabsTts {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id: None,
            client,
        })
    }

    /// Build from config. A missing key is allowed here; the pipeline never calls the
    /// service without credentials.
    pub fn from_config(config: &AvatarConfig) -> PipelineResult<Self> {
        let tts = Self::new(
            &config.tts_api_url,
            config.tts_api_key.clone().unwrap_or_default(),
            &config.voice_id,
        )?;
        Ok(match config.tts_model_id {
            Some(ref model) => tts.with_model(model),
            None => tts,
        })
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    fn speech_url(&self) -> String {
        format!("{}/text-to-speech/{}", self.base_url, self.voice_id)
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        let mut body = serde_json::json!({ "text": text });
        if let Some(ref model) = self.model_id {
            body["model_id"] = serde_json::Value::String(model.clone());
        }
        body
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize_to_file(&self, text: &str, destination: &Path) -> PipelineResult<()> {
        let started = Instant::now();
        debug!(target: "avatar::tts", voice = %self.voice_id, "synthesizing: {}", text);

        let res = self
            .client
            .post(self.speech_url())
            .header(XI_API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "audio/mpeg")
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::upstream(
                SERVICE,
                format!("TTS API error {}: {}", status, body),
            ));
        }

        let written = match write_body(res, destination).await {
            Ok(0) => Err(PipelineError::upstream(SERVICE, "TTS returned an empty audio body")),
            other => other,
        };
        let written = match written {
            Ok(n) => n,
            Err(e) => {
                // No partial clip may be left for the aligner to pick up.
                let _ = tokio::fs::remove_file(destination).await;
                return Err(e);
            }
        };
        info!(
            target: "avatar::tts",
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "speech written to {}",
            destination.display()
        );
        Ok(())
    }

    async fn list_voices(&self) -> PipelineResult<serde_json::Value> {
        let url = format!("{}/voices", self.base_url);
        let res = self
            .client
            .get(&url)
            .header(XI_API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::upstream(
                SERVICE,
                format!("voices API error {}: {}", status, body),
            ));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, format!("reading voices: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::MalformedResponse(format!("voices: {}", e)))
    }
}

/// Stream the response body into `destination`. Returns the number of bytes written.
async fn write_body(res: reqwest::Response, destination: &Path) -> PipelineResult<usize> {
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| PipelineError::filesystem(destination, e))?;
    let mut stream = res.bytes_stream();
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| PipelineError::upstream(SERVICE, format!("stream error: {}", e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| PipelineError::filesystem(destination, e))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|e| PipelineError::filesystem(destination, e))?;
    Ok(written)
}
