//! Avatar configuration loaded from the environment (and `.env` via the gateway).
//!
//! Credentials, the voice identifier and external tool paths are supplied here rather
//! than embedded in code.

use crate::error::{PipelineError, PipelineResult};
use std::fmt;
use std::path::PathBuf;

const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub(crate) const DEFAULT_LLM_TEMPERATURE: f32 = 0.6;
pub(crate) const DEFAULT_LLM_MAX_TOKENS: u32 = 1000;
const DEFAULT_TTS_API_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_VOICE_ID: &str = "9BWtsMINqrJLrRacOk9x";

/// Hard ceiling on segments per reply.
pub const MAX_SEGMENTS: usize = 3;

/// Avatar configuration loaded from environment.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | OPENAI_API_KEY | unset | Language-model key. `-` or blank counts as unset. |
/// | OPENAI_API_URL | https://api.openai.com/v1 | Chat-completion base URL. |
/// | OPENAI_MODEL | gpt-4o-mini | Chat model. |
/// | OPENAI_TEMPERATURE | 0.6 | Sampling temperature. |
/// | OPENAI_MAX_TOKENS | 1000 | Completion budget. |
/// | ELEVEN_LABS_API_KEY | unset | TTS key. |
/// | ELEVEN_LABS_API_URL | https://api.elevenlabs.io/v1 | TTS base URL. |
/// | ELEVEN_LABS_VOICE_ID | 9BWtsMINqrJLrRacOk9x | Voice used for every segment. |
/// | ELEVEN_LABS_MODEL_ID | unset | Optional TTS model id. |
/// | FFMPEG_PATH | ffmpeg | Transcoder executable. |
/// | RHUBARB_PATH | rhubarb | Lip-sync aligner executable. |
/// | AVATAR_WORK_DIR | audios | Root for per-request workspaces. |
/// | AVATAR_FIXTURES_DIR | audios | Canned reply artifacts. |
/// | AVATAR_MAX_SEGMENTS | 3 | Segment cap, clamped to 1..=3. |
/// | PORT | 3000 | Gateway port. |
#[derive(Clone)]
pub struct AvatarConfig {
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub tts_api_key: Option<String>,
    pub tts_api_url: String,
    pub voice_id: String,
    pub tts_model_id: Option<String>,
    pub ffmpeg_path: PathBuf,
    pub rhubarb_path: PathBuf,
    pub work_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub max_segments: usize,
    pub port: u16,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_temperature: DEFAULT_LLM_TEMPERATURE,
            llm_max_tokens: DEFAULT_LLM_MAX_TOKENS,
            tts_api_key: None,
            tts_api_url: DEFAULT_TTS_API_URL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            tts_model_id: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            rhubarb_path: PathBuf::from("rhubarb"),
            work_dir: PathBuf::from("audios"),
            fixtures_dir: PathBuf::from("audios"),
            max_segments: MAX_SEGMENTS,
            port: 3000,
        }
    }
}

/// Keys are shown only as set/unset.
impl fmt::Debug for AvatarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarConfig")
            .field("llm_api_key", &redact(self.llm_api_key.is_some()))
            .field("llm_api_url", &self.llm_api_url)
            .field("llm_model", &self.llm_model)
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("tts_api_key", &redact(self.tts_api_key.is_some()))
            .field("tts_api_url", &self.tts_api_url)
            .field("voice_id", &self.voice_id)
            .field("tts_model_id", &self.tts_model_id)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("rhubarb_path", &self.rhubarb_path)
            .field("work_dir", &self.work_dir)
            .field("fixtures_dir", &self.fixtures_dir)
            .field("max_segments", &self.max_segments)
            .field("port", &self.port)
            .finish()
    }
}

pub(crate) fn redact(present: bool) -> &'static str {
    if present {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl AvatarConfig {
    /// Load from environment. Unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llm_api_key: env_secret("OPENAI_API_KEY"),
            llm_api_url: env_string("OPENAI_API_URL", &defaults.llm_api_url),
            llm_model: env_string("OPENAI_MODEL", &defaults.llm_model),
            llm_temperature: env_parse("OPENAI_TEMPERATURE", defaults.llm_temperature),
            llm_max_tokens: env_parse("OPENAI_MAX_TOKENS", defaults.llm_max_tokens),
            tts_api_key: env_secret("ELEVEN_LABS_API_KEY"),
            tts_api_url: env_string("ELEVEN_LABS_API_URL", &defaults.tts_api_url),
            voice_id: env_string("ELEVEN_LABS_VOICE_ID", &defaults.voice_id),
            tts_model_id: env_opt_string("ELEVEN_LABS_MODEL_ID"),
            ffmpeg_path: env_path("FFMPEG_PATH", defaults.ffmpeg_path),
            rhubarb_path: env_path("RHUBARB_PATH", defaults.rhubarb_path),
            work_dir: env_path("AVATAR_WORK_DIR", defaults.work_dir),
            fixtures_dir: env_path("AVATAR_FIXTURES_DIR", defaults.fixtures_dir),
            max_segments: env_parse("AVATAR_MAX_SEGMENTS", defaults.max_segments)
                .clamp(1, MAX_SEGMENTS),
            port: env_parse("PORT", defaults.port),
        }
    }

    /// True when both the language-model and TTS keys are present.
    pub fn has_credentials(&self) -> bool {
        self.llm_api_key.is_some() && self.tts_api_key.is_some()
    }

    /// Reject blank paths and identifiers. Credentials are not checked here; their
    /// absence is answered with a canned reply at request time.
    pub fn validate(&self) -> PipelineResult<()> {
        let required = [
            ("OPENAI_API_URL", self.llm_api_url.trim().is_empty()),
            ("OPENAI_MODEL", self.llm_model.trim().is_empty()),
            ("ELEVEN_LABS_API_URL", self.tts_api_url.trim().is_empty()),
            ("ELEVEN_LABS_VOICE_ID", self.voice_id.trim().is_empty()),
            ("FFMPEG_PATH", self.ffmpeg_path.as_os_str().is_empty()),
            ("RHUBARB_PATH", self.rhubarb_path.as_os_str().is_empty()),
            ("AVATAR_WORK_DIR", self.work_dir.as_os_str().is_empty()),
            ("AVATAR_FIXTURES_DIR", self.fixtures_dir.as_os_str().is_empty()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, blank)| *blank) {
            return Err(PipelineError::Config(format!("{} must not be empty", name)));
        }
        if !(1..=MAX_SEGMENTS).contains(&self.max_segments) {
            return Err(PipelineError::Config(format!(
                "max_segments must be between 1 and {}",
                MAX_SEGMENTS
            )));
        }
        Ok(())
    }
}

/// Secrets: blank and the `-` placeholder both count as unset.
fn env_secret(name: &str) -> Option<String> {
    env_opt_string(name).filter(|v| v != "-")
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_string(name: &str, default: &str) -> String {
    env_opt_string(name).unwrap_or_else(|| default.to_string())
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    env_opt_string(name).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_opt_string(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
