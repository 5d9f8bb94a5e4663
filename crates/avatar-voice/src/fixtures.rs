//! Canned single-segment replies for the two short-circuit cases (empty input, missing
//! credentials). Loaded once at startup and cloned per request.

use crate::encoder::load_media;
use crate::error::PipelineResult;
use crate::segment::{Animation, FacialExpression, ReplySegment, SegmentMedia};
use std::path::{Path, PathBuf};
use tracing::info;

pub const GREETING_TEXT: &str = "Hey dear... How was your day?";
pub const MISSING_CREDENTIALS_TEXT: &str = "Please add your API keys!";

const GREETING_STEM: &str = "intro_0";
const MISSING_CREDENTIALS_STEM: &str = "api_0";

#[derive(Debug, Clone)]
pub struct CannedReplies {
    greeting: ReplySegment,
    missing_credentials: ReplySegment,
}

impl CannedReplies {
    /// Build from already-loaded media.
    pub fn new(greeting: SegmentMedia, missing_credentials: SegmentMedia) -> Self {
        Self {
            greeting: ReplySegment::stub(
                0,
                GREETING_TEXT,
                FacialExpression::Smile,
                Animation::Talking1,
            )
            .with_media(greeting),
            missing_credentials: ReplySegment::stub(
                0,
                MISSING_CREDENTIALS_TEXT,
                FacialExpression::Angry,
                Animation::Angry,
            )
            .with_media(missing_credentials),
        }
    }

    /// Load `intro_0.{wav,json}` and `api_0.{wav,json}` from `dir`.
    pub async fn load(dir: &Path) -> PipelineResult<Self> {
        let [greeting_audio, greeting_track, missing_audio, missing_track] = Self::fixture_paths(dir);
        let greeting = load_media(&greeting_audio, &greeting_track).await?;
        let missing_credentials = load_media(&missing_audio, &missing_track).await?;
        info!(target: "avatar::pipeline", dir = %dir.display(), "canned replies loaded");
        Ok(Self::new(greeting, missing_credentials))
    }

    /// Every file `load` reads, in order: greeting audio/track, missing-key audio/track.
    pub fn fixture_paths(dir: &Path) -> [PathBuf; 4] {
        [
            dir.join(format!("{}.wav", GREETING_STEM)),
            dir.join(format!("{}.json", GREETING_STEM)),
            dir.join(format!("{}.wav", MISSING_CREDENTIALS_STEM)),
            dir.join(format!("{}.json", MISSING_CREDENTIALS_STEM)),
        ]
    }

    pub fn greeting(&self) -> Vec<ReplySegment> {
        vec![self.greeting.clone()]
    }

    pub fn missing_credentials(&self) -> Vec<ReplySegment> {
        vec![self.missing_credentials.clone()]
    }
}
