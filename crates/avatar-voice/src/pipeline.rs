//! **Reply Pipeline**: the orchestration layer.
//!
//! One request runs to completion on a single logical flow:
//!
//! 1. Empty input → canned greeting (no external calls).
//! 2. Missing credentials → canned "add your API keys" reply.
//! 3. Generate segments with the language model.
//! 4. For each segment, in index order: TTS → transcode → align → encode.
//! 5. Return all segments, or fail as a whole. Partial replies are never returned.
//!
//! Stages are awaited one after another because each consumes the file the previous
//! one wrote. Intermediate files live in a per-request [`RequestWorkspace`], so separate
//! requests can run concurrently.

use crate::config::AvatarConfig;
use crate::encoder::load_media;
use crate::error::{PipelineError, PipelineResult};
use crate::fixtures::CannedReplies;
use crate::intent::{IntentGenerator, OpenAiChat};
use crate::lipsync::VisemeAligner;
use crate::segment::ReplySegment;
use crate::tools::ProcessRunner;
use crate::tts::{ElevenLabsTts, SpeechSynthesizer};
use crate::workspace::RequestWorkspace;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct ReplyPipeline {
    intent: IntentGenerator,
    tts: Arc<dyn SpeechSynthesizer>,
    aligner: VisemeAligner,
    canned: CannedReplies,
    work_dir: PathBuf,
    credentials_ready: bool,
}

impl ReplyPipeline {
    /// Assemble from parts. Credentials are assumed present; see [`Self::with_credentials`].
    pub fn new(
        intent: IntentGenerator,
        tts: Arc<dyn SpeechSynthesizer>,
        aligner: VisemeAligner,
        canned: CannedReplies,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            intent,
            tts,
            aligner,
            canned,
            work_dir: work_dir.into(),
            credentials_ready: true,
        }
    }

    /// Production wiring: OpenAI chat, ElevenLabs TTS, ffmpeg + Rhubarb via processes.
    pub fn from_config(config: &AvatarConfig, canned: CannedReplies) -> PipelineResult<Self> {
        config.validate()?;
        let model = Arc::new(OpenAiChat::from_config(config)?);
        let tts = Arc::new(ElevenLabsTts::from_config(config)?);
        let aligner = VisemeAligner::from_config(config, Arc::new(ProcessRunner));
        Ok(Self::new(
            IntentGenerator::new(model, config.max_segments),
            tts,
            aligner,
            canned,
            &config.work_dir,
        )
        .with_credentials(config.has_credentials()))
    }

    pub fn with_credentials(mut self, ready: bool) -> Self {
        self.credentials_ready = ready;
        self
    }

    fn ensure_credentials(&self) -> PipelineResult<()> {
        if self.credentials_ready {
            Ok(())
        } else {
            Err(PipelineError::MissingCredentials)
        }
    }

    /// Turn one user message into the full, ordered list of enriched segments.
    pub async fn respond(&self, message: Option<&str>) -> PipelineResult<Vec<ReplySegment>> {
        let message = match message.map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => {
                info!(target: "avatar::pipeline", "empty message: sending canned greeting");
                return Ok(self.canned.greeting());
            }
        };
        if let Err(e) = self.ensure_credentials() {
            warn!(target: "avatar::pipeline", "{}: sending canned reply", e);
            return Ok(self.canned.missing_credentials());
        }

        let request_id = Uuid::new_v4();
        let span = info_span!(target: "avatar::pipeline", "reply", %request_id);
        let result = self.generate_and_enrich(message, request_id).instrument(span).await;
        if let Err(ref e) = result {
            error!(
                target: "avatar::pipeline",
                %request_id,
                kind = e.kind(),
                "reply failed: {}",
                e
            );
        }
        result
    }

    async fn generate_and_enrich(
        &self,
        message: &str,
        request_id: Uuid,
    ) -> PipelineResult<Vec<ReplySegment>> {
        let started = Instant::now();
        let segments = self.intent.generate(message).await?;
        info!(target: "avatar::pipeline", segments = segments.len(), "segments generated");

        let workspace = RequestWorkspace::create(&self.work_dir, request_id).await?;
        let mut enriched = Vec::with_capacity(segments.len());
        for segment in segments {
            enriched.push(self.enrich(segment, &workspace).await?);
        }

        info!(
            target: "avatar::pipeline",
            segments = enriched.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reply assembled"
        );
        Ok(enriched)
    }

    async fn enrich(
        &self,
        segment: ReplySegment,
        workspace: &RequestWorkspace,
    ) -> PipelineResult<ReplySegment> {
        let audio = workspace.audio_path(segment.index);
        let waveform = workspace.waveform_path(segment.index);
        let track = workspace.lipsync_path(segment.index);
        debug!(
            target: "avatar::pipeline",
            request_id = %workspace.request_id(),
            index = segment.index,
            "enriching segment"
        );

        self.tts.synthesize_to_file(&segment.text, &audio).await?;
        self.aligner.align(&audio, &waveform, &track).await?;
        let media = load_media(&audio, &track).await?;
        Ok(segment.with_media(media))
    }

    /// Voice catalogue from the TTS service.
    pub async fn voices(&self) -> PipelineResult<serde_json::Value> {
        self.tts.list_voices().await
    }
}
