//! **VisemeAligner**: derive a mouth-cue track for a synthesized clip.
//!
//! Two external stages, run in order through a [`ToolRunner`]:
//! 1. `transcode`: ffmpeg converts the TTS clip to the WAV the aligner reads.
//! 2. `align`: Rhubarb Lip Sync (phonetic recognizer) writes a JSON cue track.

use crate::config::AvatarConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::tools::{ToolCommand, ToolRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const TRANSCODE_STAGE: &str = "transcode";
pub const ALIGN_STAGE: &str = "align";

pub struct VisemeAligner {
    runner: Arc<dyn ToolRunner>,
    ffmpeg_path: PathBuf,
    rhubarb_path: PathBuf,
}

impl VisemeAligner {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        ffmpeg_path: impl Into<PathBuf>,
        rhubarb_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            ffmpeg_path: ffmpeg_path.into(),
            rhubarb_path: rhubarb_path.into(),
        }
    }

    pub fn from_config(config: &AvatarConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self::new(runner, &config.ffmpeg_path, &config.rhubarb_path)
    }

    /// `ffmpeg -y -i <audio> <waveform>`
    pub fn transcode_command(&self, audio: &Path, waveform: &Path) -> ToolCommand {
        ToolCommand::new(TRANSCODE_STAGE, &self.ffmpeg_path)
            .args(["-y", "-i"])
            .arg(audio)
            .arg(waveform)
    }

    /// `rhubarb -f json -o <track> <waveform> -r phonetic`
    pub fn align_command(&self, waveform: &Path, track: &Path) -> ToolCommand {
        ToolCommand::new(ALIGN_STAGE, &self.rhubarb_path)
            .args(["-f", "json", "-o"])
            .arg(track)
            .arg(waveform)
            .args(["-r", "phonetic"])
    }

    /// Transcode `audio` to `waveform`, then align it into `track`. Either stage failing,
    /// or finishing without writing its output file, is a `ToolExecution` error naming
    /// the stage.
    pub async fn align(&self, audio: &Path, waveform: &Path, track: &Path) -> PipelineResult<()> {
        let started = Instant::now();

        self.runner
            .run(&self.transcode_command(audio, waveform))
            .await?;
        ensure_output(TRANSCODE_STAGE, waveform).await?;
        info!(
            target: "avatar::lipsync",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "converted {} to WAV",
            audio.display()
        );

        self.runner.run(&self.align_command(waveform, track)).await?;
        ensure_output(ALIGN_STAGE, track).await?;
        info!(
            target: "avatar::lipsync",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "lip-sync generated for {}",
            waveform.display()
        );
        Ok(())
    }
}

async fn ensure_output(stage: &str, path: &Path) -> PipelineResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(PipelineError::ToolExecution {
            stage: stage.to_string(),
            status: Some(0),
            diagnostics: format!("produced no output at {}", path.display()),
        }),
    }
}
