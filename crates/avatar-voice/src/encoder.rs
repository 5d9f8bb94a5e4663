//! **ArtifactEncoder / TranscriptReader**: turn on-disk artifacts into transport data.
//!
//! A missing artifact means an earlier stage did not do its job; it is reported as a
//! filesystem fault rather than a user-facing condition.

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{LipsyncTrack, SegmentMedia};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Read an audio artifact and base64-encode it.
pub async fn encode_audio(path: &Path) -> PipelineResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::filesystem(path, e))?;
    if bytes.is_empty() {
        return Err(PipelineError::filesystem(
            path,
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "audio artifact is empty"),
        ));
    }
    debug!(target: "avatar::pipeline", path = %path.display(), bytes = bytes.len(), "encoded audio");
    Ok(STANDARD.encode(bytes))
}

/// Read and parse a lip-sync timing track. A track without cues is malformed.
pub async fn read_lipsync(path: &Path) -> PipelineResult<LipsyncTrack> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::filesystem(path, e))?;
    let track: LipsyncTrack = serde_json::from_str(&data).map_err(|e| {
        PipelineError::MalformedResponse(format!("lip-sync track {}: {}", path.display(), e))
    })?;
    if track.mouth_cues.is_empty() {
        return Err(PipelineError::MalformedResponse(format!(
            "lip-sync track {} has no mouth cues",
            path.display()
        )));
    }
    Ok(track)
}

/// Encode audio and read its track together; both succeed or the segment stays bare.
pub async fn load_media(audio: &Path, lipsync: &Path) -> PipelineResult<SegmentMedia> {
    let audio = encode_audio(audio).await?;
    let lipsync = read_lipsync(lipsync).await?;
    Ok(SegmentMedia { audio, lipsync })
}
