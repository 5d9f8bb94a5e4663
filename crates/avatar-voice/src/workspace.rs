//! Per-request scratch directory for intermediate audio and lip-sync artifacts.
//!
//! Every request gets its own directory under the work root, so concurrent requests
//! never touch each other's `message_<index>.*` files. The directory is removed when the
//! workspace is dropped.

use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

pub struct RequestWorkspace {
    request_id: Uuid,
    dir: TempDir,
}

impl RequestWorkspace {
    /// Create `<root>/req-<request_id>-XXXXXX`, creating `root` if needed.
    pub async fn create(root: &Path, request_id: Uuid) -> PipelineResult<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| PipelineError::filesystem(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("req-{}-", request_id))
            .tempdir_in(root)
            .map_err(|e| PipelineError::filesystem(root, e))?;
        Ok(Self { request_id, dir })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Synthesized speech for segment `index`.
    pub fn audio_path(&self, index: usize) -> PathBuf {
        self.artifact(index, "mp3")
    }

    /// Transcoded waveform fed to the aligner.
    pub fn waveform_path(&self, index: usize) -> PathBuf {
        self.artifact(index, "wav")
    }

    /// Aligner JSON output.
    pub fn lipsync_path(&self, index: usize) -> PathBuf {
        self.artifact(index, "json")
    }

    fn artifact(&self, index: usize, extension: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("message_{}.{}", index, extension))
    }
}
