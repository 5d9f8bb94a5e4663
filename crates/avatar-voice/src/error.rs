//! Error types for the reply-synthesis pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while turning a user message into reply segments
#[derive(Error, Debug)]
pub enum PipelineError {
    /// LLM or TTS credentials are not configured. Recovered with a canned reply.
    #[error("Missing API credentials")]
    MissingCredentials,

    #[error("{service} error: {message}")]
    UpstreamService {
        service: &'static str,
        message: String,
    },

    #[error("{stage} failed (exit status {status:?}): {diagnostics}")]
    ToolExecution {
        stage: String,
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        PipelineError::UpstreamService {
            service,
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Stable label for operator logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingCredentials => "missing_credentials",
            PipelineError::UpstreamService { .. } => "upstream_service",
            PipelineError::ToolExecution { .. } => "tool_execution",
            PipelineError::MalformedResponse(_) => "malformed_response",
            PipelineError::Filesystem { .. } => "filesystem",
            PipelineError::Config(_) => "config",
        }
    }
}
