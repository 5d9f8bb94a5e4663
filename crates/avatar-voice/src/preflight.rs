//! Pre-flight check: verify credentials, external tools and canned fixtures before
//! serving traffic.
//!
//! The gateway runs this for `--verify`. The report is JSON-serializable so it can be
//! printed or returned as-is.

use crate::config::AvatarConfig;
use crate::fixtures::CannedReplies;
use crate::tools::{ToolCommand, ToolRunner};
use serde::Serialize;
use std::path::Path;

/// Result of probing one external executable.
#[derive(Debug, Clone, Serialize)]
pub struct ToolProbe {
    pub name: &'static str,
    pub path: String,
    pub available: bool,
    /// First line the tool printed for its version flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub config_valid: bool,
    pub credentials_present: bool,
    pub tools: Vec<ToolProbe>,
    pub missing_fixtures: Vec<String>,
    /// Hints for the operator, one per problem found.
    pub user_advice: Vec<String>,
}

impl PreflightReport {
    pub fn is_ready(&self) -> bool {
        self.config_valid
            && self.credentials_present
            && self.tools.iter().all(|t| t.available)
            && self.missing_fixtures.is_empty()
    }
}

/// Run all checks. Never fails; problems are reported in the result.
pub async fn run_preflight(config: &AvatarConfig, runner: &dyn ToolRunner) -> PreflightReport {
    let mut user_advice = Vec::new();

    let config_valid = match config.validate() {
        Ok(()) => true,
        Err(e) => {
            user_advice.push(e.to_string());
            false
        }
    };

    let credentials_present = config.has_credentials();
    if config.llm_api_key.is_none() {
        user_advice.push("OPENAI_API_KEY is not set; chat requests get the canned API-key reply.".to_string());
    }
    if config.tts_api_key.is_none() {
        user_advice.push("ELEVEN_LABS_API_KEY is not set; chat requests get the canned API-key reply.".to_string());
    }

    let tools = vec![
        probe(runner, "ffmpeg", &config.ffmpeg_path, "-version").await,
        probe(runner, "rhubarb", &config.rhubarb_path, "--version").await,
    ];
    for tool in tools.iter().filter(|t| !t.available) {
        user_advice.push(format!(
            "{} not runnable at '{}'. Install it or set {}_PATH.",
            tool.name,
            tool.path,
            tool.name.to_uppercase()
        ));
    }

    let missing_fixtures: Vec<String> = CannedReplies::fixture_paths(&config.fixtures_dir)
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| p.display().to_string())
        .collect();
    if !missing_fixtures.is_empty() {
        user_advice.push(format!(
            "Canned reply fixtures missing in '{}' (set AVATAR_FIXTURES_DIR).",
            config.fixtures_dir.display()
        ));
    }

    PreflightReport {
        config_valid,
        credentials_present,
        tools,
        missing_fixtures,
        user_advice,
    }
}

async fn probe(runner: &dyn ToolRunner, name: &'static str, path: &Path, flag: &str) -> ToolProbe {
    let command = ToolCommand::new(format!("{} probe", name), path).arg(flag);
    match runner.run(&command).await {
        Ok(stdout) => ToolProbe {
            name,
            path: path.display().to_string(),
            available: true,
            version: stdout
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            error: None,
        },
        Err(e) => ToolProbe {
            name,
            path: path.display().to_string(),
            available: false,
            version: None,
            error: Some(e.to_string()),
        },
    }
}
