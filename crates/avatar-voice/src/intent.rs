//! **IntentGenerator**: ask the language model for a short list of reply segments.
//!
//! The model is asked for JSON only. Two reply shapes are accepted: a bare array of
//! segments, or an object holding that array under `"messages"`. Anything else is
//! `MalformedResponse`.

use crate::config::{
    AvatarConfig, DEFAULT_LLM_MAX_TOKENS, DEFAULT_LLM_MODEL, DEFAULT_LLM_TEMPERATURE, MAX_SEGMENTS,
};
use crate::error::{PipelineError, PipelineResult};
use crate::segment::{Animation, FacialExpression, ReplySegment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "language model";

/// Key under which a wrapped reply carries its segment array.
pub const WRAPPER_KEY: &str = "messages";

/// Chat-completion backend that answers with a JSON document.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the assistant's raw message content for one system + user exchange.
    async fn complete_json(&self, system: &str, user: &str) -> PipelineResult<String>;
}

// OpenAI-compatible request/response
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// OpenAI chat completions in JSON-object mode.
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into().trim().to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: DEFAULT_LLM_TEMPERATURE,
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            client,
        })
    }

    /// Build from config. A missing key is allowed; the pipeline checks credentials
    /// before generating.
    pub fn from_config(config: &AvatarConfig) -> PipelineResult<Self> {
        Ok(Self::new(&config.llm_api_url, config.llm_api_key.clone().unwrap_or_default())?
            .with_model(&config.llm_model)
            .with_sampling(config.llm_temperature, config.llm_max_tokens))
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete_json(&self, system: &str, user: &str) -> PipelineResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::upstream(
                SERVICE,
                format!("chat API error {}: {}", status, body),
            ));
        }

        // A body that cannot be read is a transport failure; one that cannot be parsed is not.
        let bytes = res
            .bytes()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, format!("reading reply: {}", e)))?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::MalformedResponse(format!("chat envelope: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::MalformedResponse("chat reply has no content".to_string()))
    }
}

/// System directive fixing the output contract. Tag lists come from the enums so the
/// prompt and the parser cannot drift apart.
pub fn system_directive(max_segments: usize) -> String {
    let expressions = FacialExpression::ALL
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let animations = Animation::ALL
        .iter()
        .map(|a| a.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are a warm, playful virtual companion who talks through an animated 3D avatar.\n\
         You will always reply with a JSON array of messages, with a maximum of {max} messages, \
         wrapped in an object under the key \"{key}\".\n\
         Each message has a text, facialExpression, and animation property.\n\
         The different facial expressions are: {expressions}.\n\
         The different animations are: {animations}.",
        max = max_segments,
        key = WRAPPER_KEY,
        expressions = expressions,
        animations = animations,
    )
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default, rename = "facialExpression")]
    facial_expression: Option<Value>,
    #[serde(default)]
    animation: Option<Value>,
}

/// Parse the model's reply into at most `max_segments` segment stubs, indexed from 0.
///
/// Entries without usable text are dropped; unknown tags fall back to `default` / `Idle`.
pub fn parse_segments(raw: &str, max_segments: usize) -> PipelineResult<Vec<ReplySegment>> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| PipelineError::MalformedResponse(format!("reply is not JSON: {}", e)))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(WRAPPER_KEY) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(PipelineError::MalformedResponse(format!(
                    "expected a JSON array or an object with a \"{}\" array",
                    WRAPPER_KEY
                )))
            }
        },
        other => {
            return Err(PipelineError::MalformedResponse(format!(
                "expected a JSON array of segments, got {}",
                json_type(&other)
            )))
        }
    };

    let cap = max_segments.clamp(1, MAX_SEGMENTS);
    let mut segments = Vec::with_capacity(cap);
    let mut usable = 0usize;
    for entry in entries {
        let raw: RawSegment = match serde_json::from_value(entry) {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "avatar::intent", "skipping non-object segment: {}", e);
                continue;
            }
        };
        let text = match raw.text.as_ref().and_then(Value::as_str).map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                warn!(target: "avatar::intent", "skipping segment without text");
                continue;
            }
        };
        usable += 1;
        if segments.len() == cap {
            continue;
        }
        let facial_expression = normalize_tag(
            raw.facial_expression.as_ref(),
            FacialExpression::from_tag,
            FacialExpression::Default,
            "facialExpression",
        );
        let animation = normalize_tag(
            raw.animation.as_ref(),
            Animation::from_tag,
            Animation::Idle,
            "animation",
        );
        segments.push(ReplySegment::stub(
            segments.len(),
            text,
            facial_expression,
            animation,
        ));
    }

    if usable > cap {
        warn!(
            target: "avatar::intent",
            produced = usable,
            cap,
            "model exceeded the segment cap; extra segments dropped"
        );
    }
    if segments.is_empty() {
        return Err(PipelineError::MalformedResponse(
            "reply contains no usable segments".to_string(),
        ));
    }
    Ok(segments)
}

fn normalize_tag<T: Copy>(
    value: Option<&Value>,
    lookup: fn(&str) -> Option<T>,
    fallback: T,
    field: &str,
) -> T {
    match value.and_then(Value::as_str) {
        Some(tag) => lookup(tag).unwrap_or_else(|| {
            warn!(target: "avatar::intent", "unknown {} {:?}; using fallback", field, tag);
            fallback
        }),
        None => fallback,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Requests and normalizes reply segments for a user message.
pub struct IntentGenerator {
    model: Arc<dyn ChatModel>,
    max_segments: usize,
    directive: String,
}

impl IntentGenerator {
    pub fn new(model: Arc<dyn ChatModel>, max_segments: usize) -> Self {
        let max_segments = max_segments.clamp(1, MAX_SEGMENTS);
        Self {
            model,
            max_segments,
            directive: system_directive(max_segments),
        }
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    /// `message` must be non-empty; the orchestrator answers empty input itself.
    pub async fn generate(&self, message: &str) -> PipelineResult<Vec<ReplySegment>> {
        let raw = self.model.complete_json(&self.directive, message).await?;
        debug!(target: "avatar::intent", "model reply: {}", raw);
        parse_segments(&raw, self.max_segments)
    }
}
