//! **Reply segments**: the unit the pipeline produces: spoken text, presentation tags,
//! and (after enrichment) encoded audio plus a mouth-cue track for lip-sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Facial expression the avatar wears while speaking a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacialExpression {
    Smile,
    Sad,
    Angry,
    Surprised,
    FunnyFace,
    Default,
}

impl FacialExpression {
    pub const ALL: [FacialExpression; 6] = [
        FacialExpression::Smile,
        FacialExpression::Sad,
        FacialExpression::Angry,
        FacialExpression::Surprised,
        FacialExpression::FunnyFace,
        FacialExpression::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacialExpression::Smile => "smile",
            FacialExpression::Sad => "sad",
            FacialExpression::Angry => "angry",
            FacialExpression::Surprised => "surprised",
            FacialExpression::FunnyFace => "funnyFace",
            FacialExpression::Default => "default",
        }
    }

    /// Exact tag lookup (the model is told the tags verbatim).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == tag.trim())
    }
}

impl fmt::Display for FacialExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body animation clip played with a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Animation {
    #[serde(rename = "Talking_0")]
    Talking0,
    #[serde(rename = "Talking_1")]
    Talking1,
    #[serde(rename = "Talking_2")]
    Talking2,
    Crying,
    Laughing,
    Rumba,
    Idle,
    Terrified,
    Angry,
}

impl Animation {
    pub const ALL: [Animation; 9] = [
        Animation::Talking0,
        Animation::Talking1,
        Animation::Talking2,
        Animation::Crying,
        Animation::Laughing,
        Animation::Rumba,
        Animation::Idle,
        Animation::Terrified,
        Animation::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Animation::Talking0 => "Talking_0",
            Animation::Talking1 => "Talking_1",
            Animation::Talking2 => "Talking_2",
            Animation::Crying => "Crying",
            Animation::Laughing => "Laughing",
            Animation::Rumba => "Rumba",
            Animation::Idle => "Idle",
            Animation::Terrified => "Terrified",
            Animation::Angry => "Angry",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == tag.trim())
    }
}

impl fmt::Display for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mouth shapes emitted by the phonetic aligner (Preston Blair set plus `X` for rest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouthShape {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    X,
}

/// One time-stamped mouth-shape cue, in seconds from clip start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f64,
    pub end: f64,
    pub value: MouthShape,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipsyncMetadata {
    #[serde(default)]
    pub sound_file: String,
    #[serde(default)]
    pub duration: f64,
}

/// Lip-sync timing track as written by the aligner's JSON exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipsyncTrack {
    #[serde(default)]
    pub metadata: LipsyncMetadata,
    pub mouth_cues: Vec<MouthCue>,
}

/// Synthesized media attached to a segment. Audio and track travel together so a
/// segment is never half-enriched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMedia {
    /// Base64-encoded audio clip.
    pub audio: String,
    pub lipsync: LipsyncTrack,
}

/// One spoken line of the reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySegment {
    /// Zero-based position within the request; intermediate filenames derive from it.
    pub index: usize,
    pub text: String,
    pub facial_expression: FacialExpression,
    pub animation: Animation,
    #[serde(flatten)]
    pub media: Option<SegmentMedia>,
}

impl ReplySegment {
    /// A segment fresh from the language model, without audio or lip-sync yet.
    pub fn stub(
        index: usize,
        text: impl Into<String>,
        facial_expression: FacialExpression,
        animation: Animation,
    ) -> Self {
        Self {
            index,
            text: text.into(),
            facial_expression,
            animation,
            media: None,
        }
    }

    pub fn with_media(mut self, media: SegmentMedia) -> Self {
        self.media = Some(media);
        self
    }

    pub fn is_enriched(&self) -> bool {
        self.media.is_some()
    }
}
