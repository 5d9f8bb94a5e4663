//! # Avatar Voice - Reply Synthesis for Talking Avatars
//!
//! Turns one user utterance into up to three reply segments, each carrying text,
//! a facial expression, an animation, synthesized speech and a mouth-cue track.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ReplyPipeline                           │
//! │  ┌────────────┐      per segment, in index order                 │
//! │  │   Intent   │   ┌────────────┐   ┌────────────┐   ┌─────────┐  │
//! │  │  Generator │ → │    TTS     │ → │   Viseme   │ → │ Encoder │  │
//! │  │  (OpenAI)  │   │(ElevenLabs)│   │  Aligner   │   │ (base64)│  │
//! │  └────────────┘   └────────────┘   └────────────┘   └─────────┘  │
//! │                                    ffmpeg, rhubarb               │
//! │  canned replies: empty input / missing credentials               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod fixtures;
pub mod intent;
pub mod lipsync;
pub mod pipeline;
pub mod preflight;
pub mod segment;
#[cfg(test)]
mod test_support;
pub mod tools;
pub mod tts;
pub mod workspace;

pub use config::{AvatarConfig, MAX_SEGMENTS};
pub use encoder::{encode_audio, load_media, read_lipsync};
pub use error::{PipelineError, PipelineResult};
pub use fixtures::CannedReplies;
pub use intent::{parse_segments, ChatModel, IntentGenerator, OpenAiChat};
pub use lipsync::VisemeAligner;
pub use pipeline::ReplyPipeline;
pub use preflight::{run_preflight, PreflightReport, ToolProbe};
pub use segment::{
    Animation, FacialExpression, LipsyncMetadata, LipsyncTrack, MouthCue, MouthShape,
    ReplySegment, SegmentMedia,
};
pub use tools::{ProcessRunner, ToolCommand, ToolRunner};
pub use tts::{ElevenLabsTts, SpeechSynthesizer};
pub use workspace::RequestWorkspace;
