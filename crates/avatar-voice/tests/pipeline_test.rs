//! Integration tests for the reply pipeline, with the language model, TTS service and
//! external tools replaced by in-process doubles.

use async_trait::async_trait;
use avatar_voice::{
    Animation, CannedReplies, ChatModel, FacialExpression, IntentGenerator, LipsyncTrack,
    PipelineError, PipelineResult, ReplyPipeline, ReplySegment, SegmentMedia,
    SpeechSynthesizer, ToolCommand, ToolRunner, VisemeAligner,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Reply = Box<dyn Fn(&str) -> PipelineResult<String> + Send + Sync>;

struct ScriptedModel {
    reply: Reply,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(reply: impl Fn(&str) -> PipelineResult<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: AtomicUsize::new(0),
        })
    }

    fn fixed(raw: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(raw.to_string()))
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete_json(&self, _system: &str, user: &str) -> PipelineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(user)
    }
}

/// Writes the segment text as the "audio" so tests can trace it end to end.
#[derive(Default)]
struct EchoTts {
    calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for EchoTts {
    async fn synthesize_to_file(&self, text: &str, destination: &Path) -> PipelineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        tokio::fs::write(destination, text.as_bytes())
            .await
            .map_err(|e| PipelineError::filesystem(destination, e))
    }

    async fn list_voices(&self) -> PipelineResult<serde_json::Value> {
        Ok(serde_json::json!({ "voices": [{ "voice_id": "test" }] }))
    }
}

/// Stands in for ffmpeg (copies the clip) and rhubarb (writes a two-cue track).
#[derive(Default)]
struct FakeTools {
    fail_align_for: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl ToolRunner for FakeTools {
    async fn run(&self, command: &ToolCommand) -> PipelineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match command.stage.as_str() {
            "transcode" => {
                let input = command.arg_after("-i").unwrap();
                let output = command.args.last().unwrap();
                tokio::fs::copy(input, output).await.unwrap();
            }
            "align" => {
                let wav = command.args[4].to_string_lossy().to_string();
                if let Some(name) = self.fail_align_for {
                    if wav.ends_with(name) {
                        return Err(PipelineError::ToolExecution {
                            stage: command.stage.clone(),
                            status: Some(1),
                            diagnostics: "recognizer crashed".to_string(),
                        });
                    }
                }
                let track = serde_json::json!({
                    "metadata": { "soundFile": wav, "duration": 0.8 },
                    "mouthCues": [
                        { "start": 0.0, "end": 0.4, "value": "B" },
                        { "start": 0.4, "end": 0.8, "value": "X" }
                    ]
                });
                let output = command.arg_after("-o").unwrap();
                tokio::fs::write(output, track.to_string()).await.unwrap();
            }
            other => panic!("unexpected stage {}", other),
        }
        Ok(String::new())
    }
}

fn canned_media(tag: &str) -> SegmentMedia {
    let lipsync: LipsyncTrack = serde_json::from_value(serde_json::json!({
        "mouthCues": [{ "start": 0.0, "end": 1.0, "value": "A" }]
    }))
    .unwrap();
    SegmentMedia {
        audio: STANDARD.encode(tag),
        lipsync,
    }
}

struct Harness {
    pipeline: Arc<ReplyPipeline>,
    model: Arc<ScriptedModel>,
    tts: Arc<EchoTts>,
    tools: Arc<FakeTools>,
    work_dir: tempfile::TempDir,
}

fn harness(model: Arc<ScriptedModel>, tools: FakeTools) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let work_dir = tempfile::tempdir().unwrap();
    let tts = Arc::new(EchoTts::default());
    let tools = Arc::new(tools);
    let pipeline = ReplyPipeline::new(
        IntentGenerator::new(model.clone(), 3),
        tts.clone(),
        VisemeAligner::new(tools.clone(), "ffmpeg", "rhubarb"),
        CannedReplies::new(canned_media("intro"), canned_media("api")),
        work_dir.path(),
    );
    Harness {
        pipeline: Arc::new(pipeline),
        model,
        tts,
        tools,
        work_dir,
    }
}

fn audio_text(segment: &ReplySegment) -> String {
    let media = segment.media.as_ref().expect("segment should be enriched");
    String::from_utf8(STANDARD.decode(&media.audio).unwrap()).unwrap()
}

fn work_dir_is_empty(h: &Harness) -> bool {
    std::fs::read_dir(h.work_dir.path()).unwrap().next().is_none()
}

const THREE: &str = r#"{"messages": [
    {"text": "Hello there!", "facialExpression": "smile", "animation": "Talking_0"},
    {"text": "That sounds rough.", "facialExpression": "sad", "animation": "Crying"},
    {"text": "Want to dance?", "facialExpression": "funnyFace", "animation": "Rumba"}
]}"#;

#[tokio::test]
async fn empty_message_gets_canned_greeting_without_external_calls() {
    let h = harness(ScriptedModel::fixed(THREE), FakeTools::default());
    let pipeline = ReplyPipeline::new(
        IntentGenerator::new(h.model.clone(), 3),
        h.tts.clone(),
        VisemeAligner::new(h.tools.clone(), "ffmpeg", "rhubarb"),
        CannedReplies::new(canned_media("intro"), canned_media("api")),
        h.work_dir.path(),
    )
    .with_credentials(false);

    for message in [None, Some(""), Some("   ")] {
        for p in [&*h.pipeline, &pipeline] {
            let reply = p.respond(message).await.unwrap();
            assert_eq!(reply.len(), 1);
            assert_eq!(reply[0].text, "Hey dear... How was your day?");
            assert_eq!(reply[0].facial_expression, FacialExpression::Smile);
            assert_eq!(reply[0].animation, Animation::Talking1);
            assert_eq!(audio_text(&reply[0]), "intro");
        }
    }
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.tools.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_credentials_gets_canned_error_before_generation() {
    let model = ScriptedModel::fixed(THREE);
    let work_dir = tempfile::tempdir().unwrap();
    let pipeline = ReplyPipeline::new(
        IntentGenerator::new(model.clone(), 3),
        Arc::new(EchoTts::default()),
        VisemeAligner::new(Arc::new(FakeTools::default()), "ffmpeg", "rhubarb"),
        CannedReplies::new(canned_media("intro"), canned_media("api")),
        work_dir.path(),
    )
    .with_credentials(false);

    for message in ["hi", "tell me a story", "{\"messages\": []}"] {
        let reply = pipeline.respond(Some(message)).await.unwrap();
        assert_eq!(reply.len(), 1);
        assert_eq!(reply[0].text, "Please add your API keys!");
        assert_eq!(reply[0].facial_expression, FacialExpression::Angry);
        assert_eq!(reply[0].animation, Animation::Angry);
        assert_eq!(audio_text(&reply[0]), "api");
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_segment_is_enriched_in_index_order() {
    let h = harness(ScriptedModel::fixed(THREE), FakeTools::default());
    let reply = h.pipeline.respond(Some("I had a long day")).await.unwrap();

    assert_eq!(reply.len(), 3);
    assert_eq!(reply.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(reply[2].facial_expression, FacialExpression::FunnyFace);
    assert_eq!(reply[2].animation, Animation::Rumba);
    for segment in &reply {
        assert!(!segment.text.is_empty());
        assert_eq!(audio_text(segment), segment.text);
        let track = &segment.media.as_ref().unwrap().lipsync;
        assert!(!track.mouth_cues.is_empty());
        assert!(track
            .metadata
            .sound_file
            .ends_with(&format!("message_{}.wav", segment.index)));
    }
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.tools.calls.load(Ordering::SeqCst), 6);
    assert!(work_dir_is_empty(&h), "request workspace should be removed");
}

#[tokio::test]
async fn segment_counts_one_to_three_keep_contiguous_indices() {
    for n in 1..=3usize {
        let entries: Vec<serde_json::Value> = (0..n)
            .map(|i| serde_json::json!({ "text": format!("line {}", i), "facialExpression": "default", "animation": "Idle" }))
            .collect();
        let raw = serde_json::Value::Array(entries).to_string();
        let h = harness(ScriptedModel::new(move |_| Ok(raw.clone())), FakeTools::default());
        let reply = h.pipeline.respond(Some("go")).await.unwrap();
        assert_eq!(
            reply.iter().map(|s| s.index).collect::<Vec<_>>(),
            (0..n).collect::<Vec<_>>()
        );
    }
}

#[tokio::test]
async fn over_producing_model_is_capped_at_three() {
    let raw = r#"[
        {"text": "a", "facialExpression": "smile", "animation": "Idle"},
        {"text": "b", "facialExpression": "smile", "animation": "Idle"},
        {"text": "c", "facialExpression": "smile", "animation": "Idle"},
        {"text": "d", "facialExpression": "smile", "animation": "Idle"},
        {"text": "e", "facialExpression": "smile", "animation": "Idle"}
    ]"#;
    let h = harness(ScriptedModel::fixed(raw), FakeTools::default());
    let reply = h.pipeline.respond(Some("talk a lot")).await.unwrap();
    assert_eq!(reply.len(), 3);
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn alignment_failure_discards_the_whole_reply() {
    let h = harness(
        ScriptedModel::fixed(THREE),
        FakeTools {
            fail_align_for: Some("message_1.wav"),
            ..Default::default()
        },
    );
    let err = h.pipeline.respond(Some("hello")).await.unwrap_err();
    match err {
        PipelineError::ToolExecution { ref stage, .. } => assert_eq!(stage, "align"),
        other => panic!("expected ToolExecution, got {:?}", other),
    }
    // Segment 0 finished, segment 1 failed mid-way, segment 2 never started.
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 2);
    assert!(work_dir_is_empty(&h), "failed request must not leave artifacts");
}

#[tokio::test]
async fn generation_errors_propagate_without_synthesis() {
    let h = harness(
        ScriptedModel::new(|_| Err(PipelineError::upstream("language model", "timed out"))),
        FakeTools::default(),
    );
    let err = h.pipeline.respond(Some("hello")).await.unwrap_err();
    assert_eq!(err.kind(), "upstream_service");
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 0);

    let h = harness(ScriptedModel::fixed(r#"{"reply": "hi"}"#), FakeTools::default());
    let err = h.pipeline.respond(Some("hello")).await.unwrap_err();
    assert_eq!(err.kind(), "malformed_response");
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_do_not_share_artifacts() {
    let model = ScriptedModel::new(|user| {
        let entries: Vec<serde_json::Value> = (0..3)
            .map(|i| serde_json::json!({ "text": format!("{} #{}", user, i), "facialExpression": "smile", "animation": "Talking_2" }))
            .collect();
        Ok(serde_json::json!({ "messages": entries }).to_string())
    });
    let h = harness(model, FakeTools::default());

    let a = {
        let p = Arc::clone(&h.pipeline);
        tokio::spawn(async move { p.respond(Some("alpha")).await })
    };
    let b = {
        let p = Arc::clone(&h.pipeline);
        tokio::spawn(async move { p.respond(Some("bravo")).await })
    };
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    for (reply, user) in [(a, "alpha"), (b, "bravo")] {
        for segment in &reply {
            assert_eq!(audio_text(segment), format!("{} #{}", user, segment.index));
        }
    }
    assert!(work_dir_is_empty(&h));
}

#[tokio::test]
async fn voices_pass_through_tts_catalogue() {
    let h = harness(ScriptedModel::fixed(THREE), FakeTools::default());
    let voices = h.pipeline.voices().await.unwrap();
    assert_eq!(voices["voices"][0]["voice_id"], "test");
}
