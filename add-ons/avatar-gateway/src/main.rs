//! Axum gateway for the talking avatar. Exposes the reply pipeline over HTTP:
//! `POST /chat` returns the enriched segments, `GET /voices` proxies the TTS catalogue.

use avatar_voice::{
    run_preflight, AvatarConfig, CannedReplies, ProcessRunner, ReplyPipeline, ReplySegment,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ReplyPipeline>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    messages: Vec<ReplySegment>,
}

/// Clients only ever see this generic body; the cause goes to the log.
fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}

/// Pre-flight: config, credentials, ffmpeg/rhubarb and canned fixtures. Prints the report.
async fn run_verify(config: &AvatarConfig) -> Result<(), String> {
    let report = run_preflight(config, &ProcessRunner).await;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("[avatar-gateway] could not render report: {}", e),
    }
    if report.is_ready() {
        Ok(())
    } else {
        Err(report.user_advice.join("; "))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[avatar-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AvatarConfig::from_env();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify(&config).await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    if !config.has_credentials() {
        tracing::warn!("OPENAI_API_KEY or ELEVEN_LABS_API_KEY missing: /chat will answer with the canned API-key reply");
    }

    let canned = match CannedReplies::load(&config.fixtures_dir).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("canned replies unavailable: {}", e);
            std::process::exit(1);
        }
    };
    let pipeline = match ReplyPipeline::from_config(&config, canned) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("pipeline setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let app = build_app(AppState {
        pipeline: Arc::new(pipeline),
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Avatar gateway listening on {}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested (Ctrl+C)");
        }
    }
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/voices", get(voices))
        .route("/chat", post(chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Hello World!"
}

async fn voices(State(state): State<AppState>) -> Response {
    match state.pipeline.voices().await {
        Ok(catalogue) => Json(catalogue).into_response(),
        Err(e) => {
            tracing::error!(kind = e.kind(), "voice listing failed: {}", e);
            internal_error()
        }
    }
}

/// A missing or unreadable body is treated like an empty message.
async fn chat(State(state): State<AppState>, body: Option<Json<ChatRequest>>) -> Response {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    match state.pipeline.respond(request.message.as_deref()).await {
        Ok(messages) => Json(ChatResponse { messages }).into_response(),
        // respond() already logged the failure with its request id
        Err(_) => internal_error(),
    }
}
