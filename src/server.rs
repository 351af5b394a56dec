//! Chat HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer a question (`/api/chat` is an alias) |
//! | `POST` | `/lead` | Lead capture stub (`/api/lead` is an alias) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Chat contract
//!
//! Request: `{ "message": "...", "history": [{ "role": "user" | "bot", "content": "..." }] }`
//!
//! | Status | Body | When |
//! |--------|------|------|
//! | 200 | `{ "reply", "sources"? }` | answered; `sources` only when documents were read |
//! | 400 | `{ "reply" }` | empty, whitespace-only or unparseable message |
//! | 429 | `{ "reply" }` | per-client rate limit hit (`Retry-After` set) |
//! | 500 | `{ "reply" }` | oracle failure or handler panic; details are logged, never returned |
//!
//! Clients are identified by the first `X-Forwarded-For` entry, falling back
//! to the peer address.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::admission::{Admission, AdmissionController};
use crate::config::Config;
use crate::corpus::Corpus;
use crate::models::ConversationTurn;
use crate::oracle::create_oracle;
use crate::pipeline::Pipeline;

pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a question.";
pub const FAILURE_REPLY: &str = "Sorry, something went wrong. Please try again later.";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    admission: Arc<AdmissionController>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, admission: Arc<AdmissionController>) -> Self {
        Self {
            pipeline,
            admission,
        }
    }
}

/// Starts the chat server described by `config`.
///
/// Loads the corpus, creates the oracle, starts the admission sweep and
/// serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let corpus = Arc::new(Corpus::load(&config.corpus)?);
    let oracle = create_oracle(&config.oracle)?;
    let pipeline = Pipeline::new(corpus, oracle);
    let admission = Arc::new(AdmissionController::new(&config.admission));

    spawn_sweeper(
        admission.clone(),
        Duration::from_secs(config.admission.sweep_interval_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        oracle = %pipeline.oracle_name(),
        "chat server listening"
    );
    serve(listener, AppState::new(pipeline, admission)).await
}

/// Serves `state` on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/chat", post(handle_chat))
        .route("/api/chat", post(handle_chat))
        .route("/lead", post(handle_lead))
        .route("/api/lead", post(handle_lead))
        .route("/health", get(handle_health));

    with_layers(routes).with_state(state)
}

/// Wraps `routes` in the panic guard, request tracing and permissive CORS.
///
/// The panic guard sits innermost so tracing and CORS headers still apply to
/// the 500 it produces.
fn with_layers<S>(routes: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Turns a handler panic into the generic failure reply.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "request handler panicked");
    internal_error().into_response()
}

/// Periodically evicts idle identities from the admission map.
fn spawn_sweeper(admission: Arc<AdmissionController>, every: Duration) {
    if every.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = admission.sweep();
            if evicted > 0 {
                tracing::debug!(
                    evicted,
                    remaining = admission.tracked_identities(),
                    "admission sweep"
                );
            }
        }
    });
}

// ============ Client identity ============

/// Rate-limit key for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIdentity(client_identity(&parts.headers, peer)))
    }
}

/// First `X-Forwarded-For` hop, else the peer IP, else `"unknown"`.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(hop), _) => hop.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

// ============ Error response ============

/// Every non-200 chat response carries a single user-facing `reply`.
#[derive(Serialize)]
struct ReplyBody {
    reply: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    reply: String,
    retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(ReplyBody { reply: self.reply })).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

fn bad_request(reply: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        reply: reply.into(),
        retry_after: None,
    }
}

fn too_many_requests(reply: impl Into<String>, retry_after: u64) -> AppError {
    AppError {
        status: StatusCode::TOO_MANY_REQUESTS,
        reply: reply.into(),
        retry_after: Some(retry_after),
    }
}

fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        reply: FAILURE_REPLY.to_string(),
        retry_after: None,
    }
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<String>,
}

/// Handler for `POST /chat`.
///
/// Admission runs first, then the message is validated, then the pipeline
/// answers. Only admitted requests count against the caller's limits.
async fn handle_chat(
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id, client = %identity);

    let outcome: Result<Json<ChatResponse>, AppError> = async move {
        if let Admission::Rejected(rejection) = state.admission.check(&identity) {
            tracing::warn!(?rejection, "request rejected by admission control");
            return Err(too_many_requests(
                rejection.message(),
                rejection.retry_after_secs(),
            ));
        }

        let Json(request) = payload.map_err(|e| {
            tracing::debug!(error = %e, "unparseable chat body");
            bad_request(EMPTY_MESSAGE_REPLY)
        })?;

        let question = request.message.trim();
        if question.is_empty() {
            return Err(bad_request(EMPTY_MESSAGE_REPLY));
        }

        match state.pipeline.answer(question, &request.history).await {
            Ok(answer) => {
                tracing::info!(
                    tier = answer.tier.as_str(),
                    sources = ?answer.sources,
                    history = request.history.len(),
                    "answered"
                );
                Ok(Json(ChatResponse {
                    reply: answer.reply,
                    sources: answer.sources,
                }))
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "answer pipeline failed");
                Err(internal_error())
            }
        }
    }
    .instrument(span)
    .await;
    outcome
}

// ============ POST /lead ============

/// Handler for `POST /lead`.
///
/// Accepts any body and acknowledges it. Nothing is stored.
async fn handle_lead(body: axum::body::Bytes) -> Json<serde_json::Value> {
    tracing::info!(bytes = body.len(), "lead received (not persisted)");
    Json(serde_json::json!({ "success": true }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
