//! REST API server for PressLedger
//!
//! Exposes the ledger (`/blockchain/*`) and the resolved article cards
//! (`/dashboard/*`) over HTTP.

use axum::{
    extract::{Path, Query, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{append_shared, payload_from_value, Block, ChainAudit, SharedLedger};
use crate::card::Card;
use crate::error::LedgerError;
use crate::resolver::{CardList, Resolver};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: SharedLedger,
    pub resolver: Resolver,
    started: Instant,
}

impl AppState {
    pub fn new(ledger: SharedLedger, resolver: Resolver) -> Self {
        Self {
            ledger,
            resolver,
            started: Instant::now(),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    InvalidInput(String),
    NotFound(String),
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(LedgerError::InvalidPayload(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(LedgerError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Ledger(LedgerError::Conflict(msg)) => (StatusCode::CONFLICT, msg),
            ApiError::Ledger(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub block: Block,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
}

impl ListQuery {
    /// Anything other than a positive integer selects the default.
    fn limit(&self) -> Option<usize> {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| *l > 0)
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware. Logs method, path, status and duration.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route("/blockchain/mine", post(mine_block))
        .route("/blockchain/chain", get(get_chain))
        .route("/blockchain/validate", get(validate_chain))
        .route("/blockchain/audit", get(audit_chain))
        .route("/blockchain/verify/:hash", get(verify_block))
        // Article endpoints
        .route("/dashboard/latest", get(latest_article))
        .route("/dashboard/list", get(list_articles))
        .route("/dashboard/all", get(all_articles))
        .route("/dashboard/article/:cid", get(get_article))
        // System endpoints
        .route("/", get(root))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
        .layer(cors)
}

/// Serves the API on `0.0.0.0:<port>` until the listener fails.
pub async fn run_api_server(state: Arc<AppState>, port: u16) -> Result<(), LedgerError> {
    let app = build_api_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| LedgerError::Storage(format!("API server failed: {}", e)))
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn root() -> impl IntoResponse {
    Json(json!({"message": "Backend is running successfully"}))
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let blocks = state.ledger.read().await.len();
    Json(json!({
        "status": "healthy",
        "blocks": blocks,
        "uptime_seconds": state.started.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn mine_block(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<MineResponse>), ApiError> {
    let payload = payload_from_value(body)?;
    let block = append_shared(&state.ledger, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(MineResponse {
            message: "Block mined".to_string(),
            block,
        }),
    ))
}

/// Reloads the shared ledger so other writers of the same file are observed.
async fn reloaded_snapshot(state: &AppState) -> Vec<Block> {
    let mut ledger = state.ledger.write().await;
    ledger.reload();
    ledger.snapshot()
}

async fn get_chain(State(state): State<Arc<AppState>>) -> Json<Vec<Block>> {
    Json(reloaded_snapshot(&state).await)
}

async fn validate_chain(State(state): State<Arc<AppState>>) -> Json<ValidateResponse> {
    let mut ledger = state.ledger.write().await;
    ledger.reload();
    Json(ValidateResponse {
        valid: ledger.validate(),
    })
}

async fn audit_chain(State(state): State<Arc<AppState>>) -> Json<ChainAudit> {
    let mut ledger = state.ledger.write().await;
    ledger.reload();
    Json(ledger.audit())
}

async fn verify_block(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> (StatusCode, Json<VerifyResponse>) {
    let found = reloaded_snapshot(&state)
        .await
        .into_iter()
        .find(|b| b.hash == hash);

    match found {
        Some(block) => (
            StatusCode::OK,
            Json(VerifyResponse {
                verified: true,
                message: "Block found in blockchain.".to_string(),
                block_index: Some(block.index),
                block_data: Some(Value::Object(block.data)),
                timestamp: Some(block.timestamp),
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(VerifyResponse {
                verified: false,
                message: "No block found with the given hash.".to_string(),
                block_index: None,
                block_data: None,
                timestamp: None,
            }),
        ),
    }
}

async fn latest_article(State(state): State<Arc<AppState>>) -> Result<Json<Card>, ApiError> {
    state
        .resolver
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No articles found in blockchain".to_string()))
}

async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<CardList> {
    Json(state.resolver.list(query.limit()).await)
}

async fn all_articles(State(state): State<Arc<AppState>>) -> Json<CardList> {
    Json(state.resolver.all().await)
}

async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(cid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.resolver.article(&cid).await.map(Json).ok_or_else(|| {
        ApiError::BadGateway("Unable to fetch metadata from IPFS for provided CID".to_string())
    })
}
