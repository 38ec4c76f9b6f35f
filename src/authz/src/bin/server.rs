//! # Hats HTTP Server
//!
//! REST surface over the hats lifecycle controller, plus health and metrics.
//!
//! ## Endpoints
//!
//! - `POST /v1/tophats` - Create a top hat worn by the caller
//! - `POST /v1/hats` - Create a hat under an admin
//! - `GET /v1/hats/:id` - Hat record and current holders
//! - `GET /v1/hats/:id/active` - Live active status
//! - `GET /v1/hats/:id/wearers/:identity` - Wearing, standing and admin status
//! - `POST /v1/hats/:id/mint` - Mint to a wearer
//! - `POST /v1/hats/:id/transfer` - Move a unit between wearers
//! - `POST /v1/hats/:id/renounce` - Caller gives up the hat
//! - `POST /v1/hats/:id/status` - Set active status
//! - `POST /v1/hats/:id/wearers/:identity/status` - Set wearer eligibility and standing
//! - `GET /v1/events` - Recent notifications
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics (metrics port)
//!
//! Callers identify themselves with the `x-hats-caller` header. The gateway in
//! front of this server is trusted to have authenticated it.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `METRICS_PORT` - Metrics server port (default: 9090)
//! - `RUST_LOG` - Log level (default: info)
//! - `HATS_EVENT_LOG_CAPACITY` - Notifications kept in memory (default: 10000)
//! - `HATS_AUTHORITY_TIMEOUT_MS` - Authority query timeout, 0 disables (default: 5000)

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use hats_authz::{
    EventRecord, Hat, HatId, Hats, HatsConfig, HatsError, Identity, NewHat, VERSION,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CALLER_HEADER: &str = "x-hats-caller";

/// Shared application state
#[derive(Clone)]
struct AppState {
    hats: Hats,
    start_time: std::time::Instant,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
enum AppError {
    Hats(HatsError),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Hats(err) => (status_for(&err), err.kind(), err.to_string()),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<HatsError> for AppError {
    fn from(err: HatsError) -> Self {
        AppError::Hats(err)
    }
}

fn status_for(err: &HatsError) -> StatusCode {
    match err {
        HatsError::NotAdmin { .. }
        | HatsError::NotWearer { .. }
        | HatsError::NotEligibilityAuthority { .. }
        | HatsError::NotStatusAuthority { .. } => StatusCode::FORBIDDEN,
        HatsError::NotFound(_) => StatusCode::NOT_FOUND,
        HatsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        HatsError::ExternalAuthorityFailure { .. } => StatusCode::BAD_GATEWAY,
        HatsError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        HatsError::AllHatsWorn { .. }
        | HatsError::AllLevelsUsed { .. }
        | HatsError::DepthExceeded { .. }
        | HatsError::AlreadyWearingHat { .. }
        | HatsError::NotEligible { .. }
        | HatsError::HatNotActive(_)
        | HatsError::Immutable(_)
        | HatsError::NewMaxSupplyTooLow { .. }
        | HatsError::StaleAuthorityQuery(_)
        | HatsError::DomainsExhausted => StatusCode::CONFLICT,
    }
}

/// Caller identity taken from the `x-hats-caller` header
struct Caller(Identity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| AppError::BadRequest(format!("missing {} header", CALLER_HEADER)))?
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{} header is not text", CALLER_HEADER)))?
            .trim();

        if value.is_empty() {
            return Err(AppError::BadRequest(format!("empty {} header", CALLER_HEADER)));
        }

        Ok(Caller(Identity::new(value)))
    }
}

fn parse_hat(raw: &str) -> Result<HatId, AppError> {
    raw.parse::<HatId>()
        .map_err(|e| AppError::BadRequest(format!("invalid hat id '{}': {}", raw, e)))
}

#[derive(Debug, Deserialize)]
struct TopHatRequest {
    details: String,
    #[serde(default)]
    image_uri: String,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: HatId,
    path: String,
}

impl CreatedResponse {
    fn new(id: HatId) -> Self {
        Self { id, path: id.path() }
    }
}

#[derive(Debug, Serialize)]
struct HatView {
    #[serde(flatten)]
    hat: Hat,
    path: String,
    level: usize,
    wearers: Vec<Identity>,
}

#[derive(Debug, Serialize)]
struct WearerView {
    hat: HatId,
    wearer: Identity,
    balance: u64,
    wearing: bool,
    good_standing: bool,
    admin: bool,
}

#[derive(Debug, Serialize)]
struct ActiveView {
    hat: HatId,
    active: bool,
}

#[derive(Debug, Deserialize)]
struct MintRequest {
    wearer: Identity,
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    from: Identity,
    to: Identity,
}

#[derive(Debug, Deserialize)]
struct HatStatusRequest {
    active: bool,
}

#[derive(Debug, Deserialize)]
struct WearerStatusRequest {
    eligible: bool,
    standing: bool,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    since: Option<u64>,
    hat: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
    top_hats: u32,
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// POST /v1/tophats
async fn create_top_hat(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<TopHatRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = state
        .hats
        .create_top_hat(&caller, req.details, req.image_uri)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(id))))
}

/// POST /v1/hats
async fn create_hat(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<NewHat>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = state.hats.create_hat(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(id))))
}

/// GET /v1/hats/:id
async fn view_hat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HatView>, AppError> {
    let id = parse_hat(&id)?;
    let hat = state.hats.view(id).await?;
    let wearers = state.hats.holders(id).await?;

    Ok(Json(HatView {
        path: id.path(),
        level: id.level(),
        hat,
        wearers,
    }))
}

/// GET /v1/hats/:id/active
async fn hat_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActiveView>, AppError> {
    let hat = parse_hat(&id)?;
    let active = state.hats.is_active(hat).await?;
    Ok(Json(ActiveView { hat, active }))
}

/// GET /v1/hats/:id/wearers/:identity
async fn view_wearer(
    State(state): State<AppState>,
    Path((id, identity)): Path<(String, String)>,
) -> Result<Json<WearerView>, AppError> {
    let hat = parse_hat(&id)?;
    let wearer = Identity::new(identity);

    let wearing = state.hats.is_wearer_of_hat(&wearer, hat).await?;
    let good_standing = state.hats.is_in_good_standing(&wearer, hat).await?;
    let admin = state.hats.is_admin_of_hat(&wearer, hat).await?;
    let balance = state.hats.balance_of(&wearer, hat).await;

    Ok(Json(WearerView {
        hat,
        wearer,
        balance,
        wearing,
        good_standing,
        admin,
    }))
}

/// POST /v1/hats/:id/mint
async fn mint(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<MintRequest>,
) -> Result<StatusCode, AppError> {
    let hat = parse_hat(&id)?;
    state.hats.mint(&caller, hat, &req.wearer).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/hats/:id/transfer
async fn transfer(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<TransferRequest>,
) -> Result<StatusCode, AppError> {
    let hat = parse_hat(&id)?;
    state.hats.transfer_hat(&caller, hat, &req.from, &req.to).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/hats/:id/renounce
async fn renounce(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let hat = parse_hat(&id)?;
    state.hats.renounce(&caller, hat).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/hats/:id/status
async fn set_hat_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<HatStatusRequest>,
) -> Result<StatusCode, AppError> {
    let hat = parse_hat(&id)?;
    state.hats.set_hat_status(&caller, hat, req.active).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/hats/:id/wearers/:identity/status
async fn set_wearer_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path((id, identity)): Path<(String, String)>,
    Json(req): Json<WearerStatusRequest>,
) -> Result<StatusCode, AppError> {
    let hat = parse_hat(&id)?;
    let wearer = Identity::new(identity);
    state
        .hats
        .set_hat_wearer_status(&caller, hat, &wearer, req.eligible, req.standing)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/events
async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventRecord>>, AppError> {
    let log = state.hats.events();
    let mut records = match query.since {
        Some(sequence) => log.since(sequence),
        None => log.history(),
    };

    if let Some(raw) = query.hat {
        let hat = parse_hat(&raw)?;
        records.retain(|record| record.event.hat() == hat);
    }

    Ok(Json(records))
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: uptime,
        version: VERSION.to_string(),
        top_hats: state.hats.top_hat_count().await,
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let mut metrics = format!(
        "# HELP hats_uptime_seconds Server uptime in seconds\n\
         # TYPE hats_uptime_seconds gauge\n\
         hats_uptime_seconds {}\n\
         \n\
         # HELP hats_version Server version info\n\
         # TYPE hats_version gauge\n\
         hats_version{{version=\"{}\"}} 1\n\
         \n",
        uptime, VERSION
    );

    if let Some(controller) = state.hats.export_prometheus().await {
        metrics.push_str(&controller);
    }

    MetricsResponse { metrics }
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/tophats", post(create_top_hat))
        .route("/v1/hats", post(create_hat))
        .route("/v1/hats/:id", get(view_hat))
        .route("/v1/hats/:id/active", get(hat_active))
        .route("/v1/hats/:id/mint", post(mint))
        .route("/v1/hats/:id/transfer", post(transfer))
        .route("/v1/hats/:id/renounce", post(renounce))
        .route("/v1/hats/:id/status", post(set_hat_status))
        .route("/v1/hats/:id/wearers/:identity", get(view_wearer))
        .route("/v1/hats/:id/wearers/:identity/status", post(set_wearer_status))
        .route("/v1/events", get(events))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Create the metrics router
fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hats Server v{}", VERSION);

    let port: u16 = env_or("PORT", 8080);
    let metrics_port: u16 = env_or("METRICS_PORT", 9090);
    let event_log_capacity: usize = env_or("HATS_EVENT_LOG_CAPACITY", 10_000);
    let timeout_ms: u64 = env_or("HATS_AUTHORITY_TIMEOUT_MS", 5_000);

    info!("Configuration:");
    info!("  Port: {}", port);
    info!("  Metrics Port: {}", metrics_port);
    info!("  Event Log Capacity: {}", event_log_capacity);
    info!("  Authority Timeout: {}ms", timeout_ms);

    let config = HatsConfig {
        enable_metrics: true,
        event_log_capacity,
        authority_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
    };

    let state = AppState {
        hats: Hats::new(config),
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let metrics_app = create_metrics_router(state);
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));

    info!("Starting HTTP server on {}", addr);
    info!("Starting metrics server on {}", metrics_addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server on {}", addr))?;

    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics server on {}", metrics_addr))?;

    let server = serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());

    let metrics_server = serve(metrics_listener, metrics_app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async { server.await.context("HTTP server error") },
        async { metrics_server.await.context("metrics server error") }
    )?;

    info!("Servers shut down gracefully");
    Ok(())
}
