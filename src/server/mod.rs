//! HTTP surface for identity reconciliation.
//!
//! Routes:
//! - `POST /identify` (also mounted at `/api/identify`)
//! - `GET /` and `GET /healthz`

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, warn};

pub mod types;

use crate::db::Database;
use crate::error::{Error, ErrorKind};
use crate::identity::{ContactSummary, Reconciler};
use types::{ApiResponse, HealthResponse, IdentifyRequest};

/// Message for every failure the caller did not cause.
pub const GENERIC_FAILURE_MESSAGE: &str = "identification process failed";

/// Shared handler state. The connection is used by one request at a time.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    reconciler: Reconciler,
}

impl AppState {
    pub fn new(db: Database, reconciler: Reconciler) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            reconciler,
        }
    }

    /// Hands back the database once no handler holds it.
    fn into_database(self) -> Option<Database> {
        Arc::try_unwrap(self.db)
            .ok()
            .and_then(|m| m.into_inner().ok())
    }
}

fn lock(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>, Error> {
    db.lock()
        .map_err(|_| Error::internal("database mutex poisoned"))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .route("/identify", post(identify))
        .route("/api/identify", post(identify))
        .with_state(state)
}

/// Serves until Ctrl+C, then closes the database.
pub async fn serve(db: Database, reconciler: Reconciler, bind: SocketAddr) -> Result<()> {
    let state = AppState::new(db, reconciler);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "identity service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match state.into_database() {
        Some(db) => db.close()?,
        None => warn!("database still in use at shutdown; dropping connection"),
    }
    info!("identity service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn home() -> Json<&'static str> {
    Json("identity reconciliation service: POST /identify with an email and/or phoneNumber")
}

async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let contacts = tokio::task::spawn_blocking(move || {
        let db = lock(&state.db)?;
        db.count_contacts()
    })
    .await
    .map_err(|e| Error::internal(format!("health task failed: {e}")))??;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        contacts,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn identify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<ContactSummary>>, ApiError> {
    let request = parse_request(&body)?;

    let summary = tokio::task::spawn_blocking(move || {
        let db = lock(&state.db)?;
        state
            .reconciler
            .identify(&*db, request.email, request.phone_number)
    })
    .await
    .map_err(|e| Error::internal(format!("identify task failed: {e}")))??;

    info!(
        primary_contact_id = summary.primary_contact_id,
        secondaries = summary.secondary_contact_ids.len(),
        "identified contact"
    );
    Ok(Json(ApiResponse::ok(summary)))
}

/// An empty body reads as `{}` so it fails validation like any other
/// request without an email or phone number.
fn parse_request(body: &[u8]) -> Result<IdentifyRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(IdentifyRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

/// Errors at the HTTP boundary. Only validation messages reach the caller.
#[derive(Debug)]
pub enum ApiError {
    MalformedBody(String),
    Engine(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MalformedBody(detail) => {
                warn!(detail = %detail, "rejected malformed identify body");
                (StatusCode::BAD_REQUEST, "invalid JSON body".to_string())
            }
            ApiError::Engine(err) if err.kind() == ErrorKind::Validation => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Engine(err) => {
                error!(kind = %err.kind(), error = %err, "identification failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    GENERIC_FAILURE_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ApiResponse::<ContactSummary>::err(message))).into_response()
    }
}
