//! HTTP API module - REST endpoints over the auth service

mod auth;
mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::{AuthError, AuthService, StoreError};
use crate::db::Database;

pub use auth::AuthUser;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthService>,
}

/// Build the API router
pub fn router(db: Arc<Database>, auth: Arc<AuthService>) -> Router {
    let state = AppState { db, auth };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(auth::router())
        .merge(users::router())
        .with_state(state)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}

/// Any http(s) origin, with credentials
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

/// Uniform JSON body for every endpoint except `/` and `/health`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: &str, data: T) -> Self {
        Self {
            error: false,
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn message(message: &str) -> Self {
        Self {
            error: false,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            error: true,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Error returned by handlers, rendered as an envelope
///
/// Public messages never reveal which authentication check failed.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Auth(e) => match e {
                AuthError::InvalidInput(e) => (StatusCode::BAD_REQUEST, e.to_string()),
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "invalid username / password".to_string(),
                ),
                AuthError::Unauthorized(_) => (
                    StatusCode::UNAUTHORIZED,
                    "invalid authentication credentials".to_string(),
                ),
                AuthError::EmailTaken => {
                    (StatusCode::CONFLICT, "email already registered".to_string())
                }
                AuthError::AccountNotFound => {
                    (StatusCode::NOT_FOUND, "account not found".to_string())
                }
                AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
                AuthError::Store(StoreError::Timeout(limit)) => {
                    error!(?limit, "storage call timed out");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "authentication unavailable".to_string(),
                    )
                }
                other => {
                    error!(error = %other, "request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_string(),
                    )
                }
            },
        };

        (status, Json(Envelope::failure(&message))).into_response()
    }
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "authd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}
