//! Authentication API endpoints

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, AppState, Envelope};
use crate::auth::token::parse_bearer;
use crate::auth::{Account, AuthError, IssuedToken, Rejection};

/// Build auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/user", get(current_user))
}

/// The account behind a valid `Authorization: Bearer` header
pub struct AuthUser {
    pub account: Account,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| AuthError::Unauthorized(Rejection::MalformedHeader))?,
            ),
            None => None,
        };

        let account = state.auth.authenticate_request(header).await?;
        let token = parse_bearer(header).unwrap_or_default().to_string();

        Ok(Self { account, token })
    }
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct LoginData {
    token: IssuedToken,
    user: Account,
}

pub(super) fn invalid_json(e: JsonRejection) -> ApiError {
    debug!(error = %e, "request body rejected");
    ApiError::BadRequest("invalid json supplied, or json missing entirely".to_string())
}

/// Login with email and password
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;

    let (user, token) = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(Envelope::ok("logged in", LoginData { token, user })))
}

/// Revoke the presented token
async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    state.auth.logout(&auth.token).await?;
    Ok(Json(Envelope::message("logged out")))
}

/// The authenticated account
async fn current_user(auth: AuthUser) -> impl IntoResponse {
    Json(Envelope::ok("success", auth.account))
}
