//! Account management endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

use super::auth::{invalid_json, AuthUser};
use super::{ApiError, AppState, Envelope};
use crate::auth::{AuthError, NewAccount};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/all", get(all_users))
        .route("/users/get/{id}", get(get_user))
        .route("/users/add", post(add_user))
        .route("/users/delete/{user_id}", post(delete_user))
        .route("/users/password", post(change_password))
}

async fn all_users(State(state): State<AppState>, _auth: AuthUser) -> Result<impl IntoResponse, ApiError> {
    let users = state.auth.list_accounts().await?;
    Ok(Json(Envelope::ok("success", users)))
}

async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.auth.find_account(&id).await?;
    Ok(Json(Envelope::ok("success", user)))
}

/// Register a new account
async fn add_user(
    State(state): State<AppState>,
    payload: Result<Json<NewAccount>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;

    let user = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok("user created", user))))
}

/// Hard-delete the caller's own account together with its tokens
async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.account.user_id != user_id {
        warn!(caller = %auth.account.user_id, target = %user_id, "refused to delete another account");
        return Err(AuthError::Forbidden.into());
    }
    state.auth.delete_account(&user_id).await?;
    Ok(Json(Envelope::message("User deleted")))
}

#[derive(Debug, Deserialize)]
struct PasswordChange {
    password: String,
}

/// Change the caller's own password
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<PasswordChange>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;

    state
        .auth
        .reset_password(&auth.account.user_id, &req.password)
        .await?;
    Ok(Json(Envelope::message("password updated")))
}
