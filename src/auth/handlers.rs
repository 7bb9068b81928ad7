use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RefreshRequest, TokenResponse},
        services::{verify_password, AuthUser, JwtKeys},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::repo_types::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/token/login/", post(login))
        .route("/auth/token/refresh/", post(refresh))
        .route("/auth/token/logout/", post(logout))
}

fn invalid_credentials() -> ApiError {
    ApiError::validation("Unable to log in with provided credentials.")
}

fn issue_pair(keys: &JwtKeys, user_id: i64) -> ApiResult<TokenResponse> {
    Ok(TokenResponse {
        auth_token: keys.sign_access(user_id)?,
        refresh_token: keys.sign_refresh(user_id)?,
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = payload.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid_credentials());
    };
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let tokens = issue_pair(&JwtKeys::from_ref(&state), user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(tokens))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::unauthorized("Invalid or expired refresh token")
    })?;

    if !User::exists_by_id(&state.db, claims.sub).await? {
        return Err(ApiError::unauthorized("User not found"));
    }
    Ok(Json(issue_pair(&keys, claims.sub)?))
}

/// Tokens are stateless; the client simply forgets them.
#[instrument]
pub async fn logout(AuthUser(user_id): AuthUser) -> StatusCode {
    info!(user_id, "user logged out");
    StatusCode::NO_CONTENT
}
