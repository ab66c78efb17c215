use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest},
        password::{hash_password, verify_password},
        services::{is_valid_email, issue_token, AuthUser, TokenKeys, AUTH_SCOPE},
    },
    error::{ApiError, AppJson},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me))
        .route("/users/me/token", delete(logout))
}

/// Freshly issued tokens travel back to the caller in the `x-auth`
/// response header, mirroring the request side.
fn auth_headers(token: &str) -> Result<HeaderMap, ApiError> {
    let value = token
        .parse()
        .map_err(|_| ApiError::Persistence("token not representable as header".into()))?;
    let mut headers = HeaderMap::new();
    headers.insert("x-auth", value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> Result<(HeaderMap, Json<PublicUser>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let mut violations = Vec::new();
    if !is_valid_email(&payload.email) {
        violations.push(ApiError::violation("email", "invalid email"));
    }
    if payload.password.chars().count() < 6 {
        violations.push(ApiError::violation(
            "password",
            "must be at least 6 characters",
        ));
    }
    if violations.is_empty() && state.users.find_by_email(&payload.email).await?.is_some() {
        violations.push(ApiError::violation("email", "already in use"));
    }
    if !violations.is_empty() {
        warn!(email = %payload.email, "registration rejected");
        return Err(ApiError::Validation(violations));
    }

    let hash = hash_password(&payload.password).map_err(|e| ApiError::Persistence(e.to_string()))?;

    // Save strictly precedes token issuance: the token encodes the id
    // the store assigned.
    let user = state.users.insert(&payload.email, &hash).await?;

    let keys = TokenKeys::from_ref(&state);
    let token = issue_token(state.users.as_ref(), &keys, &user, AUTH_SCOPE).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((auth_headers(&token)?, Json(PublicUser::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> Result<(HeaderMap, Json<PublicUser>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password answer identically.
    let user = match state.users.find_by_email(&payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::AuthFailed);
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).unwrap_or(false);
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::AuthFailed);
    }

    // A new session token; earlier sessions stay valid.
    let keys = TokenKeys::from_ref(&state);
    let token = issue_token(state.users.as_ref(), &keys, &user, AUTH_SCOPE).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((auth_headers(&token)?, Json(PublicUser::from(&user))))
}

#[instrument(skip(auth))]
pub async fn me(auth: AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(&auth.user))
}

#[instrument(skip(state, auth))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    state.users.remove_token(auth.user.id, &auth.token).await?;
    info!(user_id = %auth.user.id, "user logged out");
    Ok(StatusCode::OK)
}
