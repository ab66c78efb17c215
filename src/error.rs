use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Request-level error taxonomy. Every failure a handler can produce
/// maps onto one of these; nothing else reaches the wire.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldViolation>),
    #[error("authentication failed")]
    AuthFailed,
    #[error("not found")]
    NotFound,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApiError {
    pub fn violation(field: &'static str, message: impl Into<String>) -> FieldViolation {
        FieldViolation {
            field,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(violations) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": violations })),
            )
                .into_response(),
            ApiError::AuthFailed => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "authentication failed" })),
            )
                .into_response(),
            // 404 and 401 respond with an empty body. The 401 in
            // particular never explains itself to the caller.
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Persistence(detail) => {
                error!(%detail, "store write failed");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "write failed" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            // Only user inserts can collide, so the duplicate key is
            // always the email.
            StoreError::Duplicate => {
                ApiError::Validation(vec![ApiError::violation("email", "already in use")])
            }
            StoreError::Backend(e) => ApiError::Persistence(e.to_string()),
        }
    }
}

/// `Json` wrapper whose rejection is part of the error taxonomy: a body
/// that fails to parse or deserialize answers 400, not axum's 422.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rej: JsonRejection| {
                ApiError::Validation(vec![ApiError::violation("body", rej.body_text())])
            })?;
        Ok(AppJson(value))
    }
}
