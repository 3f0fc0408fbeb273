//! HTTP error type: every failure leaves the API as `{"detail": "..."}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use engine::{AlertError, ForecastError, QuoteError};
use persistence::DbError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, detail = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(format!("Not enough data to predict: {err}"))
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<QuoteError> for ApiError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::InvalidSymbol(_) => ApiError::BadRequest(err.to_string()),
            QuoteError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            QuoteError::Fetch { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(format!("Database error: {other}")),
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::InvalidCondition(_)
            | AlertError::InvalidTarget(_)
            | AlertError::InvalidSymbol(_) => ApiError::BadRequest(err.to_string()),
            AlertError::UnknownUser(_) => ApiError::NotFound(err.to_string()),
            AlertError::Db(db) => db.into(),
        }
    }
}
