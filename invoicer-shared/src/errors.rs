use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: OTP errors
///
/// Several causes deliberately share one code: an unknown username and a wrong
/// password both surface as `InvalidCredentials`, and every token failure
/// (bad signature, expiry, wrong `token_type`, revoked session) surfaces as
/// `TokenInvalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    Unauthorized,
    Forbidden,
    BadRequest,

    // Auth (E1xxx)
    InvalidCredentials,
    UsernameTaken,
    TokenInvalid,
    UserNotFound,

    // OTP (E2xxx)
    InvalidPurpose,
    OtpInvalid,
    OtpRateLimited,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0008",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::UsernameTaken => "E1002",
            Self::TokenInvalid => "E1005",
            Self::UserNotFound => "E1006",

            // OTP
            Self::InvalidPurpose => "E2001",
            Self::OtpInvalid => "E2002",
            Self::OtpRateLimited => "E2003",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::InvalidPurpose | Self::OtpInvalid => {
                StatusCode::BAD_REQUEST
            }
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::OtpRateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UsernameTaken => StatusCode::CONFLICT,
        }
    }
}

/// The only message a client ever sees, keyed by status.
pub fn public_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "bad request",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not found",
        StatusCode::CONFLICT => "conflict",
        StatusCode::TOO_MANY_REQUESTS => "too many requests",
        _ => "internal server error",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known { code: ErrorCode, message: String },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// `message` is for logs only; the response carries [`public_message`].
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Always a 500; `message` only reaches the log.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(anyhow::Error::msg(message.into()))
    }

    pub fn token_invalid() -> Self {
        Self::new(ErrorCode::TokenInvalid, "invalid or expired token")
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Known { code, .. } => code.status_code(),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Known { code, .. } => code.code(),
            AppError::Validation(_) => ErrorCode::ValidationError.code(),
            AppError::Internal(_) | AppError::Database(_) => ErrorCode::InternalError.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Known { code, message } if status.is_server_error() => {
                tracing::error!(code = code.code(), "{message}");
            }
            AppError::Known { code, message } => {
                tracing::warn!(code = code.code(), status = status.as_u16(), "{message}");
            }
            AppError::Internal(err) => tracing::error!(error = %err, "internal server error"),
            AppError::Database(err) => tracing::error!(error = %err, "database error"),
            AppError::Validation(msg) => tracing::warn!(error = %msg, "validation failed"),
        }

        let body = ApiErrorResponse::new(self.error_code(), public_message(status));
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn known_errors_hide_their_message() {
        let (status, json) = body_json(AppError::new(
            ErrorCode::InvalidCredentials,
            "password mismatch for alice",
        ))
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "E1001");
        assert_eq!(json["error"]["message"], "unauthorized");
    }

    #[tokio::test]
    async fn database_errors_collapse_to_500() {
        let (status, json) = body_json(AppError::Database(diesel::result::Error::NotFound)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "E0001");
        assert_eq!(json["error"]["message"], "internal server error");
    }

    #[tokio::test]
    async fn internal_errors_keep_detail_out_of_the_body() {
        let err = AppError::internal("otp delivery: smtp handshake failed");
        assert!(matches!(err, AppError::Internal(_)));

        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "E0001");
        assert_eq!(json["error"]["message"], "internal server error");
    }

    #[test]
    fn otp_failures_are_bad_requests() {
        assert_eq!(ErrorCode::OtpInvalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidPurpose.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OtpRateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn conflict_codes_map_to_409() {
        assert_eq!(ErrorCode::UsernameTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(public_message(StatusCode::CONFLICT), "conflict");
    }
}
