//! Error types for the gateway
//!
//! Every failure that can be surfaced to a caller before the upstream call is
//! made is an [`AppError`] variant. Non-fatal failures (accounting and log
//! persistence) never reach this type; they are logged where they happen.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::security::VaultError;
use crate::store::{ModelKind, ProviderKind, StoreError};
use crate::translate::TranslateError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Request identity was not resolved")]
    IdentityMissing,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Connection not found for model")]
    ConnectionNotFound,

    #[error("Provider not found for model")]
    ProviderNotFound,

    #[error("This endpoint only supports {expected} providers, model is served by {actual}")]
    ProviderTypeMismatch {
        expected: ProviderKind,
        actual: ProviderKind,
    },

    #[error("Model is not an {expected} model")]
    ModelKindMismatch {
        expected: ModelKind,
        actual: ModelKind,
    },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Translation(#[from] TranslateError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl AppError {
    /// HTTP status and stable error code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AppError::IdentityMissing => (StatusCode::INTERNAL_SERVER_ERROR, "IDENTITY_MISSING"),
            AppError::ModelNotFound(_) => (StatusCode::NOT_FOUND, "MODEL_NOT_FOUND"),
            AppError::ConnectionNotFound => (StatusCode::NOT_FOUND, "CONNECTION_NOT_FOUND"),
            AppError::ProviderNotFound => (StatusCode::NOT_FOUND, "PROVIDER_NOT_FOUND"),
            AppError::ProviderTypeMismatch { .. } => {
                (StatusCode::BAD_REQUEST, "PROVIDER_TYPE_MISMATCH")
            }
            AppError::ModelKindMismatch { .. } => (StatusCode::BAD_REQUEST, "MODEL_KIND_MISMATCH"),
            // A master key that is not 32 bytes once decoded
            AppError::Vault(VaultError::InvalidKeyLength { .. } | VaultError::InvalidKeyEncoding) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_KEY_LENGTH")
            }
            AppError::Vault(VaultError::DecryptionFailed | VaultError::EncryptionFailed) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DECRYPTION_FAILED")
            }
            AppError::Translation(_) => (StatusCode::BAD_REQUEST, "TRANSLATION_FAILED"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Driver detail stays in the logs, never in the response body.
        let message = match &self {
            AppError::Store(_) => "Store service error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
