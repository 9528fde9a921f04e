use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::contracts::ContractError;
use crate::units::UnitsError;
use crate::validation::ValidationErrors;
use crate::wallet::WalletError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Internal server error")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Upstream(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldMessage>,
}

#[derive(Serialize)]
struct FieldMessage {
    field: String,
    message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Upstream(_) => "WALLET_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal error");
        }
        let fields = match &self {
            Self::Validation(errors) => errors
                .iter()
                .map(|e| FieldMessage {
                    field: e.field.to_string(),
                    message: e.message.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        let body = Json(ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            fields,
        });

        (status, body).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => Self::Unauthorized(err.to_string()),
            WalletError::NoSigner => Self::Unauthorized(err.to_string()),
            WalletError::NoHealthyProvider => Self::Upstream(err.to_string()),
            WalletError::Rejected(msg) => Self::Upstream(msg),
            WalletError::Provider(msg) => Self::Upstream(msg),
            WalletError::InvalidKey(msg) => Self::Internal(msg),
        }
    }
}

impl From<UnitsError> for AppError {
    fn from(err: UnitsError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<ContractError> for AppError {
    fn from(err: ContractError) -> Self {
        Self::Internal(err.to_string())
    }
}
