use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("delivery {0} not found")]
    DeliveryNotFound(Uuid),

    #[error("batch {0} not found")]
    BatchNotFound(Uuid),

    #[error("no financial account for user {0}")]
    AccountNotFound(Uuid),

    #[error("payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("payment split {0} not found")]
    SplitNotFound(Uuid),

    #[error("debt record {0} not found")]
    DebtNotFound(Uuid),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("invalid otp")]
    InvalidOtp,

    #[error("delivery {0} is already delivered")]
    AlreadyDelivered(Uuid),

    #[error("batch {0} is already assigned")]
    AlreadyAssigned(Uuid),

    #[error("{0} is already settled")]
    AlreadySettled(String),

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, independent of the human-readable detail.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::UserNotFound(_)
            | AppError::DeliveryNotFound(_)
            | AppError::BatchNotFound(_)
            | AppError::AccountNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::SplitNotFound(_)
            | AppError::DebtNotFound(_) => "not_found",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::InvalidOtp => "invalid_otp",
            AppError::AlreadyDelivered(_) => "already_delivered",
            AppError::AlreadyAssigned(_) => "already_assigned",
            AppError::AlreadySettled(_) => "already_settled",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::ConcurrencyConflict(_) => "concurrency_conflict",
            AppError::Persistence(_) => "persistence_error",
            AppError::Config(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Lost a race; the whole operation may be retried from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UserNotFound(_)
            | AppError::DeliveryNotFound(_)
            | AppError::BatchNotFound(_)
            | AppError::AccountNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::SplitNotFound(_)
            | AppError::DebtNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } | AppError::InvalidOtp => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::AlreadyDelivered(_)
            | AppError::AlreadyAssigned(_)
            | AppError::AlreadySettled(_) => StatusCode::CONFLICT,
            AppError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConcurrencyConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
