// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("BSON error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Invalid id format: {0}")]
    InvalidObjectId(#[from] mongodb::bson::oid::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment request not found")]
    PaymentNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Payment already approved")]
    AlreadyApproved,

    #[error("Payment already rejected")]
    AlreadyRejected,

    #[error("Cannot reject an approved payment")]
    CannotRejectApproved,

    #[error("A payment with this transaction id already exists")]
    DuplicateTransaction,

    #[error("Insufficient SMS credits: {remaining} remaining")]
    InsufficientCredits { remaining: i64 },

    #[error("Admin authentication required")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account inactive")]
    AccountInactive,

    #[error("SMS delivery failed: {0}")]
    SmsDeliveryFailed(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
            AppError::Bson(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            AppError::PaymentNotFound => (StatusCode::NOT_FOUND, "Payment not found"),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AppError::AlreadyApproved => (StatusCode::CONFLICT, "Payment already approved"),
            AppError::AlreadyRejected => (StatusCode::CONFLICT, "Payment already rejected"),
            AppError::CannotRejectApproved => (StatusCode::CONFLICT, "Cannot reject an approved payment"),
            AppError::DuplicateTransaction => (StatusCode::CONFLICT, "Duplicate transaction id"),
            AppError::InsufficientCredits { .. } => (StatusCode::PAYMENT_REQUIRED, "Insufficient SMS credits"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AppError::AccountInactive => (StatusCode::FORBIDDEN, "Account inactive"),
            AppError::SmsDeliveryFailed(_) => (StatusCode::BAD_GATEWAY, "Failed to send SMS"),
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "External API error"),
            AppError::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            AppError::ServiceError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Service error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        AppError::ServiceError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
