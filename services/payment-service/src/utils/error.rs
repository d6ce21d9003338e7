// /flight-booking/services/payment-service/src/utils/error.rs
// Centralized error handling untuk payment service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use crate::models::{BookingPaymentStatus, ErrorResponse};

/// Type alias untuk Result dengan AppError
pub type AppResult<T> = Result<T, AppError>;

/// Error dari confirmation code codec. Malformed input dari gateway itu expected,
/// jadi selalu dikembalikan sebagai value, bukan panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoded reference length {length} exceeds gateway limit {limit}")]
    EncodingTooLong { length: usize, limit: usize },

    #[error("Transaction reference cannot be decoded: {0}")]
    ParseError(String),
}

/// Application error enum dengan semua possible errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Encoding too long: reference length {length} exceeds limit {limit}")]
    EncodingTooLong { length: usize, limit: usize },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Gateway rejected request ({code}): {message}")]
    GatewayRejected { code: String, message: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid state transition: {message}")]
    InvalidStateTransition {
        message: String,
        status: Box<BookingPaymentStatus>,
    },

    #[error("Booking has paid tickets and requires a refund")]
    RequiresRefund { status: Box<BookingPaymentStatus> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shortcut untuk state-transition error dengan snapshot status saat ini
    pub fn invalid_transition(message: impl Into<String>, status: &BookingPaymentStatus) -> Self {
        AppError::InvalidStateTransition {
            message: message.into(),
            status: Box::new(status.clone()),
        }
    }

    /// Stable error code untuk client
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::EncodingTooLong { .. } => "ENCODING_TOO_LONG",
            AppError::ParseError(_) => "PARSE_ERROR",
            AppError::MalformedCallback(_) => "MALFORMED_CALLBACK",
            AppError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            AppError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            AppError::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
            AppError::GatewayRejected { .. } => "GATEWAY_REJECTED",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            AppError::RequiresRefund { .. } => "REQUIRES_REFUND",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert AppError ke HTTP response
    fn into_response(self) -> Response {
        let error_code = self.error_code();
        let (status, message, details) = match &self {
            AppError::EncodingTooLong { .. } | AppError::ParseError(_) => {
                tracing::error!("Reference codec error: {}", self);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Kode booking tidak bisa dikirim ke payment gateway".to_string(),
                    None,
                )
            }
            AppError::MalformedCallback(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Callback pembayaran tidak lengkap: {}", msg),
                None,
            ),
            AppError::SignatureInvalid(_) => {
                // Display sama seperti rejected, detail cuma ke audit log
                tracing::warn!(target: "audit", "Signature invalid surfaced to client: {}", self);
                (
                    StatusCode::BAD_REQUEST,
                    "Pembayaran ditolak".to_string(),
                    None,
                )
            }
            AppError::GatewayUnavailable(msg) => {
                tracing::error!("Gateway unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Payment gateway sedang tidak tersedia".to_string(),
                    None,
                )
            }
            AppError::GatewayTimeout(msg) => {
                tracing::error!("Gateway timeout: {}", msg);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Payment gateway tidak merespon tepat waktu".to_string(),
                    None,
                )
            }
            AppError::GatewayRejected { code, message } => (
                StatusCode::BAD_GATEWAY,
                format!("Payment gateway menolak request: {}", message),
                Some(serde_json::json!({ "gateway_code": code })),
            ),
            AppError::InvalidAmount(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                msg.clone(),
                None,
            ),
            AppError::InvalidStateTransition { message, status } => (
                StatusCode::CONFLICT,
                message.clone(),
                serde_json::to_value(status.as_ref()).ok(),
            ),
            AppError::RequiresRefund { status } => (
                StatusCode::CONFLICT,
                format!(
                    "Booking sudah dibayar sebagian ({} dari {} tiket), harus melalui refund",
                    status.paid_tickets, status.total_tickets
                ),
                serde_json::to_value(status.as_ref()).ok(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                msg.clone(),
                None,
            ),
            AppError::BadRequest(msg) | AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                None,
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg.clone(),
                None,
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                msg.clone(),
                None,
            ),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service configuration error".to_string(),
                    None,
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error_code: Some(error_code.to_string()),
            details,
        });

        (status, body).into_response()
    }
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::EncodingTooLong { length, limit } => AppError::EncodingTooLong { length, limit },
            CodecError::ParseError(msg) => AppError::ParseError(msg),
        }
    }
}

// Timeout dibedakan dari gateway down
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::GatewayTimeout(err.to_string())
        } else {
            AppError::GatewayUnavailable(err.to_string())
        }
    }
}
