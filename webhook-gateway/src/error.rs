//! Terminal pipeline errors and how they surface to webhook senders.
//!
//! Senders only ever see the status code and the short public message.
//! The inner detail is for our own logs.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that short-circuit the webhook pipeline.
///
/// Business failures inside a handler are not listed here: handlers turn
/// them into a failed `ProcessingResult` instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("service query parameter missing")]
    MissingServiceParameter,

    #[error("signature verification failed: {reason}")]
    VerificationFailed { reason: String },

    #[error("body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingServiceParameter => StatusCode::BAD_REQUEST,
            GatewayError::VerificationFailed { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::MissingServiceParameter => "Service name required",
            GatewayError::VerificationFailed { .. } => "Invalid signature",
            GatewayError::PayloadTooLarge { .. } => "Payload too large",
            GatewayError::MalformedPayload(_) => "Invalid payload",
            GatewayError::Unexpected(_) => "Internal server error",
        }
    }
}

impl From<crate::event::ParseError> for GatewayError {
    fn from(err: crate::event::ParseError) -> Self {
        GatewayError::MalformedPayload(err.to_string())
    }
}
