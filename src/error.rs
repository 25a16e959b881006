//! Gateway error taxonomy.
//!
//! Every failure a handler or middleware can produce is a [`GatewayError`].
//! Callers branch on [`GatewayError::kind`] (and, for validation failures, on
//! the [`ValidationRule`]) rather than on message text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::security::rate_limit::RateLimitDecision;
use crate::storage::StoreError;

/// Coarse classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    RateLimited,
    NotFound,
    Storage,
    Timeout,
}

/// The input rule a validation failure violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    MissingFile,
    UnsupportedContentType,
    FileTooLarge,
    InvalidKey,
    InvalidPattern,
    InvalidTtl,
    InvalidTransform,
    MissingLocation,
    InvalidBody,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation {
        rule: ValidationRule,
        message: String,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("rate limit exceeded")]
    RateLimited(RateLimitDecision),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
    },
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn validation(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self::Validation {
            rule,
            message: message.into(),
        }
    }

    /// Adapter for `map_err` on store calls.
    pub fn storage(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Storage { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The violated rule, for validation failures.
    pub fn rule(&self) -> Option<ValidationRule> {
        match self {
            Self::Validation { rule, .. } => Some(*rule),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Storage | ErrorKind::Timeout => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the caller. Backend details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Storage { .. } | Self::Timeout { .. } => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<ValidationRule>,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage { operation, source } => {
                tracing::error!(operation = %operation, error = %source, "Storage operation failed");
            }
            Self::Timeout {
                operation,
                elapsed_ms,
            } => {
                tracing::error!(operation = %operation, elapsed_ms = elapsed_ms, "Storage operation timed out");
            }
            _ => {}
        }

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                kind: self.kind(),
                rule: self.rule(),
                message: self.public_message(),
            },
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let Self::RateLimited(decision) = &self {
            decision.apply_headers(response.headers_mut());
        }
        response
    }
}
