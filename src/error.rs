//! Error types for the Termgame Seller SDK
//!
//! This module provides the error hierarchy using `thiserror`:
//!
//! - [`ApiError`] for outbound calls to the vendor API
//! - [`WebhookError`] for inbound webhook validation and processing
//! - [`RetryError`] for operations wrapped in the retry executor
//! - [`ConfigError`] and [`StoreError`] for configuration and persisted state
//!
//! API client errors always bubble up to the caller. The webhook pipeline is the
//! only place that catches errors, and it maps them to a status code plus a
//! caller-facing message through [`WebhookError::status_code`] and
//! [`WebhookError::public_message`].

use std::time::Duration;

use thiserror::Error;

/// The main error type for Termgame Seller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Vendor API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Webhook errors
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted state errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the vendor API client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, TLS, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The vendor responded with a body that is not valid JSON
    #[error("JSON parse error: {0}")]
    Protocol(String),

    /// The vendor reported a failure (HTTP status >= 400)
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code
        status: u16,
        /// Vendor `message` field, or `HTTP Error <status>` when absent
        message: String,
    },

    /// The request could not be built (empty API key, bad path, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Transport failures, timeouts and vendor 5xx responses are transient.
    /// Malformed responses and 4xx rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            ApiError::Protocol(_) | ApiError::InvalidRequest(_) => false,
        }
    }

    /// HTTP status reported by the vendor, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classification used by the retry executor
pub trait Retryable {
    /// Returns true when the failure is transient
    fn is_retryable(&self) -> bool;
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        ApiError::is_retryable(self)
    }
}

/// Error returned by [`crate::webhook::RetryExecutor`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error
    #[error("Failed after {attempts} retries. Last error: {last}")]
    Exhausted {
        /// Number of attempts performed
        attempts: u32,
        /// The error from the final attempt
        last: E,
    },

    /// An attempt failed with an error that must not be retried
    #[error("{0}")]
    Permanent(E),

    /// The overall deadline elapsed before an attempt succeeded
    #[error("Operation timed out after {deadline:?}{}", last_error_suffix(.last))]
    TimedOut {
        /// The configured deadline
        deadline: Duration,
        /// The error from the most recent failed attempt, if any finished
        last: Option<E>,
    },
}

fn last_error_suffix<E: std::fmt::Display>(last: &Option<E>) -> String {
    match last {
        Some(e) => format!(". Last error: {}", e),
        None => String::new(),
    }
}

impl<E> RetryError<E> {
    /// The underlying error of the last attempt, if one completed
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::Permanent(last) => Some(last),
            RetryError::TimedOut { last, .. } => last.as_ref(),
        }
    }
}

/// Errors raised while validating or processing an inbound webhook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Only POST is accepted
    #[error("Method not allowed. Only POST is accepted.")]
    MethodNotAllowed,

    /// Sender address is not on the configured allowlist
    #[error("IP address not allowed")]
    IpNotAllowed,

    /// User-Agent did not match the vendor sentinel
    #[error("Invalid User-Agent")]
    InvalidUserAgent,

    /// The `x-hash` header was absent or empty
    #[error("Missing x-hash header")]
    MissingSignature,

    /// The `x-hash` header did not match the expected digest
    #[error("Invalid x-hash signature")]
    InvalidSignature,

    /// Body is not a JSON object
    #[error("Invalid JSON body: {0}")]
    InvalidPayload(String),

    /// Body parsed but carries no non-empty string `id`
    #[error("Missing transaction ID")]
    MissingTransactionId,

    /// The rate limiter denied the request
    #[error("Too many requests")]
    RateLimited,

    /// Fetching the order status from the vendor failed
    #[error("Order status lookup failed: {0}")]
    Upstream(String),

    /// Any other failure inside the pipeline
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// HTTP status code returned to the webhook sender
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::MethodNotAllowed => 405,
            WebhookError::IpNotAllowed
            | WebhookError::InvalidUserAgent
            | WebhookError::InvalidSignature => 403,
            WebhookError::MissingSignature => 401,
            WebhookError::InvalidPayload(_) | WebhookError::MissingTransactionId => 400,
            WebhookError::RateLimited => 429,
            WebhookError::Upstream(_) | WebhookError::Internal(_) => 500,
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Server-side failures collapse to a generic message; the detail is only
    /// written to the logs.
    pub fn public_message(&self) -> String {
        match self {
            WebhookError::Upstream(_) | WebhookError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the rejection is an access failure (logged as a security event)
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            WebhookError::IpNotAllowed
                | WebhookError::InvalidUserAgent
                | WebhookError::MissingSignature
                | WebhookError::InvalidSignature
        )
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// An environment variable has an unusable value
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors from persisted state (rate-limit store, event log)
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: String,
        /// Cause
        #[source]
        source: std::io::Error,
    },

    /// The stored document could not be decoded or encoded
    #[error("Corrupt store {path}: {reason}")]
    Corrupt {
        /// File being accessed
        path: String,
        /// Decoder message
        reason: String,
    },
}

/// Result type alias for Termgame Seller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for API client calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result type alias for webhook processing
pub type WebhookResult<T> = std::result::Result<T, WebhookError>;
