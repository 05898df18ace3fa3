//! Gateway Error Types

use std::fmt;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Outbound call a failure belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    MerchantValidation,
    Tokenize,
    Charge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::MerchantValidation => "merchant validation",
            Stage::Tokenize => "tokenization",
            Stage::Charge => "charge",
        })
    }
}

/// Relay gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request body could not be used
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Required payment field absent or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Validation URL points outside the allowlist
    #[error("Validation host not allowed: {0}")]
    ValidationHostNotAllowed(String),

    /// Client certificate not loaded
    #[error("Merchant validation unavailable: {0}")]
    ValidationUnavailable(String),

    /// Upstream answered with a non-success status
    #[error("Upstream {stage} failed with status {status}")]
    Upstream {
        stage: Stage,
        status: u16,
        body: Option<serde_json::Value>,
    },

    /// Upstream answered 2xx with an unusable body
    #[error("Upstream {stage} returned an unexpected body: {message}")]
    MalformedUpstream { stage: Stage, message: String },

    /// Outbound call exceeded the configured timeout
    #[error("Upstream {0} timed out")]
    Timeout(Stage),

    /// Connection or transport failure
    #[error("Upstream {stage} unreachable: {message}")]
    Unreachable { stage: Stage, message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Classify a transport error from an outbound call
    pub fn transport(stage: Stage, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(stage)
        } else {
            GatewayError::Unreachable {
                stage,
                message: err.to_string(),
            }
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout(_) | GatewayError::Unreachable { .. } => true,
            GatewayError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status the gateway answers with
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_)
            | GatewayError::MissingField(_)
            | GatewayError::ValidationHostNotAllowed(_)
            | GatewayError::Json(_) => 400,
            GatewayError::ValidationUnavailable(_) => 503,
            GatewayError::Upstream { .. }
            | GatewayError::MalformedUpstream { .. }
            | GatewayError::Unreachable { .. } => 502,
            GatewayError::Timeout(_) => 504,
            GatewayError::Config(_) => 500,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) | GatewayError::MissingField(_) | GatewayError::Json(_) => {
                "INVALID_REQUEST"
            }
            GatewayError::ValidationHostNotAllowed(_) => "VALIDATION_HOST_NOT_ALLOWED",
            GatewayError::ValidationUnavailable(_) => "VALIDATION_UNAVAILABLE",
            GatewayError::Upstream { .. } => "UPSTREAM_REJECTED",
            GatewayError::MalformedUpstream { .. } => "UPSTREAM_MALFORMED",
            GatewayError::Timeout(_) => "UPSTREAM_TIMEOUT",
            GatewayError::Unreachable { .. } => "UPSTREAM_UNREACHABLE",
            GatewayError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Message safe to return to the storefront
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::InvalidRequest(_)
            | GatewayError::MissingField(_)
            | GatewayError::ValidationHostNotAllowed(_)
            | GatewayError::Json(_) => self.to_string(),
            GatewayError::ValidationUnavailable(_) => "Apple Pay merchant validation is not configured.".into(),
            GatewayError::Upstream { stage: Stage::MerchantValidation, .. } => {
                "Apple Pay rejected the merchant validation request.".into()
            }
            GatewayError::Upstream { .. } => "Payment processor rejected the request.".into(),
            GatewayError::Timeout(stage) => format!("The {} service did not respond in time.", stage),
            GatewayError::MalformedUpstream { stage, .. } | GatewayError::Unreachable { stage, .. } => {
                format!("The {} service is unavailable.", stage)
            }
            GatewayError::Config(_) => "Service configuration error.".into(),
        }
    }

    /// Upstream body worth forwarding to the caller (decline details)
    pub fn upstream_body(&self) -> Option<&serde_json::Value> {
        match self {
            GatewayError::Upstream { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}
