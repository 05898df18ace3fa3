//! Error Types

use thiserror::Error;

use crate::sheet::SheetState;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Errors raised by the storefront side of the checkout
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Amount string is not a valid non-negative decimal
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Platform cannot present a payment sheet
    #[error("Apple Pay is not supported on this device")]
    Unsupported,

    /// Native sheet refused a call
    #[error("Payment sheet error: {0}")]
    Platform(String),

    /// Shipping method not among those offered for the buyer's region
    #[error("Unknown shipping method: {0}")]
    UnknownShippingMethod(String),

    /// Event arrived in a state that does not accept it
    #[error("Cannot handle '{event}' while {from}")]
    InvalidTransition {
        from: SheetState,
        event: &'static str,
    },

    /// Relay gateway answered with an error body
    #[error("Relay rejected request ({status}): {message}")]
    Relay {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Relay gateway could not be reached
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Network(_) => true,
            CheckoutError::Relay { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Convert to a buyer-facing message
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Unsupported => "Apple Pay is not available on this device.".into(),
            CheckoutError::Platform(_) => "Apple Pay could not be started.".into(),
            CheckoutError::Relay { message, .. } => format!("Payment could not be completed: {}", message),
            CheckoutError::Network(_) => "The payment service is unreachable. Please try again.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
