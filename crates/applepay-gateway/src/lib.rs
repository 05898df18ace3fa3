//! # applepay-gateway
//!
//! Server side of the Apple Pay relay.
//!
//! ## Flow
//!
//! ```text
//! validateSession:  sheet ─▶ gateway ──mTLS──▶ Apple validation URL
//!                   sheet ◀─ gateway ◀──────── opaque merchant session (unchanged)
//!
//! pay:              sheet ─▶ gateway ──pk──▶ processor /tokens    ─▶ token
//!                            gateway ──sk──▶ processor /payments  ─▶ charge response
//!                   sheet ◀─ gateway ◀────── charge response (unchanged)
//! ```
//!
//! The charge is only attempted when tokenization succeeded, and every
//! failure becomes a typed [`GatewayError`] the HTTP layer turns into a
//! structured response.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use applepay_gateway::{GatewayConfig, Relay};
//!
//! let config = GatewayConfig::from_env()?;
//! let relay = Relay::from_config(&config)?;
//!
//! let session = relay.validate_session(&request).await?;
//! let charge = relay.pay(&pay_request).await?;
//! ```

mod config;
mod error;
mod merchant;
mod processor;
mod relay;

pub use config::{
    ClientCertificate, GatewayConfig, MerchantDescriptor, ValidationPolicy, APPLE_VALIDATION_HOSTS,
    DEFAULT_PROCESSOR_BASE_URL,
};
pub use error::{GatewayError, Result, Stage};
pub use merchant::{AppleMerchantValidator, SessionValidator, UpstreamBody};
pub use processor::{
    minor_unit_exponent, Address, ChargeRequest, CheckoutComProcessor, PaymentProcessor, ProcessorToken,
};
pub use relay::Relay;
