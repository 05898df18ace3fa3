//! # applepay-core
//!
//! Storefront side of the Apple Pay relay: the wire model shared with the
//! gateway, two-digit money arithmetic, the shop configuration and the
//! payment-sheet state machine.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  validateSession  ┌───────────────┐  mTLS   ┌──────────────┐
//! │   Payment    │──────────────────▶│    Relay      │────────▶│  Apple Pay   │
//! │    Sheet     │                   │   Gateway     │         └──────────────┘
//! │ (controller) │        pay        │               │ tokens  ┌──────────────┐
//! │              │──────────────────▶│               │────────▶│  Processor   │
//! └──────────────┘                   └───────────────┘ payments└──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use applepay_core::{HttpRelayClient, SheetController, StorefrontConfig};
//!
//! let relay = HttpRelayClient::new("https://shop.example.com");
//! let mut controller = SheetController::new(StorefrontConfig::default(), relay);
//!
//! let request = controller.open(&platform)?;
//! let session = controller.validate_merchant(&validation_url).await?;
//! let update = controller.shipping_contact_selected(Some("GB"))?;
//! let completion = controller.payment_authorized(payment).await?;
//! ```

pub mod error;
pub mod model;
pub mod money;
pub mod relay;
pub mod sheet;
pub mod shop;

pub use error::{CheckoutError, Result};
pub use model::{
    ChargeTotal, LineItem, PayRequest, Payment, PaymentContact, PaymentData, PaymentDataHeader,
    PaymentOutcome, PaymentRequest, PaymentToken, RelayErrorBody, ShippingContactUpdate,
    ShippingMethodUpdate, ShippingOption, ValidateSessionRequest,
};
pub use money::{calculate_total, Amount};
pub use relay::{HttpRelayClient, RelayClient};
pub use sheet::{trigger_view, PaymentPlatform, SheetCompletion, SheetController, SheetState, TriggerView};
pub use shop::{ShippingTables, StorefrontConfig};
