//! Payment-Sheet Controller
//!
//! Drives one Apple Pay sheet from open to completion as an explicit state
//! machine:
//!
//! ```text
//! Idle ──open──▶ Opened ──validate──▶ AwaitingValidation ──ok──▶ ShippingSelection ◀─┐
//!                                            │                      │   │  contact / │
//!                                          error                    │   └── method ──┘
//!                                            ▼                   authorize
//!                                   Completed(Failure)              ▼
//!                                            ▲           AwaitingAuthorization
//!                                            └──────── relay answered ──▶ Completed(..)
//!
//! any non-terminal state ──cancel──▶ Cancelled
//! any non-terminal state ──abort───▶ Completed(Failure)
//! ```
//!
//! Every relay call is awaited and both its branches lead to a defined state;
//! a failed call never leaves the sheet hanging.

use std::fmt;

use crate::error::{CheckoutError, Result};
use crate::model::{
    ChargeTotal, LineItem, PayRequest, Payment, PaymentOutcome, PaymentRequest,
    ShippingContactUpdate, ShippingMethodUpdate, ShippingOption,
};
use crate::money::Amount;
use crate::relay::RelayClient;
use crate::shop::StorefrontConfig;

/// The device/browser hosting the sheet
pub trait PaymentPlatform {
    /// Whether this platform can present an Apple Pay sheet
    fn can_make_payments(&self) -> bool;

    /// Show the native sheet for `request`
    fn present(&self, request: &PaymentRequest) -> Result<()>;
}

/// What the storefront renders in place of the pay control
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerView {
    PayButton,
    ErrorMessage,
}

/// Pick the trigger control for a platform
pub fn trigger_view<P: PaymentPlatform + ?Sized>(platform: &P) -> TriggerView {
    if platform.can_make_payments() {
        TriggerView::PayButton
    } else {
        TriggerView::ErrorMessage
    }
}

/// How a sheet session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetCompletion {
    Success(PaymentOutcome),
    Failure { reason: String },
}

impl SheetCompletion {
    pub fn is_success(&self) -> bool {
        matches!(self, SheetCompletion::Success(_))
    }

    /// `ApplePaySession.STATUS_SUCCESS` / `STATUS_FAILURE`
    pub fn status_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Lifecycle state of the sheet
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetState {
    Idle,
    Opened,
    AwaitingValidation,
    ShippingSelection,
    AwaitingAuthorization,
    Completed(SheetCompletion),
    Cancelled,
}

impl SheetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SheetState::Completed(_) | SheetState::Cancelled)
    }
}

impl fmt::Display for SheetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SheetState::Idle => "idle",
            SheetState::Opened => "opened",
            SheetState::AwaitingValidation => "awaiting validation",
            SheetState::ShippingSelection => "selecting shipping",
            SheetState::AwaitingAuthorization => "awaiting authorization",
            SheetState::Completed(_) => "completed",
            SheetState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Storefront-side controller for one sheet at a time
pub struct SheetController<R: RelayClient> {
    config: StorefrontConfig,
    relay: R,
    state: SheetState,
    /// Options priced for the last shipping contact
    offered_shipping: Vec<ShippingOption>,
    selected_shipping: Option<ShippingOption>,
    total: Amount,
}

impl<R: RelayClient> SheetController<R> {
    pub fn new(config: StorefrontConfig, relay: R) -> Self {
        let total = config.product_price;
        Self {
            config,
            relay,
            state: SheetState::Idle,
            offered_shipping: Vec::new(),
            selected_shipping: None,
            total,
        }
    }

    pub fn state(&self) -> &SheetState {
        &self.state
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    /// Total currently shown on the sheet
    pub fn current_total(&self) -> Amount {
        self.total
    }

    pub fn selected_shipping(&self) -> Option<&ShippingOption> {
        self.selected_shipping.as_ref()
    }

    fn reject(&self, event: &'static str) -> CheckoutError {
        tracing::warn!(state = %self.state, event, "Sheet event rejected");
        CheckoutError::InvalidTransition {
            from: self.state.clone(),
            event,
        }
    }

    /// Open a new sheet session on `platform`.
    ///
    /// Unsupported platforms are refused before anything is presented. A
    /// finished session may be reopened; a live one may not.
    pub fn open<P: PaymentPlatform + ?Sized>(&mut self, platform: &P) -> Result<PaymentRequest> {
        if !platform.can_make_payments() {
            tracing::info!("Apple Pay unavailable, sheet not opened");
            return Err(CheckoutError::Unsupported);
        }
        if !(self.state == SheetState::Idle || self.state.is_terminal()) {
            return Err(self.reject("open"));
        }

        let request = self.config.session_configuration();
        platform.present(&request)?;

        self.offered_shipping.clear();
        self.selected_shipping = None;
        self.total = self.config.product_price;
        self.state = SheetState::Opened;
        tracing::info!(total = %request.total.amount, currency = %request.currency_code, "Sheet opened");

        Ok(request)
    }

    /// Ask the relay to validate the merchant for this sheet.
    ///
    /// On failure the session is completed with a failure and the error is
    /// returned so the caller can abort the native sheet.
    pub async fn validate_merchant(&mut self, validation_url: &str) -> Result<serde_json::Value> {
        if self.state != SheetState::Opened {
            return Err(self.reject("validate merchant"));
        }
        self.state = SheetState::AwaitingValidation;

        match self.relay.validate_session(validation_url).await {
            Ok(session) => {
                self.state = SheetState::ShippingSelection;
                tracing::info!("Merchant validated");
                Ok(session)
            }
            Err(e) => {
                tracing::error!(error = %e, "Merchant validation failed");
                self.state = SheetState::Completed(SheetCompletion::Failure {
                    reason: e.user_message(),
                });
                Err(e)
            }
        }
    }

    /// Shipping options and totals for the buyer's region.
    ///
    /// `buyer_region` is the country code from the shipping contact; when the
    /// sheet withholds it the shop's own country is used.
    pub fn shipping_contact_selected(&mut self, buyer_region: Option<&str>) -> Result<ShippingContactUpdate> {
        if self.state != SheetState::ShippingSelection {
            return Err(self.reject("shipping contact selected"));
        }

        let region = buyer_region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.config.country_code.as_str())
            .to_string();
        let methods = self.config.available_shipping_methods(&region).to_vec();

        self.selected_shipping = methods.first().cloned();
        self.offered_shipping = methods.clone();
        let (new_total, new_line_items) = self.price()?;
        tracing::debug!(region = %region, options = methods.len(), total = %new_total.amount, "Shipping contact priced");

        Ok(ShippingContactUpdate {
            new_shipping_methods: methods,
            new_total,
            new_line_items,
        })
    }

    /// Reprice after the buyer picks a shipping option.
    ///
    /// The option is looked up by `identifier` among those offered for the
    /// current shipping contact; the price comes from the shop, never from
    /// the event.
    pub fn shipping_method_selected(&mut self, identifier: &str) -> Result<ShippingMethodUpdate> {
        if self.state != SheetState::ShippingSelection {
            return Err(self.reject("shipping method selected"));
        }

        let option = self
            .offered_shipping
            .iter()
            .find(|o| o.identifier == identifier)
            .cloned()
            .ok_or_else(|| {
                tracing::warn!(identifier, "Shipping method not offered");
                CheckoutError::UnknownShippingMethod(identifier.to_string())
            })?;

        self.selected_shipping = Some(option);
        let (new_total, new_line_items) = self.price()?;
        tracing::debug!(method = identifier, total = %new_total.amount, "Shipping method priced");

        Ok(ShippingMethodUpdate {
            new_total,
            new_line_items,
        })
    }

    /// Relay the authorized payment and complete the session.
    ///
    /// The charge is requested for the total currently on the sheet. Relay
    /// errors and declines both end in `Completed(Failure)`.
    pub async fn payment_authorized(&mut self, payment: Payment) -> Result<SheetCompletion> {
        if self.state != SheetState::ShippingSelection {
            return Err(self.reject("payment authorized"));
        }
        self.state = SheetState::AwaitingAuthorization;

        let request = PayRequest {
            details: payment,
            total: Some(ChargeTotal {
                amount: self.total,
                currency: self.config.currency_code.clone(),
            }),
        };

        let completion = match self.relay.pay(&request).await {
            Ok(outcome) if outcome.approved => {
                tracing::info!(payment_id = ?outcome.id, "Payment approved");
                SheetCompletion::Success(outcome)
            }
            Ok(outcome) => {
                let reason = outcome.decline_reason();
                tracing::warn!(payment_id = ?outcome.id, reason = %reason, "Payment declined");
                SheetCompletion::Failure { reason }
            }
            Err(e) => {
                tracing::error!(error = %e, "Payment relay failed");
                SheetCompletion::Failure {
                    reason: e.user_message(),
                }
            }
        };

        self.state = SheetState::Completed(completion.clone());
        Ok(completion)
    }

    /// Buyer dismissed the sheet
    pub fn cancel(&mut self) -> Result<()> {
        if self.state == SheetState::Idle || self.state.is_terminal() {
            return Err(self.reject("cancel"));
        }
        tracing::info!(state = %self.state, "Sheet cancelled");
        self.state = SheetState::Cancelled;
        Ok(())
    }

    /// The storefront aborted the native sheet.
    ///
    /// Ends the session with a failure so the pay button can open a new one.
    pub fn abort(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.state == SheetState::Idle || self.state.is_terminal() {
            return Err(self.reject("abort"));
        }
        let reason = reason.into();
        tracing::warn!(state = %self.state, reason = %reason, "Sheet aborted");
        self.state = SheetState::Completed(SheetCompletion::Failure { reason });
        Ok(())
    }

    /// Recompute total and line items from the current shipping choice
    fn price(&mut self) -> Result<(LineItem, Vec<LineItem>)> {
        let subtotal = self.config.product_price;
        let mut line_items = vec![LineItem::final_item("Subtotal", subtotal)];

        let total = match &self.selected_shipping {
            Some(option) => {
                line_items.push(LineItem::final_item(option.label.clone(), option.amount));
                subtotal.checked_add(option.amount)?
            }
            None => subtotal,
        };
        self.total = total;

        Ok((LineItem::final_item(self.config.shop_name.clone(), total), line_items))
    }
}
