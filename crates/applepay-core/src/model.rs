//! Wire Model
//!
//! Types exchanged between the payment sheet, the storefront controller and
//! the relay gateway. Field names follow Apple Pay JS (camelCase) so values
//! can be handed to and read from `ApplePaySession` unchanged.

use serde::{Deserialize, Serialize};

use crate::money::Amount;

// ============================================================================
// Sheet configuration
// ============================================================================

/// Whether an amount is final or still an estimate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemType {
    #[default]
    Final,
    Pending,
}

/// A labelled amount shown on the sheet (total, subtotal, shipping)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub amount: Amount,
    #[serde(rename = "type", default)]
    pub kind: LineItemType,
}

impl LineItem {
    pub fn final_item(label: impl Into<String>, amount: Amount) -> Self {
        Self {
            label: label.into(),
            amount,
            kind: LineItemType::Final,
        }
    }
}

/// A shipping choice offered on the sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Display name (e.g. "Express Shipping")
    pub label: String,

    /// Price of the option
    pub amount: Amount,

    /// Secondary display text (e.g. "Arrives in 1-2 days")
    #[serde(default)]
    pub detail: String,

    /// Opaque identifier echoed back when selected
    pub identifier: String,
}

impl ShippingOption {
    pub fn new(
        label: impl Into<String>,
        amount: Amount,
        detail: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            amount,
            detail: detail.into(),
            identifier: identifier.into(),
        }
    }
}

/// Contact fields the sheet must collect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactField {
    PostalAddress,
    Name,
    Phone,
    Email,
}

/// Session configuration handed to the platform when the sheet opens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub country_code: String,
    pub currency_code: String,
    pub merchant_capabilities: Vec<String>,
    pub supported_networks: Vec<String>,
    pub shipping_type: String,
    pub required_billing_contact_fields: Vec<ContactField>,
    pub required_shipping_contact_fields: Vec<ContactField>,
    pub total: LineItem,
}

/// Reply to a shipping-contact change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingContactUpdate {
    pub new_shipping_methods: Vec<ShippingOption>,
    pub new_total: LineItem,
    pub new_line_items: Vec<LineItem>,
}

/// Reply to a shipping-method change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethodUpdate {
    pub new_total: LineItem,
    pub new_line_items: Vec<LineItem>,
}

// ============================================================================
// Authorized payment
// ============================================================================

/// Header of the encrypted payment token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDataHeader {
    #[serde(default)]
    pub ephemeral_public_key: String,
    #[serde(default)]
    pub public_key_hash: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_data: Option<String>,
}

/// Encrypted payment data produced by the device
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentData {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub header: PaymentDataHeader,
}

/// Apple Pay payment token
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentToken {
    #[serde(default)]
    pub payment_data: PaymentData,

    /// Card display details; passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_identifier: Option<String>,
}

/// Billing or shipping contact collected by the sheet
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentContact {
    #[serde(default)]
    pub address_lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl PaymentContact {
    /// Address line by index, if the sheet supplied one
    pub fn address_line(&self, index: usize) -> Option<&str> {
        self.address_lines.get(index).map(String::as_str)
    }
}

/// Everything the sheet hands over once the buyer authorizes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub token: PaymentToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_contact: Option<PaymentContact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_contact: Option<PaymentContact>,
}

impl Payment {
    /// Name of the first required field that is absent or blank
    pub fn first_missing_field(&self) -> Option<&'static str> {
        let data = &self.token.payment_data;
        let required = [
            ("token.paymentData.version", data.version.as_str()),
            ("token.paymentData.data", data.data.as_str()),
            ("token.paymentData.signature", data.signature.as_str()),
            ("token.paymentData.header.ephemeralPublicKey", data.header.ephemeral_public_key.as_str()),
            ("token.paymentData.header.publicKeyHash", data.header.public_key_hash.as_str()),
            ("token.paymentData.header.transactionId", data.header.transaction_id.as_str()),
        ];

        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Some(*name);
        }
        if self.billing_contact.is_none() {
            return Some("billingContact");
        }
        if self.shipping_contact.is_none() {
            return Some("shippingContact");
        }
        None
    }
}

// ============================================================================
// Relay gateway requests / responses
// ============================================================================

/// Body of `POST /validateSession`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSessionRequest {
    pub apple_url: String,
}

/// Amount the buyer authorized on the sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeTotal {
    pub amount: Amount,
    pub currency: String,
}

/// Body of `POST /pay`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayRequest {
    pub details: Payment,

    /// Sheet total; the gateway falls back to its configured charge when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<ChargeTotal>,
}

/// The parts of a processor charge response the storefront acts on
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub response_summary: Option<String>,
}

impl PaymentOutcome {
    /// Human-readable reason for a declined charge
    pub fn decline_reason(&self) -> String {
        match (&self.response_summary, &self.response_code, &self.status) {
            (Some(summary), Some(code), _) => format!("{} ({})", summary, code),
            (Some(summary), None, _) => summary.clone(),
            (None, Some(code), _) => format!("Declined ({})", code),
            (None, None, Some(status)) => status.clone(),
            (None, None, None) => "Declined".into(),
        }
    }
}

/// Error body returned by the relay gateway
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<serde_json::Value>,
}
