//! Card Processor Integration
//!
//! Checkout.com-style two-step flow: the Apple Pay token data is exchanged
//! for a processor token with the public key, then the token is charged with
//! the secret key.

use std::fmt;

use applepay_core::{PaymentContact, PaymentData};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result, Stage};
use crate::merchant::{rejected, UpstreamBody};

/// Single-use token issued by the processor; never logged or persisted
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessorToken(String);

impl ProcessorToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProcessorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProcessorToken(<redacted>)")
    }
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body of `POST /tokens`
#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub token_data: &'a PaymentData,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Postal address in the processor's format
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl From<&PaymentContact> for Address {
    fn from(contact: &PaymentContact) -> Self {
        Self {
            address_line1: contact.address_line(0).map(String::from),
            address_line2: contact.address_line(1).map(String::from),
            city: contact.locality.clone(),
            state: contact.administrative_area.clone(),
            zip: contact.postal_code.clone(),
            country: contact.country_code.as_ref().map(|c| c.to_uppercase()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChargeSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub token: String,
    pub billing_address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Shipping {
    pub address: Address,
}

/// Body of `POST /payments`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub source: ChargeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<Shipping>,

    /// Minor units of `currency`
    pub amount: i64,
    pub currency: String,
    pub reference: String,
}

impl ChargeRequest {
    /// Map the sheet's contacts onto a token charge
    pub fn new(
        token: &ProcessorToken,
        billing: &PaymentContact,
        shipping: &PaymentContact,
        amount: i64,
        currency: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            source: ChargeSource {
                kind: "token",
                token: token.as_str().to_string(),
                billing_address: Address::from(billing),
            },
            customer: shipping
                .email_address
                .clone()
                .or_else(|| billing.email_address.clone())
                .map(|email| Customer { email }),
            shipping: Some(Shipping {
                address: Address::from(shipping),
            }),
            amount,
            currency: currency.into(),
            reference: reference.into(),
        }
    }
}

/// ISO 4217 minor-unit exponent
pub fn minor_unit_exponent(currency: &str) -> u32 {
    match currency.to_uppercase().as_str() {
        "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF" | "UGX"
        | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        _ => 2,
    }
}

// ============================================================================
// Processor client
// ============================================================================

/// Tokenize-then-charge processor (Strategy pattern)
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Exchange Apple Pay token data for a processor token
    async fn tokenize(&self, payment_data: &PaymentData) -> Result<ProcessorToken>;

    /// Charge a token; returns the processor's response untouched
    async fn charge(&self, request: &ChargeRequest) -> Result<UpstreamBody>;

    /// Processor name
    fn name(&self) -> &str;
}

/// `PaymentProcessor` for the Checkout.com REST API
pub struct CheckoutComProcessor {
    client: Client,
    base_url: String,
    public_key: String,
    secret_key: String,
}

impl CheckoutComProcessor {
    pub fn new(
        base_url: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(client, base_url, public_key, secret_key))
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        }
    }

    fn bearer(key: &str) -> String {
        if key.starts_with("Bearer ") {
            key.to_string()
        } else {
            format!("Bearer {}", key)
        }
    }
}

#[async_trait]
impl PaymentProcessor for CheckoutComProcessor {
    async fn tokenize(&self, payment_data: &PaymentData) -> Result<ProcessorToken> {
        let body = TokenRequest {
            kind: "applepay",
            token_data: payment_data,
        };

        let response = self
            .client
            .post(format!("{}/tokens", self.base_url))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(&self.public_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(Stage::Tokenize, e))?;

        if !response.status().is_success() {
            return Err(rejected(Stage::Tokenize, response).await);
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedUpstream {
                stage: Stage::Tokenize,
                message: e.to_string(),
            })?;

        match parsed.token {
            Some(token) if !token.is_empty() => Ok(ProcessorToken(token)),
            _ => Err(GatewayError::MalformedUpstream {
                stage: Stage::Tokenize,
                message: "response has no token".into(),
            }),
        }
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<UpstreamBody> {
        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(&self.secret_key))
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::transport(Stage::Charge, e))?;

        if !response.status().is_success() {
            return Err(rejected(Stage::Charge, response).await);
        }

        UpstreamBody::read(Stage::Charge, response).await
    }

    fn name(&self) -> &str {
        "Checkout.com"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> PaymentContact {
        PaymentContact {
            address_lines: vec!["1 Infinite Loop".into(), "Floor 2".into()],
            locality: Some("London".into()),
            administrative_area: Some("Greater London".into()),
            postal_code: Some("EC1A 1BB".into()),
            country: Some("United Kingdom".into()),
            country_code: Some("gb".into()),
            email_address: Some("buyer@example.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_address_mapping() {
        let address = Address::from(&contact());
        assert_eq!(address.address_line1.as_deref(), Some("1 Infinite Loop"));
        assert_eq!(address.address_line2.as_deref(), Some("Floor 2"));
        assert_eq!(address.city.as_deref(), Some("London"));
        assert_eq!(address.state.as_deref(), Some("Greater London"));
        assert_eq!(address.country.as_deref(), Some("GB"));

        let sparse = Address::from(&PaymentContact::default());
        assert_eq!(serde_json::to_value(&sparse).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_charge_request_shape() {
        let token = ProcessorToken::new("tok_abc");
        let request = ChargeRequest::new(&token, &contact(), &contact(), 1500, "GBP", "ORD-1");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["source"]["type"], "token");
        assert_eq!(json["source"]["token"], "tok_abc");
        assert_eq!(json["source"]["billing_address"]["zip"], "EC1A 1BB");
        assert_eq!(json["customer"]["email"], "buyer@example.com");
        assert_eq!(json["shipping"]["address"]["address_line1"], "1 Infinite Loop");
        assert_eq!(json["amount"], 1500);
        assert_eq!(json["reference"], "ORD-1");
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        assert_eq!(format!("{:?}", ProcessorToken::new("tok_secret")), "ProcessorToken(<redacted>)");
    }

    #[test]
    fn test_minor_unit_exponent() {
        assert_eq!(minor_unit_exponent("GBP"), 2);
        assert_eq!(minor_unit_exponent("jpy"), 0);
        assert_eq!(minor_unit_exponent("KWD"), 3);
    }
}
