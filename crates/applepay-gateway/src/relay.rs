//! Relay
//!
//! The two gateway operations: merchant validation and tokenize-then-charge.
//! Each request is independent; the relay holds only read-only state.

use std::sync::Arc;

use applepay_core::{ChargeTotal, PayRequest, ValidateSessionRequest};

use crate::config::{GatewayConfig, ValidationPolicy};
use crate::error::{GatewayError, Result};
use crate::merchant::{AppleMerchantValidator, SessionValidator, UpstreamBody};
use crate::processor::{minor_unit_exponent, ChargeRequest, CheckoutComProcessor, PaymentProcessor};

/// Gateway service shared by the HTTP handlers
pub struct Relay {
    validator: Option<Arc<dyn SessionValidator>>,
    processor: Arc<dyn PaymentProcessor>,
    policy: ValidationPolicy,
    order_reference: String,
    default_charge: ChargeTotal,
}

impl Relay {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        policy: ValidationPolicy,
        order_reference: impl Into<String>,
        default_charge: ChargeTotal,
    ) -> Self {
        Self {
            validator: None,
            processor,
            policy,
            order_reference: order_reference.into(),
            default_charge,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SessionValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Build the production relay.
    ///
    /// A missing or unreadable certificate leaves merchant validation
    /// disabled rather than failing startup; `/pay` still works.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let processor = CheckoutComProcessor::new(
            config.processor_base_url.clone(),
            config.public_key.clone(),
            config.secret_key.clone(),
            config.upstream_timeout,
        )?;

        let relay = Self::new(
            Arc::new(processor),
            config.validation.clone(),
            config.order_reference.clone(),
            config.default_charge.clone(),
        );

        match AppleMerchantValidator::new(&config.certificate, config.merchant.clone(), config.upstream_timeout) {
            Ok(validator) => Ok(relay.with_validator(Arc::new(validator))),
            Err(e) => {
                tracing::warn!(error = %e, "Merchant validation disabled");
                Ok(relay)
            }
        }
    }

    pub fn validation_configured(&self) -> bool {
        self.validator.is_some()
    }

    pub fn processor_name(&self) -> &str {
        self.processor.name()
    }

    /// `POST /validateSession`: one outbound call, body relayed unchanged
    pub async fn validate_session(&self, request: &ValidateSessionRequest) -> Result<UpstreamBody> {
        let url = self.policy.check(&request.apple_url)?;
        let validator = self
            .validator
            .as_ref()
            .ok_or_else(|| GatewayError::ValidationUnavailable("client certificate not loaded".into()))?;

        let body = validator.validate(&url).await?;
        tracing::info!(bytes = body.bytes.len(), "Merchant session relayed");
        Ok(body)
    }

    /// `POST /pay`: tokenize, then charge only if tokenization succeeded
    pub async fn pay(&self, request: &PayRequest) -> Result<UpstreamBody> {
        let payment = &request.details;
        if let Some(field) = payment.first_missing_field() {
            tracing::warn!(field, "Payment payload incomplete");
            return Err(GatewayError::MissingField(field));
        }
        let (Some(billing), Some(shipping)) = (&payment.billing_contact, &payment.shipping_contact) else {
            return Err(GatewayError::MissingField("billingContact"));
        };

        let total = request.total.as_ref().unwrap_or(&self.default_charge);
        let (amount, currency) = self.charge_amount(total)?;

        let token = self.processor.tokenize(&payment.token.payment_data).await?;
        tracing::info!(processor = self.processor.name(), "Payment tokenized");

        let charge = ChargeRequest::new(&token, billing, shipping, amount, currency, self.order_reference.clone());
        let body = self.processor.charge(&charge).await?;
        tracing::info!(amount, currency = %charge.currency, reference = %charge.reference, "Charge submitted");

        Ok(body)
    }

    fn charge_amount(&self, total: &ChargeTotal) -> Result<(i64, String)> {
        let currency = total.currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(GatewayError::InvalidRequest(format!(
                "currency '{}' is not an ISO 4217 code",
                total.currency
            )));
        }

        let amount = total
            .amount
            .to_minor_units(minor_unit_exponent(&currency))
            .filter(|minor| *minor > 0)
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("amount {} cannot be charged in {}", total.amount, currency))
            })?;

        Ok((amount, currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MerchantDescriptor;
    use crate::error::Stage;
    use applepay_core::{Amount, Payment};
    use reqwest::Client;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_json, body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn relay_for(server: &MockServer) -> Relay {
        let processor = CheckoutComProcessor::with_client(Client::new(), server.uri(), "pk_test", "sk_test");
        let policy = ValidationPolicy {
            hosts: vec!["127.0.0.1".into()],
            require_https: false,
        };
        let validator = AppleMerchantValidator::with_client(Client::new(), MerchantDescriptor::default());

        Relay::new(
            Arc::new(processor),
            policy,
            "ORD-5023-4E89",
            ChargeTotal {
                amount: Amount::parse("10.00").unwrap(),
                currency: "GBP".into(),
            },
        )
        .with_validator(Arc::new(validator))
    }

    fn pay_request(total: Option<ChargeTotal>) -> PayRequest {
        let details: Payment = serde_json::from_value(serde_json::json!({
            "token": {
                "paymentData": {
                    "version": "EC_v1",
                    "data": "ZW5jcnlwdGVk",
                    "signature": "c2lnbmF0dXJl",
                    "header": {
                        "ephemeralPublicKey": "k1",
                        "publicKeyHash": "h1",
                        "transactionId": "t1"
                    }
                }
            },
            "billingContact": {
                "addressLines": ["10 Downing Street", "Westminster"],
                "locality": "London",
                "administrativeArea": "London",
                "postalCode": "SW1A 2AA",
                "countryCode": "GB"
            },
            "shippingContact": {
                "addressLines": ["221B Baker Street", ""],
                "locality": "London",
                "administrativeArea": "London",
                "postalCode": "NW1 6XE",
                "countryCode": "GB",
                "emailAddress": "buyer@example.com"
            }
        }))
        .unwrap();

        PayRequest { details, total }
    }

    fn charge_response() -> serde_json::Value {
        serde_json::json!({
            "id": "pay_mbabizu24mvu3mela5njyhpit4",
            "action_id": "act_mbabizu24mvu3mela5njyhpit4",
            "amount": 1500,
            "currency": "GBP",
            "approved": true,
            "status": "Authorized",
            "response_code": "10000",
            "response_summary": "Approved",
            "reference": "ORD-5023-4E89"
        })
    }

    #[tokio::test]
    async fn test_validate_session_relays_body_byte_for_byte() {
        let server = MockServer::start().await;
        let raw = "{ \"merchantSessionIdentifier\" : \"SSH1\",\n  \"nonce\":\"abc\" }";
        Mock::given(method("POST"))
            .and(path("/paymentservices/startSession"))
            .and(body_json(serde_json::json!({
                "merchantIdentifier": "merchant.test.example.com",
                "domainName": "integrationcko.ngrok.io",
                "displayName": "johnny"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(raw, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        let request = ValidateSessionRequest {
            apple_url: format!("{}/paymentservices/startSession", server.uri()),
        };
        let body = relay.validate_session(&request).await.unwrap();

        assert_eq!(body.bytes, raw.as_bytes());
    }

    #[tokio::test]
    async fn test_validate_session_refuses_unlisted_host() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        let request = ValidateSessionRequest {
            apple_url: "https://attacker.example.com/startSession".into(),
        };
        let err = relay.validate_session(&request).await.unwrap_err();

        assert_eq!(err.code(), "VALIDATION_HOST_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_validate_session_without_certificate() {
        let server = MockServer::start().await;
        let processor = CheckoutComProcessor::with_client(Client::new(), server.uri(), "pk", "sk");
        let relay = Relay::new(
            Arc::new(processor),
            ValidationPolicy::default(),
            "ORD",
            ChargeTotal {
                amount: Amount::parse("1").unwrap(),
                currency: "GBP".into(),
            },
        );
        let request = ValidateSessionRequest {
            apple_url: "https://apple-pay-gateway.apple.com/paymentservices/startSession".into(),
        };

        assert!(!relay.validation_configured());
        let err = relay.validate_session(&request).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_pay_tokenizes_then_charges() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .and(header("authorization", "Bearer pk_test"))
            .and(body_json(serde_json::json!({
                "type": "applepay",
                "token_data": {
                    "version": "EC_v1",
                    "data": "ZW5jcnlwdGVk",
                    "signature": "c2lnbmF0dXJl",
                    "header": {
                        "ephemeralPublicKey": "k1",
                        "publicKeyHash": "h1",
                        "transactionId": "t1"
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "type": "applepay",
                "token": "tok_ubfj2q76miwundwlk72vxt2i7q",
                "expires_on": "2026-10-16T10:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(header("authorization", "Bearer sk_test"))
            .and(body_partial_json(serde_json::json!({
                "source": {
                    "type": "token",
                    "token": "tok_ubfj2q76miwundwlk72vxt2i7q",
                    "billing_address": {
                        "address_line1": "10 Downing Street",
                        "address_line2": "Westminster",
                        "city": "London",
                        "zip": "SW1A 2AA",
                        "country": "GB"
                    }
                },
                "customer": {"email": "buyer@example.com"},
                "shipping": {"address": {"address_line1": "221B Baker Street", "zip": "NW1 6XE"}},
                "amount": 1500,
                "currency": "GBP",
                "reference": "ORD-5023-4E89"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(charge_response()))
            .expect(1)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        let total = ChargeTotal {
            amount: Amount::parse("15.00").unwrap(),
            currency: "GBP".into(),
        };
        let body = relay.pay(&pay_request(Some(total))).await.unwrap();

        let relayed: serde_json::Value = serde_json::from_slice(&body.bytes).unwrap();
        assert_eq!(relayed, charge_response());

        let received = server.received_requests().await.unwrap();
        let paths: Vec<_> = received.iter().map(|r| r.url.path().to_string()).collect();
        assert_eq!(paths, vec!["/tokens", "/payments"]);
    }

    #[tokio::test]
    async fn test_failed_tokenization_skips_charge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "request_id": "req_1",
                "error_type": "request_invalid",
                "error_codes": ["token_data_invalid"]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(charge_response()))
            .expect(0)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        let err = relay.pay(&pay_request(None)).await.unwrap_err();

        assert_eq!(err.code(), "UPSTREAM_REJECTED");
        assert_eq!(err.upstream_body().unwrap()["error_codes"][0], "token_data_invalid");
    }

    #[tokio::test]
    async fn test_incomplete_payload_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        let mut request = pay_request(None);
        request.details.token.payment_data.header.public_key_hash.clear();

        let err = relay.pay(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingField("token.paymentData.header.publicKeyHash")));
    }

    #[tokio::test]
    async fn test_default_charge_when_no_total() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "tok_1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(body_partial_json(serde_json::json!({"amount": 1000, "currency": "GBP"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(charge_response()))
            .expect(1)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        relay.pay(&pay_request(None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_uncharged_amounts() {
        let server = MockServer::start().await;
        let relay = relay_for(&server);

        let zero = ChargeTotal {
            amount: Amount::ZERO,
            currency: "GBP".into(),
        };
        assert!(matches!(relay.pay(&pay_request(Some(zero))).await, Err(GatewayError::InvalidRequest(_))));

        let fractional_yen = ChargeTotal {
            amount: Amount::parse("100.50").unwrap(),
            currency: "JPY".into(),
        };
        assert!(matches!(relay.pay(&pay_request(Some(fractional_yen))).await, Err(GatewayError::InvalidRequest(_))));

        let bad_currency = ChargeTotal {
            amount: Amount::parse("1").unwrap(),
            currency: "POUNDS".into(),
        };
        assert!(matches!(relay.pay(&pay_request(Some(bad_currency))).await, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_hung_processor_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"token": "tok_1"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
        let processor = CheckoutComProcessor::with_client(client, server.uri(), "pk", "sk");
        let relay = Relay::new(
            Arc::new(processor),
            ValidationPolicy::default(),
            "ORD",
            ChargeTotal {
                amount: Amount::parse("10").unwrap(),
                currency: "GBP".into(),
            },
        );

        let err = relay.pay(&pay_request(None)).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_TIMEOUT");
    }

    #[tokio::test]
    async fn test_charge_rejection_after_tokenization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "tok_1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "request_id": "req_2",
                "error_type": "processing_error",
                "error_codes": ["service_unavailable"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let relay = relay_for(&server);
        let err = relay.pay(&pay_request(None)).await.unwrap_err();

        assert!(matches!(err, GatewayError::Upstream { stage: Stage::Charge, status: 503, .. }));
        assert_eq!(err.code(), "UPSTREAM_REJECTED");
        assert_eq!(err.status_code(), 502);
        assert!(err.is_retryable());
        assert_eq!(err.upstream_body().unwrap()["error_codes"][0], "service_unavailable");
    }

    #[tokio::test]
    async fn test_charge_timeout_after_tokenization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "tok_1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(charge_response())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = Client::builder().timeout(Duration::from_millis(500)).build().unwrap();
        let processor = CheckoutComProcessor::with_client(client, server.uri(), "pk", "sk");
        let relay = Relay::new(
            Arc::new(processor),
            ValidationPolicy::default(),
            "ORD",
            ChargeTotal {
                amount: Amount::parse("10").unwrap(),
                currency: "GBP".into(),
            },
        );

        let err = relay.pay(&pay_request(None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(Stage::Charge)));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_unreachable_processor() {
        // Bind then release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let uri = format!("http://127.0.0.1:{}", port);

        let processor = CheckoutComProcessor::with_client(Client::new(), uri, "pk", "sk");
        let relay = Relay::new(
            Arc::new(processor),
            ValidationPolicy::default(),
            "ORD",
            ChargeTotal {
                amount: Amount::parse("10").unwrap(),
                currency: "GBP".into(),
            },
        );

        let err = relay.pay(&pay_request(None)).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_UNREACHABLE");
        assert!(err.upstream_body().is_none());
    }
}
