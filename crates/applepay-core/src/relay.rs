//! Relay Gateway Client
//!
//! The sheet controller reaches the relay gateway through [`RelayClient`],
//! so the state machine can run against the HTTP client in the browser and
//! against fakes in tests.

use async_trait::async_trait;

use crate::error::{CheckoutError, Result};
use crate::model::{PayRequest, PaymentOutcome, RelayErrorBody, ValidateSessionRequest};

/// Calls made by the controller on the relay gateway
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait RelayClient {
    /// Exchange a validation URL for an opaque merchant session
    async fn validate_session(&self, validation_url: &str) -> Result<serde_json::Value>;

    /// Relay an authorized payment and read back the charge outcome
    async fn pay(&self, request: &PayRequest) -> Result<PaymentOutcome>;
}

/// `RelayClient` speaking JSON over HTTP to the gateway
#[derive(Clone, Debug)]
pub struct HttpRelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRelayClient {
    /// Create a client for a gateway at `base_url` (e.g. `https://shop.example.com`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_error(response: reqwest::Response) -> CheckoutError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<RelayErrorBody>(&text) {
            Ok(body) => CheckoutError::Relay {
                status,
                code: Some(body.code),
                message: body.error,
            },
            Err(_) => CheckoutError::Relay {
                status,
                code: None,
                message: if text.is_empty() { format!("HTTP {}", status) } else { text },
            },
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl RelayClient for HttpRelayClient {
    async fn validate_session(&self, validation_url: &str) -> Result<serde_json::Value> {
        let body = ValidateSessionRequest {
            apple_url: validation_url.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint("/validateSession"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn pay(&self, request: &PayRequest) -> Result<PaymentOutcome> {
        let response = self
            .client
            .post(self.endpoint("/pay"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        Ok(response.json().await?)
    }
}
