//! Apple Pay Merchant Validation
//!
//! Posts the merchant descriptor to the validation URL Apple handed the
//! sheet, authenticating with the merchant identity certificate. The peer's
//! certificate chain is verified against the system roots; the client
//! certificate only authenticates us.

use async_trait::async_trait;
use reqwest::{Client, Identity, Url};

use crate::config::{ClientCertificate, MerchantDescriptor};
use crate::error::{GatewayError, Result, Stage};

/// Raw upstream response relayed to the caller unchanged
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UpstreamBody {
    pub(crate) async fn read(stage: Stage, response: reqwest::Response) -> Result<Self> {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::transport(stage, e))?
            .to_vec();

        Ok(Self { content_type, bytes })
    }
}

/// Build the error for a non-2xx upstream response
pub(crate) async fn rejected(stage: Stage, response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.json::<serde_json::Value>().await.ok();
    tracing::error!(%stage, status, "Upstream rejected request");
    GatewayError::Upstream { stage, status, body }
}

/// Exchanges a validation URL for an opaque merchant session
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, validation_url: &Url) -> Result<UpstreamBody>;
}

/// `SessionValidator` calling Apple over mutual TLS
pub struct AppleMerchantValidator {
    client: Client,
    merchant: MerchantDescriptor,
}

impl AppleMerchantValidator {
    /// Load the certificate/key pair and build a mutually-authenticated client
    pub fn new(
        certificate: &ClientCertificate,
        merchant: MerchantDescriptor,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let identity = load_identity(certificate)?;

        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("TLS client: {}", e)))?;

        Ok(Self::with_client(client, merchant))
    }

    /// Use a preconfigured client
    pub fn with_client(client: Client, merchant: MerchantDescriptor) -> Self {
        Self { client, merchant }
    }

    pub fn merchant(&self) -> &MerchantDescriptor {
        &self.merchant
    }
}

fn load_identity(certificate: &ClientCertificate) -> Result<Identity> {
    let read = |path: &std::path::Path| {
        std::fs::read(path).map_err(|e| {
            GatewayError::ValidationUnavailable(format!("cannot read {}: {}", path.display(), e))
        })
    };

    let mut pem = read(certificate.cert_path.as_path())?;
    pem.push(b'\n');
    pem.extend(read(certificate.key_path.as_path())?);

    Identity::from_pem(&pem)
        .map_err(|e| GatewayError::ValidationUnavailable(format!("invalid certificate/key pair: {}", e)))
}

#[async_trait]
impl SessionValidator for AppleMerchantValidator {
    async fn validate(&self, validation_url: &Url) -> Result<UpstreamBody> {
        tracing::info!(host = ?validation_url.host_str(), "Requesting merchant session");

        let response = self
            .client
            .post(validation_url.clone())
            .json(&self.merchant)
            .send()
            .await
            .map_err(|e| GatewayError::transport(Stage::MerchantValidation, e))?;

        if !response.status().is_success() {
            return Err(rejected(Stage::MerchantValidation, response).await);
        }

        UpstreamBody::read(Stage::MerchantValidation, response).await
    }
}
