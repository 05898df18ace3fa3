//! Gateway Configuration
//!
//! Loaded from the environment (a `.env` file is read by the server first).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use applepay_core::{Amount, ChargeTotal};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Apple's published merchant-validation hosts (production and sandbox)
pub const APPLE_VALIDATION_HOSTS: &[&str] = &[
    "apple-pay-gateway.apple.com",
    "cn-apple-pay-gateway.apple.com",
    "apple-pay-gateway-nc-pod1.apple.com",
    "apple-pay-gateway-nc-pod2.apple.com",
    "apple-pay-gateway-nc-pod3.apple.com",
    "apple-pay-gateway-nc-pod4.apple.com",
    "apple-pay-gateway-nc-pod5.apple.com",
    "apple-pay-gateway-pr-pod1.apple.com",
    "apple-pay-gateway-pr-pod2.apple.com",
    "apple-pay-gateway-pr-pod3.apple.com",
    "apple-pay-gateway-pr-pod4.apple.com",
    "apple-pay-gateway-pr-pod5.apple.com",
    "cn-apple-pay-gateway-sh-pod1.apple.com",
    "cn-apple-pay-gateway-sh-pod2.apple.com",
    "cn-apple-pay-gateway-sh-pod3.apple.com",
    "cn-apple-pay-gateway-tj-pod1.apple.com",
    "cn-apple-pay-gateway-tj-pod2.apple.com",
    "cn-apple-pay-gateway-tj-pod3.apple.com",
    "apple-pay-gateway-cert.apple.com",
    "cn-apple-pay-gateway-cert.apple.com",
];

pub const DEFAULT_PROCESSOR_BASE_URL: &str = "https://api.sandbox.checkout.com";

/// Merchant identity posted to Apple during validation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantDescriptor {
    pub merchant_identifier: String,
    pub domain_name: String,
    pub display_name: String,
}

impl Default for MerchantDescriptor {
    fn default() -> Self {
        Self {
            merchant_identifier: "merchant.test.example.com".into(),
            domain_name: "integrationcko.ngrok.io".into(),
            display_name: "johnny".into(),
        }
    }
}

/// PEM files of the Apple Pay merchant identity certificate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCertificate {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for ClientCertificate {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("./certificates/certificate.pem"),
            key_path: PathBuf::from("./certificates/certificate.key"),
        }
    }
}

/// Which validation URLs the gateway will call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Allowed hosts, compared case-insensitively
    pub hosts: Vec<String>,

    /// Refuse plain-http URLs
    pub require_https: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            hosts: APPLE_VALIDATION_HOSTS.iter().map(|h| h.to_string()).collect(),
            require_https: true,
        }
    }
}

impl ValidationPolicy {
    /// Parse and vet a validation URL supplied by the sheet
    pub fn check(&self, raw: &str) -> Result<reqwest::Url> {
        let url = reqwest::Url::parse(raw.trim())
            .map_err(|e| GatewayError::InvalidRequest(format!("appleUrl is not a valid URL: {}", e)))?;

        match url.scheme() {
            "https" => {}
            "http" if !self.require_https => {}
            other => {
                return Err(GatewayError::ValidationHostNotAllowed(format!("{} scheme", other)));
            }
        }

        let host = url.host_str().unwrap_or_default();
        if !self.hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)) {
            return Err(GatewayError::ValidationHostNotAllowed(host.to_string()));
        }

        Ok(url)
    }
}

/// Complete gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Processor public key (tokenization)
    pub public_key: String,

    /// Processor secret key (charges)
    pub secret_key: String,

    pub certificate: ClientCertificate,
    pub merchant: MerchantDescriptor,
    pub processor_base_url: String,
    pub validation: ValidationPolicy,

    /// Per outbound call
    pub upstream_timeout: Duration,

    /// Reference attached to every charge
    pub order_reference: String,

    /// Charged when the storefront sends no sheet total
    pub default_charge: ChargeTotal,
}

impl GatewayConfig {
    /// Create a configuration with defaults for everything but the keys
    pub fn new(public_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            certificate: ClientCertificate::default(),
            merchant: MerchantDescriptor::default(),
            processor_base_url: DEFAULT_PROCESSOR_BASE_URL.into(),
            validation: ValidationPolicy::default(),
            upstream_timeout: Duration::from_secs(30),
            order_reference: "ORD-5023-4E89".into(),
            default_charge: ChargeTotal {
                amount: Amount::parse("10.00").unwrap_or(Amount::ZERO),
                currency: "GBP".into(),
            },
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from any key lookup (environment, `.env` map, test fixture)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_key = lookup("PUBLIC_KEY")
            .ok_or_else(|| GatewayError::Config("PUBLIC_KEY not set".into()))?;
        let secret_key = lookup("SECRET_KEY")
            .ok_or_else(|| GatewayError::Config("SECRET_KEY not set".into()))?;

        let mut config = Self::new(public_key, secret_key);

        if let Some(path) = lookup("APPLE_PAY_CERT_PATH") {
            config.certificate.cert_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("APPLE_PAY_KEY_PATH") {
            config.certificate.key_path = PathBuf::from(path);
        }
        if let Some(id) = lookup("MERCHANT_IDENTIFIER") {
            config.merchant.merchant_identifier = id;
        }
        if let Some(domain) = lookup("MERCHANT_DOMAIN") {
            config.merchant.domain_name = domain;
        }
        if let Some(name) = lookup("MERCHANT_DISPLAY_NAME") {
            config.merchant.display_name = name;
        }
        if let Some(url) = lookup("PROCESSOR_BASE_URL") {
            config.processor_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(hosts) = lookup("VALIDATION_HOSTS") {
            config.validation.hosts = parse_list(&hosts);
        }
        if let Some(flag) = lookup("VALIDATION_REQUIRE_HTTPS") {
            config.validation.require_https = !matches!(flag.trim().to_lowercase().as_str(), "false" | "0" | "no");
        }
        if let Some(secs) = lookup("UPSTREAM_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| GatewayError::Config(format!("UPSTREAM_TIMEOUT_SECS '{}' is not a number", secs)))?;
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(reference) = lookup("ORDER_REFERENCE") {
            config.order_reference = reference;
        }
        if let Some(amount) = lookup("DEFAULT_CHARGE_AMOUNT") {
            config.default_charge.amount = Amount::parse(&amount)
                .map_err(|e| GatewayError::Config(format!("DEFAULT_CHARGE_AMOUNT: {}", e)))?;
        }
        if let Some(currency) = lookup("DEFAULT_CHARGE_CURRENCY") {
            config.default_charge.currency = currency.to_uppercase();
        }

        if config.validation.hosts.is_empty() {
            return Err(GatewayError::Config("VALIDATION_HOSTS is empty".into()));
        }

        Ok(config)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("public_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("certificate", &self.certificate)
            .field("merchant", &self.merchant)
            .field("processor_base_url", &self.processor_base_url)
            .field("validation", &self.validation)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("order_reference", &self.order_reference)
            .field("default_charge", &self.default_charge)
            .finish()
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_accepts_apple_hosts() {
        let policy = ValidationPolicy::default();
        let url = policy
            .check("https://apple-pay-gateway-cert.apple.com/paymentservices/startSession")
            .unwrap();
        assert_eq!(url.path(), "/paymentservices/startSession");
        assert!(policy.check("https://APPLE-PAY-GATEWAY.apple.com/x").is_ok());
    }

    #[test]
    fn test_policy_rejects_foreign_hosts_and_http() {
        let policy = ValidationPolicy::default();
        assert!(matches!(
            policy.check("https://evil.example.com/startSession"),
            Err(GatewayError::ValidationHostNotAllowed(_))
        ));
        assert!(matches!(
            policy.check("http://apple-pay-gateway.apple.com/x"),
            Err(GatewayError::ValidationHostNotAllowed(_))
        ));
        assert!(matches!(policy.check("not a url"), Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = GatewayConfig::new("pk_test_123", "sk_test_456");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk_test_456"));
        assert!(!debug.contains("pk_test_123"));
    }

    fn config_from(pairs: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: std::collections::HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = config_from(&[("PUBLIC_KEY", "pk_test"), ("SECRET_KEY", "sk_test")]).unwrap();

        assert_eq!(config.public_key, "pk_test");
        assert_eq!(config.certificate, ClientCertificate::default());
        assert_eq!(config.merchant, MerchantDescriptor::default());
        assert_eq!(config.processor_base_url, "https://api.sandbox.checkout.com");
        assert_eq!(config.validation, ValidationPolicy::default());
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.order_reference, "ORD-5023-4E89");
        assert_eq!(config.default_charge.amount.to_string(), "10.00");
        assert_eq!(config.default_charge.currency, "GBP");
    }

    #[test]
    fn test_from_lookup_requires_keys() {
        let err = config_from(&[("PUBLIC_KEY", "pk_test")]).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(config_from(&[("SECRET_KEY", "sk_test")]).is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = config_from(&[
            ("PUBLIC_KEY", "pk"),
            ("SECRET_KEY", "sk"),
            ("PROCESSOR_BASE_URL", "http://127.0.0.1:9000/"),
            ("VALIDATION_HOSTS", "127.0.0.1, localhost"),
            ("UPSTREAM_TIMEOUT_SECS", "5"),
            ("DEFAULT_CHARGE_AMOUNT", "12.5"),
            ("DEFAULT_CHARGE_CURRENCY", "eur"),
        ])
        .unwrap();

        assert_eq!(config.processor_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.validation.hosts, vec!["127.0.0.1", "localhost"]);
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.default_charge.amount.to_string(), "12.50");
        assert_eq!(config.default_charge.currency, "EUR");
    }

    #[test]
    fn test_require_https_flag() {
        for flag in ["false", "0", "no", " FALSE "] {
            let config = config_from(&[("PUBLIC_KEY", "pk"), ("SECRET_KEY", "sk"), ("VALIDATION_REQUIRE_HTTPS", flag)])
                .unwrap();
            assert!(!config.validation.require_https, "flag {:?}", flag);
        }
        for flag in ["true", "1", "yes"] {
            let config = config_from(&[("PUBLIC_KEY", "pk"), ("SECRET_KEY", "sk"), ("VALIDATION_REQUIRE_HTTPS", flag)])
                .unwrap();
            assert!(config.validation.require_https, "flag {:?}", flag);
        }
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = config_from(&[("PUBLIC_KEY", "pk"), ("SECRET_KEY", "sk"), ("UPSTREAM_TIMEOUT_SECS", "soon")])
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(err.status_code(), 500);

        let err = config_from(&[("PUBLIC_KEY", "pk"), ("SECRET_KEY", "sk"), ("VALIDATION_HOSTS", " , ")]).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));

        let err = config_from(&[("PUBLIC_KEY", "pk"), ("SECRET_KEY", "sk"), ("DEFAULT_CHARGE_AMOUNT", "-1")])
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" a.com, ,b.com "), vec!["a.com", "b.com"]);
    }
}
