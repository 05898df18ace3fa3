//! Storefront Configuration
//!
//! Shop identity, pricing and shipping tables. Passed explicitly into the
//! sheet controller; nothing here is process-global.

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::model::{ContactField, LineItem, PaymentRequest, ShippingOption};
use crate::money::Amount;

/// Region-keyed shipping tables
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingTables {
    /// Options offered when the buyer is in the home region
    pub home: Vec<ShippingOption>,

    /// Fallback for every other region
    pub worldwide: Vec<ShippingOption>,
}

/// Everything the controller needs to build and price a sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Label shown next to the total
    pub shop_name: String,

    /// Unit price of the single product on sale
    pub product_price: Amount,

    /// ISO 4217 currency code
    pub currency_code: String,

    /// ISO 3166 country code of the merchant; also the home shipping region
    pub country_code: String,

    /// Card networks accepted on the sheet
    pub supported_networks: Vec<String>,

    /// Processing capabilities advertised to the platform
    pub merchant_capabilities: Vec<String>,

    pub shipping: ShippingTables,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            shop_name: "Demo Shop".into(),
            product_price: Amount::new(dec!(10.00)).unwrap_or(Amount::ZERO),
            currency_code: "GBP".into(),
            country_code: "GB".into(),
            supported_networks: ["amex", "masterCard", "maestro", "visa", "mada"]
                .into_iter()
                .map(String::from)
                .collect(),
            merchant_capabilities: ["supports3DS", "supportsEMV", "supportsCredit", "supportsDebit"]
                .into_iter()
                .map(String::from)
                .collect(),
            shipping: ShippingTables {
                home: vec![
                    ShippingOption::new("Free Shipping", Amount::ZERO, "Arrives in 3-5 days", "freeShipping"),
                    ShippingOption::new(
                        "Express Shipping",
                        Amount::new(dec!(5.00)).unwrap_or(Amount::ZERO),
                        "Arrives in 1-2 days",
                        "expressShipping",
                    ),
                ],
                worldwide: vec![ShippingOption::new(
                    "Worldwide Standard Shipping",
                    Amount::new(dec!(10.00)).unwrap_or(Amount::ZERO),
                    "Arrives in 5-8 days",
                    "worldwideShipping",
                )],
            },
        }
    }
}

impl StorefrontConfig {
    /// Shipping options for a buyer region.
    ///
    /// Home table iff `region` equals the configured country code
    /// (case-insensitive), worldwide table otherwise.
    pub fn available_shipping_methods(&self, region: &str) -> &[ShippingOption] {
        if region.trim().eq_ignore_ascii_case(&self.country_code) {
            &self.shipping.home
        } else {
            &self.shipping.worldwide
        }
    }

    /// Fresh session configuration for one sheet invocation
    pub fn session_configuration(&self) -> PaymentRequest {
        let contact_fields = vec![
            ContactField::PostalAddress,
            ContactField::Name,
            ContactField::Phone,
            ContactField::Email,
        ];

        PaymentRequest {
            country_code: self.country_code.clone(),
            currency_code: self.currency_code.clone(),
            merchant_capabilities: self.merchant_capabilities.clone(),
            supported_networks: self.supported_networks.clone(),
            shipping_type: "shipping".into(),
            required_billing_contact_fields: contact_fields.clone(),
            required_shipping_contact_fields: contact_fields,
            total: LineItem::final_item(self.shop_name.clone(), self.product_price),
        }
    }
}
