//! Apple Pay JS Bindings
//!
//! Thin `wasm-bindgen` surface over Safari's `ApplePaySession` plus the
//! [`PaymentPlatform`] implementation the sheet controller talks to.

use std::cell::RefCell;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use applepay_core::{CheckoutError, PaymentPlatform, PaymentRequest};

/// Apple Pay JS API version requested for every session
pub const APPLE_PAY_VERSION: u32 = 6;

#[wasm_bindgen]
extern "C" {
    #[derive(Clone, Debug)]
    pub type ApplePaySession;

    #[wasm_bindgen(constructor, catch)]
    fn new(version: u32, request: &JsValue) -> Result<ApplePaySession, JsValue>;

    #[wasm_bindgen(static_method_of = ApplePaySession, js_name = canMakePayments, catch)]
    fn can_make_payments() -> Result<bool, JsValue>;

    #[wasm_bindgen(method)]
    pub fn begin(this: &ApplePaySession);

    #[wasm_bindgen(method)]
    pub fn abort(this: &ApplePaySession);

    #[wasm_bindgen(method, js_name = completeMerchantValidation)]
    pub fn complete_merchant_validation(this: &ApplePaySession, merchant_session: &JsValue);

    #[wasm_bindgen(method, js_name = completeShippingContactSelection)]
    pub fn complete_shipping_contact_selection(this: &ApplePaySession, update: &JsValue);

    #[wasm_bindgen(method, js_name = completeShippingMethodSelection)]
    pub fn complete_shipping_method_selection(this: &ApplePaySession, update: &JsValue);

    #[wasm_bindgen(method, js_name = completePayment)]
    pub fn complete_payment(this: &ApplePaySession, result: &JsValue);

    #[wasm_bindgen(method, setter = onvalidatemerchant)]
    pub fn set_onvalidatemerchant(this: &ApplePaySession, handler: &js_sys::Function);

    #[wasm_bindgen(method, setter = onshippingcontactselected)]
    pub fn set_onshippingcontactselected(this: &ApplePaySession, handler: &js_sys::Function);

    #[wasm_bindgen(method, setter = onshippingmethodselected)]
    pub fn set_onshippingmethodselected(this: &ApplePaySession, handler: &js_sys::Function);

    #[wasm_bindgen(method, setter = onpaymentauthorized)]
    pub fn set_onpaymentauthorized(this: &ApplePaySession, handler: &js_sys::Function);

    #[wasm_bindgen(method, setter = oncancel)]
    pub fn set_oncancel(this: &ApplePaySession, handler: &js_sys::Function);
}

/// Serialize into a plain JS object (maps become objects, not `Map`s)
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// Read `event[name]`, `undefined` when absent
pub fn event_field(event: &JsValue, name: &str) -> JsValue {
    js_sys::Reflect::get(event, &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED)
}

fn platform_error(e: JsValue) -> CheckoutError {
    let message = e
        .as_string()
        .or_else(|| js_sys::JSON::stringify(&e).ok().map(String::from))
        .unwrap_or_else(|| "unknown JavaScript error".into());
    CheckoutError::Platform(message)
}

/// Safari (or any browser exposing `window.ApplePaySession`)
#[derive(Default)]
pub struct BrowserPlatform {
    /// Session created by the last `present`, waiting for its handlers
    session: RefCell<Option<ApplePaySession>>,
}

impl BrowserPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_session(&self) -> Option<ApplePaySession> {
        self.session.borrow_mut().take()
    }
}

impl PaymentPlatform for BrowserPlatform {
    fn can_make_payments(&self) -> bool {
        let exposed = js_sys::Reflect::has(&js_sys::global(), &JsValue::from_str("ApplePaySession")).unwrap_or(false);
        exposed && ApplePaySession::can_make_payments().unwrap_or(false)
    }

    fn present(&self, request: &PaymentRequest) -> applepay_core::Result<()> {
        let request = to_js(request).map_err(|e| CheckoutError::Platform(e.to_string()))?;
        let session = ApplePaySession::new(APPLE_PAY_VERSION, &request).map_err(platform_error)?;
        *self.session.borrow_mut() = Some(session);
        Ok(())
    }
}
