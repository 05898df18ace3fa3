//! Sheet Event Wiring
//!
//! Connects the native `ApplePaySession` callbacks to the shared
//! [`SheetController`]. Each callback locks the controller, advances the
//! state machine and answers the native sheet; failures abort or complete
//! the sheet instead of leaving it spinning.

use std::future::Future;
use std::rc::Rc;

use futures::lock::Mutex;
use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use applepay_core::{
    HttpRelayClient, Payment, PaymentContact, SheetCompletion, SheetController, StorefrontConfig,
};

use crate::platform::{event_field, to_js, ApplePaySession, BrowserPlatform};

type SharedController = Rc<Mutex<SheetController<HttpRelayClient>>>;

/// Outcome text shown under the pay control
pub type StatusSignal = RwSignal<Option<String>>;

/// Buyer-facing text for a finished sheet
pub fn completion_message(completion: &SheetCompletion) -> String {
    match completion {
        SheetCompletion::Success(_) => "Payment successful. Thank you for your order!".into(),
        SheetCompletion::Failure { reason } => format!("Payment failed: {}", reason),
    }
}

/// One storefront checkout: the controller plus the browser it runs in
#[derive(Clone)]
pub struct Checkout {
    controller: SharedController,
    platform: Rc<BrowserPlatform>,
}

impl Checkout {
    pub fn new(config: StorefrontConfig, relay: HttpRelayClient) -> Self {
        Self {
            controller: Rc::new(Mutex::new(SheetController::new(config, relay))),
            platform: Rc::new(BrowserPlatform::new()),
        }
    }

    pub fn platform(&self) -> &BrowserPlatform {
        &self.platform
    }

    /// Open the sheet from the pay button's click handler.
    ///
    /// Runs synchronously: Safari only presents a sheet created inside the
    /// user gesture.
    pub fn begin(&self, status: StatusSignal) {
        let Some(mut controller) = self.controller.try_lock() else {
            tracing::debug!("Sheet busy, click ignored");
            return;
        };

        if let Err(e) = controller.open(self.platform.as_ref()) {
            status.set(Some(e.user_message()));
            return;
        }
        drop(controller);

        let Some(session) = self.platform.take_session() else {
            return;
        };
        status.set(None);
        self.wire(&session, status);
        session.begin();
    }

    fn wire(&self, session: &ApplePaySession, status: StatusSignal) {
        let on_validate = {
            let session = session.clone();
            listen(&self.controller, move |controller, event| {
                on_validate_merchant(controller, session.clone(), status, event)
            })
        };
        session.set_onvalidatemerchant(on_validate.as_ref().unchecked_ref());
        on_validate.forget();

        let on_contact = {
            let session = session.clone();
            listen(&self.controller, move |controller, event| {
                on_shipping_contact(controller, session.clone(), status, event)
            })
        };
        session.set_onshippingcontactselected(on_contact.as_ref().unchecked_ref());
        on_contact.forget();

        let on_method = {
            let session = session.clone();
            listen(&self.controller, move |controller, event| {
                on_shipping_method(controller, session.clone(), status, event)
            })
        };
        session.set_onshippingmethodselected(on_method.as_ref().unchecked_ref());
        on_method.forget();

        let on_authorized = {
            let session = session.clone();
            listen(&self.controller, move |controller, event| {
                on_payment_authorized(controller, session.clone(), status, event)
            })
        };
        session.set_onpaymentauthorized(on_authorized.as_ref().unchecked_ref());
        on_authorized.forget();

        let on_cancel = listen(&self.controller, |controller, _event| async move {
            let mut controller = controller.lock().await;
            if controller.cancel().is_err() {
                tracing::debug!(state = %controller.state(), "Cancel after completion ignored");
            }
        });
        session.set_oncancel(on_cancel.as_ref().unchecked_ref());
        on_cancel.forget();
    }
}

/// Turn an async event handler into a JS callback
fn listen<F, Fut>(controller: &SharedController, handler: F) -> Closure<dyn FnMut(JsValue)>
where
    F: Fn(SharedController, JsValue) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let controller = controller.clone();
    Closure::wrap(Box::new(move |event: JsValue| {
        leptos::task::spawn_local(handler(controller.clone(), event));
    }) as Box<dyn FnMut(JsValue)>)
}

// ============================================================================
// Handlers
// ============================================================================

/// Abort the native sheet and end the controller's session with `reason`
fn abort_sheet(
    controller: &mut SheetController<HttpRelayClient>,
    session: &ApplePaySession,
    status: StatusSignal,
    reason: &str,
) {
    if controller.abort(reason).is_err() {
        tracing::debug!(state = %controller.state(), "Sheet already finished");
    }
    session.abort();
    status.set(Some(format!("Payment cancelled: {}", reason)));
}

async fn on_validate_merchant(
    controller: SharedController,
    session: ApplePaySession,
    status: StatusSignal,
    event: JsValue,
) {
    let url = event_field(&event, "validationURL").as_string().unwrap_or_default();
    let mut controller = controller.lock().await;

    match controller.validate_merchant(&url).await {
        Ok(merchant_session) => match to_js(&merchant_session) {
            Ok(merchant_session) => session.complete_merchant_validation(&merchant_session),
            Err(e) => {
                tracing::error!(error = %e, "Merchant session not convertible");
                abort_sheet(&mut controller, &session, status, "the merchant session could not be read");
            }
        },
        Err(e) => {
            // Controller already completed with the failure
            status.set(Some(e.user_message()));
            session.abort();
        }
    }
}

async fn on_shipping_contact(
    controller: SharedController,
    session: ApplePaySession,
    status: StatusSignal,
    event: JsValue,
) {
    let contact: Option<PaymentContact> =
        serde_wasm_bindgen::from_value(event_field(&event, "shippingContact")).ok();
    let region = contact.and_then(|c| c.country_code);
    let mut controller = controller.lock().await;

    match controller.shipping_contact_selected(region.as_deref()).map(|u| to_js(&u)) {
        Ok(Ok(update)) => session.complete_shipping_contact_selection(&update),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Shipping update not convertible");
            abort_sheet(&mut controller, &session, status, "shipping could not be priced");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Shipping contact not priced");
            abort_sheet(&mut controller, &session, status, "shipping could not be priced");
        }
    }
}

async fn on_shipping_method(
    controller: SharedController,
    session: ApplePaySession,
    status: StatusSignal,
    event: JsValue,
) {
    let identifier = event_field(&event_field(&event, "shippingMethod"), "identifier")
        .as_string()
        .unwrap_or_default();
    let mut controller = controller.lock().await;

    match controller.shipping_method_selected(&identifier).map(|u| to_js(&u)) {
        Ok(Ok(update)) => session.complete_shipping_method_selection(&update),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Shipping update not convertible");
            abort_sheet(&mut controller, &session, status, "shipping could not be priced");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Shipping method not priced");
            abort_sheet(&mut controller, &session, status, "the shipping method is not available");
        }
    }
}

async fn on_payment_authorized(
    controller: SharedController,
    session: ApplePaySession,
    status: StatusSignal,
    event: JsValue,
) {
    let mut controller = controller.lock().await;

    let completion = match serde_wasm_bindgen::from_value::<Payment>(event_field(&event, "payment")) {
        Ok(payment) => match controller.payment_authorized(payment).await {
            Ok(completion) => completion,
            Err(e) => SheetCompletion::Failure {
                reason: e.user_message(),
            },
        },
        Err(e) => {
            tracing::error!(error = %e, "Unreadable authorized payment");
            let reason = "The payment details could not be read.";
            if controller.abort(reason).is_err() {
                tracing::debug!(state = %controller.state(), "Sheet already finished");
            }
            SheetCompletion::Failure { reason: reason.into() }
        }
    };

    let result = serde_json::json!({ "status": completion.status_code() });
    match to_js(&result) {
        Ok(result) => session.complete_payment(&result),
        Err(_) => session.abort(),
    }
    status.set(Some(completion_message(&completion)));
}
