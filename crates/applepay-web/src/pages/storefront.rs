//! Storefront Page

use leptos::prelude::*;

use applepay_core::{trigger_view, HttpRelayClient, StorefrontConfig, TriggerView};

use crate::checkout::Checkout;
use crate::components::{ProductCard, UnavailableMessage};

#[component]
pub fn StorefrontPage() -> impl IntoView {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into());

    let config = StorefrontConfig::default();
    let checkout = Checkout::new(config.clone(), HttpRelayClient::new(origin));
    let trigger = trigger_view(checkout.platform());

    let checkout = StoredValue::new_local(checkout);
    let status = RwSignal::new(None::<String>);

    let pay = move |_| checkout.with_value(|checkout| checkout.begin(status));

    view! {
        <div class="storefront">
            <ProductCard config=config />

            {match trigger {
                TriggerView::PayButton => view! {
                    <button class="apple-pay-button" lang="en" on:click=pay></button>
                }.into_any(),
                TriggerView::ErrorMessage => view! { <UnavailableMessage /> }.into_any(),
            }}

            {move || status.get().map(|message| view! { <p class="status">{message}</p> })}
        </div>
    }
}
