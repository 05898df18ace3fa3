//! UI Components

use leptos::prelude::*;

use applepay_core::StorefrontConfig;

/// Product summary shown above the pay control
#[component]
pub fn ProductCard(config: StorefrontConfig) -> impl IntoView {
    let price = format!("{} {}", config.product_price, config.currency_code);

    view! {
        <div class="product">
            <h2>{config.shop_name}</h2>
            <p class="price">{price}</p>
            <p class="shipping-note">"Free shipping in " {config.country_code} ", worldwide delivery available"</p>
        </div>
    }
}

/// Shown instead of the pay button when the browser cannot pay
#[component]
pub fn UnavailableMessage() -> impl IntoView {
    view! {
        <p class="error">"Apple Pay is not available on this device. Please use Safari on a supported device."</p>
    }
}
