//! applepay-web Storefront
//!
//! Leptos-based WASM storefront that presents the Apple Pay sheet and
//! relays its events through the gateway.

mod app;
mod checkout;
mod components;
mod logging;
mod pages;
mod platform;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init();
    leptos::mount::mount_to_body(App);
}
