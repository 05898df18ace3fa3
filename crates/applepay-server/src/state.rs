//! Application State

use std::sync::Arc;

use applepay_gateway::Relay;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Validation + payment relay (read-only, shared by all requests)
    pub relay: Arc<Relay>,
}
