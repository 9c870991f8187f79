use std::sync::Arc;

use medichat::providers::base::Provider;

/// Shared application state: the provider every chat request goes through.
/// Held as a trait object so the binary wires the real Gemini client while
/// route tests inject a scripted one.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}
