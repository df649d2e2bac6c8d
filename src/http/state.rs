use crate::server::AssistantServer;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<AssistantServer>,
}

impl AppState {
    pub fn new(server: Arc<AssistantServer>) -> Self {
        Self { server }
    }
}
