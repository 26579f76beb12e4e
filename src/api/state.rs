//! API server state

use std::sync::Arc;

use crate::client::SearchBackend;

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Search backend shared by all requests
    pub backend: Arc<dyn SearchBackend>,

    /// Index searched by `/search`
    pub index: Arc<str>,
}

impl AppState {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<Arc<str>>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }
}
