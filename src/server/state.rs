//! Shared application state

use std::sync::Arc;

use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::store::RecordStore;

/// Shared state for lookup endpoints
#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            resolver: Resolver::new(registry, store),
        }
    }
}
