use quire_versioning::VersioningEngine;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Versioning engine every RPC call runs against
    pub engine: Arc<VersioningEngine>,
}

impl AppState {
    pub fn new(engine: Arc<VersioningEngine>) -> Self {
        Self { engine }
    }
}
