pub mod config;
pub mod model;
pub mod policy;
pub mod rest;
pub mod storage;

use std::sync::Arc;
use std::time::Instant;

use config::TaskdConfig;
use storage::Storage;

/// Shared application state passed to every request handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<TaskdConfig>,
    pub storage: Arc<Storage>,
    pub started_at: Instant,
}

impl AppContext {
    pub fn new(config: Arc<TaskdConfig>, storage: Arc<Storage>) -> Self {
        Self {
            config,
            storage,
            started_at: Instant::now(),
        }
    }
}
