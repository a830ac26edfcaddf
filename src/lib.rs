pub mod api;
pub mod config;
pub mod db;
pub mod storage;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::api::session::SessionKeys;
use crate::storage::FileStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: SessionKeys,
    pub storage: FileStore,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let sessions = SessionKeys::from_config(&config.auth);
        let storage = FileStore::new(config.storage_dir(), config.storage.max_upload_bytes);
        Self {
            config,
            db,
            rate_limiter,
            sessions,
            storage,
        }
    }
}
