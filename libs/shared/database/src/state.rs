use std::sync::Arc;

use shared_config::AppConfig;

use crate::{Database, DbResult};

/// State handed to every router via `State<Arc<AppState>>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    /// Open the configured database and wrap it with the config.
    pub fn from_config(config: AppConfig) -> DbResult<Self> {
        let db = Database::from_config(&config)?;
        Ok(Self::new(config, db))
    }
}
