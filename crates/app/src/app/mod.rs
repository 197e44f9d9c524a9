use std::path::Path;

use crate::config::ExplorerConfig;
use crate::error::{AppError, Result};
use crate::services::AppServices;
use explorer_db::Db;

/// Application state shared by front ends (CLI, embedding services).
#[derive(Clone)]
pub struct AppState {
    pub config: ExplorerConfig,
    pub services: AppServices,
}

impl AppState {
    pub fn new(config: ExplorerConfig) -> Self {
        let services = AppServices::new(&config);
        Self { config, services }
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ExplorerConfig::load_or_default(path)?))
    }

    pub fn is_fresh_db(&self) -> bool {
        !self.config.db_path.exists()
    }

    pub fn setup_db(&self) -> Result<()> {
        setup_db(&self.config.db_path)
    }

    /// Migrates the store and reports which rollups can serve queries.
    pub fn initialize(&self) -> Result<()> {
        let is_fresh_db = self.is_fresh_db();
        self.setup_db()
            .map_err(|err| AppError::Message(format!("initialize db: {}", err)))?;
        if is_fresh_db {
            tracing::info!(path = %self.config.db_path.display(), "created session store");
        }
        for status in self.services.rollups.status()? {
            tracing::info!(
                family = status.family.as_str(),
                rows = status.row_count,
                ready = status.ready,
                "rollup status"
            );
        }
        Ok(())
    }

    pub fn open_db(&self) -> Result<Db> {
        Ok(Db::open(&self.config.db_path)?.with_timezone(self.config.timezone))
    }
}

pub fn setup_db(path: &Path) -> Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
