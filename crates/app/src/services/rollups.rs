use explorer_core::{RollupCounts, RollupStatus};
use explorer_db::Db;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};

#[derive(Clone)]
pub struct RollupService {
    config: SharedConfig,
}

impl RollupService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn refresh(&self) -> Result<RollupCounts> {
        let mut db = self.db()?;
        Ok(db.refresh_rollups()?)
    }

    pub fn status(&self) -> Result<Vec<RollupStatus>> {
        Ok(self.db()?.rollup_status()?)
    }
}
