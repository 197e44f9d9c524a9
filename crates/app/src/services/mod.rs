mod explorer;
mod patterns;
mod rollups;

use std::sync::Arc;

use crate::config::ExplorerConfig;
use crate::error::Result;
use explorer_db::Db;

pub use explorer::ExplorerService;
pub use patterns::PatternsService;
pub use rollups::RollupService;

type SharedConfig = Arc<ExplorerConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub explorer: ExplorerService,
    pub patterns: PatternsService,
    pub rollups: RollupService,
}

impl AppServices {
    pub fn new(config: &ExplorerConfig) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            explorer: ExplorerService::new(shared.clone()),
            patterns: PatternsService::new(shared.clone()),
            rollups: RollupService::new(shared),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?.with_timezone(config.timezone))
}
