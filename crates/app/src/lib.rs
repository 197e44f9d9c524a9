pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod services;

pub use app::{AppState, setup_db};
pub use config::{AnomalyConfig, DEFAULT_CONFIG_FILE, ExplorerConfig, MiningConfig};
pub use error::{ApiError, AppError, Result};
pub use logging::init_tracing;
pub use services::{AppServices, ExplorerService, PatternsService, RollupService};
