use tracing_subscriber::EnvFilter;

use crate::error::{AppError, Result};

/// Installs the fmt subscriber. `RUST_LOG` wins over `filter`; a second call
/// leaves the first subscriber in place.
pub fn init_tracing(filter: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|err| AppError::Message(format!("invalid log filter {filter:?}: {err}")))?,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
    Ok(())
}
