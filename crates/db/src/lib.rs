use std::path::Path;

use explorer_core::Timezone;
use rusqlite::Connection;

mod aggregate;
mod dispatch;
mod drilldown;
pub mod error;
mod events;
mod facts;
mod filter_options;
mod local_date;
mod migrations;
mod rollups;
mod strategy;

pub use error::{DbError, Result};
pub use local_date::local_date_expr;

/// Handle over the session fact store and its daily rollups.
///
/// Every local-date computation made through one handle uses the same
/// timezone, so raw queries, rollups and drill-downs agree on bucket dates.
pub struct Db {
    conn: Connection,
    timezone: Timezone,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        Ok(Self {
            conn,
            timezone: Timezone::default(),
        })
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn timezone(&self) -> Timezone {
        self.timezone
    }
}
