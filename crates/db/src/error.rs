use explorer_core::{FactFamily, InvalidQuery};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("time parse error: {0}")]
    TimeParse(#[from] chrono::ParseError),
    #[error(transparent)]
    InvalidQuery(#[from] InvalidQuery),
    #[error("materialized {0} rollup is not available")]
    DataUnavailable(FactFamily),
}

pub type Result<T> = std::result::Result<T, DbError>;
