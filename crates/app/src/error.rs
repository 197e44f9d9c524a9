use explorer_core::InvalidQuery;
use explorer_db::DbError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("db error: {0}")]
    Db(DbError),
    #[error(transparent)]
    InvalidQuery(#[from] InvalidQuery),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidQuery(err) => AppError::InvalidQuery(err),
            other => AppError::Db(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Error shape handed to callers. Only invalid queries carry detail;
/// anything else is logged and reported as an opaque internal error.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidQuery(err) => Self {
                status: 400,
                message: err.to_string(),
                code: Some("invalid_query".to_string()),
                field: Some(err.field),
                allowed: err.allowed,
            },
            other => {
                tracing::error!(error = %other, "request failed");
                Self {
                    status: 500,
                    message: "internal error".to_string(),
                    code: None,
                    field: None,
                    allowed: Vec::new(),
                }
            }
        }
    }
}
