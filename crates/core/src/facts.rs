//! Rows of the three append-only fact tables, as written by the ingestion
//! pipeline. Timestamps are RFC 3339 UTC strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub project: String,
    pub first_timestamp: String,
    pub last_timestamp: String,
    pub duration_seconds: u64,
    pub is_agent: bool,
    pub parent_session_id: Option<String>,
    pub branch: Option<String>,
    pub tool_version: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTokens {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub ephemeral_5m_tokens: u64,
    pub ephemeral_1h_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: i64,
    pub uuid: String,
    pub session_id: String,
    pub timestamp: String,
    pub model: Option<String>,
    pub tokens: TurnTokens,
    pub thinking_chars: u64,
    pub cost_usd: f64,
    pub stop_reason: Option<String>,
    pub is_sidechain: bool,
    pub is_meta: bool,
    pub entry_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: i64,
    pub turn_id: i64,
    pub session_id: String,
    pub timestamp: String,
    pub tool_name: String,
    pub success: bool,
    pub error_category: Option<String>,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub loc_written: u64,
    pub language: Option<String>,
    pub file_path: Option<String>,
}
