use rusqlite::params;
use explorer_core::{SessionRecord, ToolCallRecord, TurnRecord};

use crate::Db;
use crate::error::Result;

impl Db {
    pub fn insert_sessions(&mut self, sessions: &[SessionRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO session (
                  id, project, first_timestamp, last_timestamp, duration_seconds,
                  is_agent, parent_session_id, branch, tool_version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for session in sessions {
                inserted += stmt.execute(params![
                    session.id,
                    session.project,
                    session.first_timestamp,
                    session.last_timestamp,
                    session.duration_seconds as i64,
                    session.is_agent,
                    session.parent_session_id,
                    session.branch,
                    session.tool_version,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn insert_turns(&mut self, turns: &[TurnRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO turn (
                  id, uuid, session_id, timestamp, model, input_tokens, output_tokens,
                  cache_read_tokens, cache_write_tokens, ephemeral_5m_tokens,
                  ephemeral_1h_tokens, thinking_chars, cost_usd, stop_reason,
                  is_sidechain, is_meta, entry_type
                ) VALUES (
                  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17
                )
                "#,
            )?;
            for turn in turns {
                inserted += stmt.execute(params![
                    turn.id,
                    turn.uuid,
                    turn.session_id,
                    turn.timestamp,
                    turn.model,
                    turn.tokens.input_tokens as i64,
                    turn.tokens.output_tokens as i64,
                    turn.tokens.cache_read_tokens as i64,
                    turn.tokens.cache_write_tokens as i64,
                    turn.tokens.ephemeral_5m_tokens as i64,
                    turn.tokens.ephemeral_1h_tokens as i64,
                    turn.thinking_chars as i64,
                    turn.cost_usd,
                    turn.stop_reason,
                    turn.is_sidechain,
                    turn.is_meta,
                    turn.entry_type,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn insert_tool_calls(&mut self, calls: &[ToolCallRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO tool_call (
                  id, turn_id, session_id, timestamp, tool_name, success, error_category,
                  lines_added, lines_deleted, loc_written, language, file_path
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )?;
            for call in calls {
                inserted += stmt.execute(params![
                    call.id,
                    call.turn_id,
                    call.session_id,
                    call.timestamp,
                    call.tool_name,
                    call.success,
                    call.error_category,
                    call.lines_added as i64,
                    call.lines_deleted as i64,
                    call.loc_written as i64,
                    call.language,
                    call.file_path,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}
