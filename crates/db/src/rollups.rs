//! Materialized daily rollups.
//!
//! One table per fact family, keyed by local date and every dimension label
//! the family supports. Rows are produced with the raw strategies' label
//! expressions, so summing them reproduces the raw aggregation. A rollup is
//! only served while its recorded watermarks and timezone still match.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use explorer_core::{
    AggregateRow, Dimension, FactFamily, Metric, QueryRequest, RollupCounts, RollupStatus,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::Db;
use crate::aggregate::aggregate_with;
use crate::error::{DbError, Result};
use crate::strategy::{
    AggregationSource, RollupSource, raw_source, rollup_metric_column, rollup_table, select,
};

fn fact_table(family: FactFamily) -> &'static str {
    match family {
        FactFamily::Turns => "turn",
        FactFamily::ToolCalls => "tool_call",
        FactFamily::Sessions => "session",
    }
}

fn watermark(conn: &Connection, table: &str) -> Result<i64> {
    let value: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX(rowid), 0) FROM {}", table),
        [],
        |row| row.get(0),
    )?;
    Ok(value)
}

fn table_has_rows(conn: &Connection, table: &str) -> Result<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS (SELECT 1 FROM {} LIMIT 1)", table),
        [],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Stored value of a metric: sums stay unrounded so that re-summing daily
/// rows rounds only once, at query time.
fn stored_metric_expr(source: &dyn AggregationSource, metric: Metric) -> String {
    match metric {
        Metric::Cost => "SUM(t.cost_usd)".to_string(),
        other => source.metric_expr(other),
    }
}

fn rebuild_sql(source: &dyn AggregationSource) -> String {
    let family = source.family();
    let mut columns: Vec<&str> = Vec::new();
    let mut exprs: Vec<String> = Vec::new();
    for dimension in family.dimensions() {
        columns.push(match dimension {
            Dimension::Date => "local_date",
            other => other.as_str(),
        });
        exprs.push(
            source
                .column(*dimension)
                .map(|column| column.expr)
                .unwrap_or_else(|| "NULL".to_string()),
        );
    }
    let keys = exprs.len();
    for metric in family.metrics() {
        columns.push(rollup_metric_column(metric));
        exprs.push(stored_metric_expr(source, metric));
    }
    let group_by: Vec<String> = (1..=keys).map(|idx| idx.to_string()).collect();
    format!(
        "INSERT INTO {table} ({columns}) SELECT {exprs} FROM {from} WHERE {date} IS NOT NULL GROUP BY {group_by}",
        table = rollup_table(family),
        date = source.date_expr(),
        columns = columns.join(", "),
        exprs = exprs.join(", "),
        from = source.from_clause(true),
        group_by = group_by.join(", "),
    )
}

impl Db {
    /// Rebuilds every family's rollup, each inside its own transaction.
    pub fn refresh_rollups(&mut self) -> Result<RollupCounts> {
        let mut counts = RollupCounts::default();
        for family in FactFamily::ALL {
            let rows = self.refresh_family(family)?;
            counts.set(family, rows);
        }
        Ok(counts)
    }

    fn refresh_family(&mut self, family: FactFamily) -> Result<u64> {
        let started = Instant::now();
        let source = raw_source(family, self.timezone);
        let table = rollup_table(family);
        let timezone = self.timezone.to_string();
        let tx = self.conn.transaction()?;
        let source_watermark = watermark(&tx, fact_table(family))?;
        let session_watermark = watermark(&tx, "session")?;
        tx.execute(&format!("DELETE FROM {}", table), [])?;
        let rows = tx.execute(&rebuild_sql(source.as_ref()), [])? as u64;
        let refreshed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        tx.execute(
            r#"
            INSERT INTO rollup_state (
              family, refreshed_at, row_count, source_watermark, session_watermark, timezone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(family) DO UPDATE SET
              refreshed_at = excluded.refreshed_at,
              row_count = excluded.row_count,
              source_watermark = excluded.source_watermark,
              session_watermark = excluded.session_watermark,
              timezone = excluded.timezone
            "#,
            params![
                family.as_str(),
                refreshed_at,
                rows as i64,
                source_watermark,
                session_watermark,
                timezone
            ],
        )?;
        tx.commit()?;
        tracing::info!(
            family = family.as_str(),
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refreshed rollup"
        );
        Ok(rows)
    }

    /// A rollup is ready when it has rows, nothing was appended to its
    /// sources since the refresh, and it was built for this timezone.
    pub fn is_rollup_ready(&self, family: FactFamily) -> Result<bool> {
        let state: Option<(i64, i64, i64, String)> = self
            .conn
            .query_row(
                r#"
                SELECT row_count, source_watermark, session_watermark, timezone
                FROM rollup_state
                WHERE family = ?1
                "#,
                [family.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((row_count, source_watermark, session_watermark, timezone)) = state else {
            return Ok(false);
        };
        if row_count == 0 || timezone != self.timezone.to_string() {
            return Ok(false);
        }
        if !table_has_rows(&self.conn, rollup_table(family))? {
            return Ok(false);
        }
        Ok(source_watermark == watermark(&self.conn, fact_table(family))?
            && session_watermark == watermark(&self.conn, "session")?)
    }

    /// Whether every dimension and filter of the request is a stored rollup
    /// column.
    pub fn rollup_can_answer(&self, request: &QueryRequest) -> bool {
        let source = RollupSource {
            family: request.family(),
        };
        select(&source, request, &[]).is_some()
    }

    /// Sums rollup rows with the raw path's grouping and filter semantics.
    pub fn aggregate_materialized(&self, request: &QueryRequest) -> Result<Vec<AggregateRow>> {
        request.validate()?;
        let family = request.family();
        if !self.is_rollup_ready(family)? {
            return Err(DbError::DataUnavailable(family));
        }
        let source = RollupSource { family };
        aggregate_with(&self.conn, &source, request)?.ok_or(DbError::DataUnavailable(family))
    }

    pub fn rollup_status(&self) -> Result<Vec<RollupStatus>> {
        let mut statuses = Vec::with_capacity(FactFamily::ALL.len());
        for family in FactFamily::ALL {
            let state: Option<(i64, String, String)> = self
                .conn
                .query_row(
                    "SELECT row_count, refreshed_at, timezone FROM rollup_state WHERE family = ?1",
                    [family.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let ready = self.is_rollup_ready(family)?;
            statuses.push(match state {
                Some((row_count, refreshed_at, timezone)) => RollupStatus {
                    family,
                    row_count: row_count.max(0) as u64,
                    refreshed_at: Some(refreshed_at),
                    timezone: Some(timezone),
                    ready,
                },
                None => RollupStatus {
                    family,
                    row_count: 0,
                    refreshed_at: None,
                    timezone: None,
                    ready,
                },
            });
        }
        Ok(statuses)
    }
}
