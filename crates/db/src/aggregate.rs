use std::time::Instant;

use explorer_core::{AggregateRow, InvalidQuery, QueryRequest};
use rusqlite::{Connection, params_from_iter};

use crate::Db;
use crate::error::Result;
use crate::strategy::{AggregationSource, raw_source, select};

impl Db {
    /// Aggregates a request straight from the fact tables.
    pub fn aggregate(&self, request: &QueryRequest) -> Result<Vec<AggregateRow>> {
        request.validate()?;
        let source = raw_source(request.family(), self.timezone);
        aggregate_with(&self.conn, source.as_ref(), request)?.ok_or_else(|| {
            InvalidQuery::new("filters", "filter combination is not supported")
                .with_value(request.family().as_str())
                .into()
        })
    }
}

/// Runs a request against one source. `Ok(None)` means the source cannot
/// express it.
pub(crate) fn aggregate_with(
    conn: &Connection,
    source: &dyn AggregationSource,
    request: &QueryRequest,
) -> Result<Option<Vec<AggregateRow>>> {
    let Some(selection) = select(source, request, &[]) else {
        return Ok(None);
    };
    let group = selection.group.as_deref().unwrap_or("NULL");
    let (split, group_by) = match selection.split.as_deref() {
        Some(split) => (split, "GROUP BY 1, 2"),
        None => ("NULL", "GROUP BY 1"),
    };
    let sql = format!(
        "SELECT {group} AS grp, {split} AS split, {metric} AS value FROM {from} {where_clause} {group_by}",
        metric = source.metric_expr(request.metric),
        from = selection.from,
        where_clause = selection.where_clause(),
    );

    let started = Instant::now();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(selection.params.iter()), |row| {
            Ok(AggregateRow {
                group: row.get(0)?,
                split: row.get(1)?,
                value: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tracing::debug!(
        family = source.family().as_str(),
        metric = request.metric.as_str(),
        rows = rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "aggregated"
    );
    Ok(Some(rows))
}
