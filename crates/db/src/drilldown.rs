use chrono::NaiveDate;
use explorer_core::{
    DailyCost, Dimension, DrilldownRequest, DrilldownResult, DrilldownSession, InvalidQuery,
    Pagination,
};
use rusqlite::params_from_iter;

use crate::Db;
use crate::error::Result;
use crate::local_date::local_date_expr;
use crate::strategy::{raw_source, select, user_type_label};

impl Db {
    /// Lists the sessions that contributed to one bucket of a query, largest
    /// contribution first.
    ///
    /// Candidates are selected with the same strategy and predicates as the
    /// raw aggregation, so the contributions over all pages add up to the
    /// bucket's value. Session totals come from separate per-table
    /// aggregates keyed by session id.
    pub fn drilldown(&self, request: &DrilldownRequest) -> Result<DrilldownResult> {
        request.validate()?;
        let query = &request.query;
        let mut selectors: Vec<(Dimension, &str)> =
            vec![(query.group_by, request.group_value.as_str())];
        if let (Some(split_by), Some(split_value)) = (query.split_by, request.split_value.as_deref())
        {
            selectors.push((split_by, split_value));
        }
        let source = raw_source(query.family(), self.timezone);
        let selection = select(source.as_ref(), query, &selectors).ok_or_else(|| {
            InvalidQuery::new("filters", "filter combination is not supported")
                .with_value(query.family().as_str())
        })?;

        let candidates = format!(
            "candidates AS (SELECT s.id AS session_id, {metric} AS bucket_value FROM {from} {where_clause} GROUP BY s.id)",
            metric = source.contribution_expr(query.metric),
            from = selection.from,
            where_clause = selection.where_clause(),
        );

        let total_count: i64 = self.conn.query_row(
            &format!("WITH {} SELECT COUNT(*) FROM candidates", candidates),
            params_from_iter(selection.params.iter()),
            |row| row.get(0),
        )?;
        let total_count = total_count.max(0) as u64;

        let page_size = request.page_size();
        let sql = format!(
            r#"
            WITH {candidates},
            turn_totals AS (
              SELECT session_id, SUM(cost_usd) AS total_cost, COUNT(*) AS turns
              FROM turn
              WHERE session_id IN (SELECT session_id FROM candidates)
              GROUP BY session_id
            ),
            tool_totals AS (
              SELECT session_id,
                     COUNT(*) AS tool_calls,
                     SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) AS errors
              FROM tool_call
              WHERE session_id IN (SELECT session_id FROM candidates)
              GROUP BY session_id
            )
            SELECT s.id, s.project, s.first_timestamp, {user_type},
                   NULLIF(TRIM(s.branch), ''), NULLIF(TRIM(s.tool_version), ''),
                   c.bucket_value,
                   ROUND(COALESCE(tt.total_cost, 0), 6) AS total_cost,
                   COALESCE(tt.turns, 0),
                   COALESCE(tc.tool_calls, 0),
                   COALESCE(tc.errors, 0)
            FROM candidates c
            JOIN session s ON s.id = c.session_id
            LEFT JOIN turn_totals tt ON tt.session_id = c.session_id
            LEFT JOIN tool_totals tc ON tc.session_id = c.session_id
            ORDER BY c.bucket_value DESC, total_cost DESC, s.last_timestamp DESC, s.id ASC
            LIMIT {limit} OFFSET {offset}
            "#,
            user_type = user_type_label("s.is_agent"),
            limit = page_size,
            offset = request.offset(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params_from_iter(selection.params.iter()), |row| {
                Ok(DrilldownSession {
                    session_id: row.get(0)?,
                    project: row.get(1)?,
                    first_timestamp: row.get(2)?,
                    user_type: row.get(3)?,
                    branch: row.get(4)?,
                    tool_version: row.get(5)?,
                    bucket_value: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                    total_cost: row.get(7)?,
                    turns: row.get::<_, i64>(8)?.max(0) as u64,
                    tool_calls: row.get::<_, i64>(9)?.max(0) as u64,
                    errors: row.get::<_, i64>(10)?.max(0) as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(DrilldownResult {
            bucket: request.bucket(),
            sessions,
            pagination: Pagination::new(request.page, page_size, total_count),
        })
    }

    /// Cost of one session per local day.
    pub fn session_cost_trend(&self, session_id: &str) -> Result<Vec<DailyCost>> {
        let day = local_date_expr("t.timestamp", self.timezone);
        let sql = format!(
            "SELECT {day} AS day, ROUND(SUM(t.cost_usd), 6) FROM turn t WHERE t.session_id = ?1 AND {day} IS NOT NULL GROUP BY day ORDER BY day"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(day, cost)| -> Result<DailyCost> {
                Ok(DailyCost {
                    date: NaiveDate::parse_from_str(&day, "%Y-%m-%d")?,
                    cost,
                })
            })
            .collect()
    }
}
