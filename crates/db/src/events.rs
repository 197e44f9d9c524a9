//! Reads for the pattern miners.
//!
//! Event scopes reuse the raw strategies' predicates, so a miner filtered to
//! a project and date range sees exactly the calls an aggregation with the
//! same filters would count.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use explorer_core::{
    AnomalyOptions, BranchDailyCost, CostAnomaly, Dimension, HandoffReport, InvalidQuery, Metric,
    PatternFilters, QueryRequest, RetryLoop, SequencePattern, SessionOutcome, SpawnForest,
    SpawnNode, ToolEvent, Transition, detect_cost_anomalies, detect_failure_handoffs,
    detect_retry_loops, mine_sequences, mine_transitions,
};
use rusqlite::params_from_iter;

use crate::Db;
use crate::error::Result;
use crate::strategy::{AggregationSource, RawSessions, RawToolCalls, Selection, select};

fn unsupported(request: &QueryRequest) -> InvalidQuery {
    InvalidQuery::new("filters", "filter combination is not supported")
        .with_value(request.family().as_str())
}

impl Db {
    fn pattern_selection(
        &self,
        request: &QueryRequest,
        source: &dyn AggregationSource,
    ) -> Result<Selection> {
        select(source, request, &[]).ok_or_else(|| unsupported(request).into())
    }

    /// Tool calls in scope, ordered by session, instant and id. Timestamps are
    /// compared as instants since fractional seconds are optional.
    pub fn load_tool_events(&self, filters: &PatternFilters) -> Result<Vec<ToolEvent>> {
        let request =
            QueryRequest::new(Metric::ToolCalls, Dimension::Tool).with_filters(filters.into());
        let source = RawToolCalls {
            timezone: self.timezone,
        };
        let selection = self.pattern_selection(&request, &source)?;
        let sql = format!(
            "SELECT c.session_id, {tool}, c.success FROM {from} {where_clause} ORDER BY c.session_id, julianday(c.timestamp), c.id",
            tool = selection.group.as_deref().unwrap_or("c.tool_name"),
            from = selection.from,
            where_clause = selection.where_clause(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(selection.params.iter()), |row| {
                Ok(ToolEvent {
                    session_id: row.get(0)?,
                    tool: row.get(1)?,
                    success: row.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Per-branch daily cost series, from the rollups when they can serve it.
    pub fn branch_daily_costs(
        &self,
        filters: &PatternFilters,
        prefer_materialized: bool,
    ) -> Result<Vec<BranchDailyCost>> {
        let request = QueryRequest::new(Metric::Cost, Dimension::Branch)
            .split_by(Dimension::Date)
            .with_filters(filters.into());
        let result = self.execute(&request, prefer_materialized)?;
        result
            .rows
            .into_iter()
            .filter_map(|row| row.split.map(|day| (row.group, day, row.value)))
            .map(|(branch, day, cost)| -> Result<BranchDailyCost> {
                Ok(BranchDailyCost {
                    branch,
                    date: NaiveDate::parse_from_str(&day, "%Y-%m-%d")?,
                    cost,
                })
            })
            .collect()
    }

    pub fn cost_anomalies(
        &self,
        filters: &PatternFilters,
        options: AnomalyOptions,
        prefer_materialized: bool,
    ) -> Result<Vec<CostAnomaly>> {
        let points = self.branch_daily_costs(filters, prefer_materialized)?;
        Ok(detect_cost_anomalies(&points, options))
    }

    pub fn tool_transitions(&self, filters: &PatternFilters) -> Result<Vec<Transition>> {
        Ok(mine_transitions(&self.load_tool_events(filters)?))
    }

    pub fn retry_loops(&self, filters: &PatternFilters) -> Result<Vec<RetryLoop>> {
        Ok(detect_retry_loops(&self.load_tool_events(filters)?))
    }

    pub fn tool_sequences(
        &self,
        filters: &PatternFilters,
        window: usize,
        limit: usize,
    ) -> Result<Vec<SequencePattern>> {
        if window == 0 {
            return Err(InvalidQuery::new("window", "window must be at least 1")
                .with_value("0")
                .into());
        }
        let mut patterns = mine_sequences(&self.load_tool_events(filters)?, window);
        patterns.truncate(limit);
        Ok(patterns)
    }

    /// Every spawn edge whose child session is in scope, with the child's
    /// whole-session error outcome. The forest is built over all sessions so
    /// that parents outside the scope still resolve.
    pub fn failure_handoffs(&self, filters: &PatternFilters) -> Result<HandoffReport> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, parent_session_id, is_agent FROM session")?;
        let nodes = stmt
            .query_map([], |row| {
                Ok(SpawnNode {
                    session_id: row.get(0)?,
                    parent_session_id: row.get(1)?,
                    is_agent: row.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let forest = SpawnForest::build(nodes);
        if forest.is_empty() {
            return Ok(HandoffReport::default());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id, COUNT(*), SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END)
            FROM tool_call
            GROUP BY session_id
            "#,
        )?;
        let outcomes = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    SessionOutcome {
                        tool_calls: row.get::<_, i64>(1)?.max(0) as u64,
                        errors: row.get::<_, i64>(2)?.max(0) as u64,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        let request =
            QueryRequest::new(Metric::Sessions, Dimension::Project).with_filters(filters.into());
        let source = RawSessions {
            timezone: self.timezone,
        };
        let selection = self.pattern_selection(&request, &source)?;
        let sql = format!(
            "SELECT s.id FROM {} {}",
            selection.from,
            selection.where_clause()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let in_scope = stmt
            .query_map(params_from_iter(selection.params.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        let report = detect_failure_handoffs(&forest, &outcomes, |child| {
            in_scope.contains(&child.session_id)
        });
        if !report.broken_edges.is_empty() {
            tracing::warn!(
                broken = report.broken_edges.len(),
                "spawn links formed cycles; closing links ignored"
            );
        }
        Ok(report)
    }
}
