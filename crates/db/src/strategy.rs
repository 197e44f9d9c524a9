//! Per-family aggregation strategies.
//!
//! Each strategy owns the closed mapping from registry dimensions and metrics
//! to SQL over one fact family's tables. A strategy never joins two fact
//! tables in the fan-out direction: the ToolCalls strategy may reach its
//! parent turn (many-to-one), never the reverse, and filters on columns
//! outside the family's grain become semi-joins on the session id.

use explorer_core::{
    Dimension, FactFamily, Metric, NONE_LABEL, QueryRequest, SENTINEL_MODEL_LABELS, Timezone,
};

use crate::local_date::local_date_expr;

/// A dimension's label expression plus whether it reads the joined turn.
#[derive(Debug, Clone)]
pub(crate) struct Column {
    pub expr: String,
    pub needs_turn: bool,
}

impl Column {
    fn own(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            needs_turn: false,
        }
    }

    fn via_turn(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            needs_turn: true,
        }
    }
}

/// Label for a nullable text column: blank and missing values read `(none)`.
pub(crate) fn text_label(column: &str) -> String {
    format!("COALESCE(NULLIF(TRIM({}), ''), '{}')", column, NONE_LABEL)
}

pub(crate) fn user_type_label(is_agent: &str) -> String {
    format!("CASE WHEN {} = 1 THEN 'agent' ELSE 'human' END", is_agent)
}

/// The one predicate that keeps placeholder models out of model buckets.
pub(crate) fn known_model_predicate(label: &str) -> String {
    let sentinels: Vec<String> = SENTINEL_MODEL_LABELS
        .iter()
        .map(|value| format!("'{}'", value))
        .collect();
    format!("LOWER({}) NOT IN ({})", label, sentinels.join(", "))
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) trait AggregationSource {
    fn family(&self) -> FactFamily;

    /// Label expression of a dimension in this family's grain, if stored.
    fn column(&self, dimension: Dimension) -> Option<Column>;

    fn date_expr(&self) -> String;

    /// Aggregate SQL expression for a metric of this family.
    fn metric_expr(&self, metric: Metric) -> String;

    /// Per-session share of a metric. Currency stays unrounded so the shares
    /// of a bucket add up to its total.
    fn contribution_expr(&self, metric: Metric) -> String {
        self.metric_expr(metric)
    }

    fn from_clause(&self, join_turn: bool) -> String;

    /// Session-scoped predicate for a filter whose column is outside the
    /// grain. Parameters are bound in the order of `values`.
    fn semi_join(&self, _dimension: Dimension, _values: usize) -> Option<String> {
        None
    }
}

/// FROM clause, predicates and parameters selecting one set of fact rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    pub from: String,
    pub clauses: Vec<String>,
    pub params: Vec<String>,
    pub group: Option<String>,
    pub split: Option<String>,
}

impl Selection {
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Builds the selection for a request, optionally pinned to one bucket via
/// label equality on `selectors`. Returns `None` when the source cannot
/// express a requested dimension or filter.
pub(crate) fn select(
    source: &dyn AggregationSource,
    request: &QueryRequest,
    selectors: &[(Dimension, &str)],
) -> Option<Selection> {
    let mut selection = Selection::default();
    let mut join_turn = false;

    let group = source.column(request.group_by)?;
    join_turn |= group.needs_turn;
    let split = match request.split_by {
        Some(dimension) => {
            let column = source.column(dimension)?;
            join_turn |= column.needs_turn;
            Some(column)
        }
        None => None,
    };

    let filters = &request.filters;
    if let Some(date_from) = filters.date_from {
        selection.clauses.push(format!("{} >= ?", source.date_expr()));
        selection.params.push(date_from.to_string());
    }
    if let Some(date_to) = filters.date_to {
        selection.clauses.push(format!("{} <= ?", source.date_expr()));
        selection.params.push(date_to.to_string());
    }
    for (dimension, values) in filters.lists() {
        match source.column(dimension) {
            Some(column) => {
                join_turn |= column.needs_turn;
                selection.clauses.push(format!(
                    "{} IN ({})",
                    column.expr,
                    placeholders(values.len())
                ));
            }
            None => {
                let clause = source.semi_join(dimension, values.len())?;
                selection.clauses.push(clause);
            }
        }
        selection.params.extend(values.iter().cloned());
    }

    if request.uses_model_dimension() {
        let model = source.column(Dimension::Model)?;
        join_turn |= model.needs_turn;
        selection.clauses.push(known_model_predicate(&model.expr));
    }

    for (dimension, value) in selectors {
        let column = source.column(*dimension)?;
        join_turn |= column.needs_turn;
        selection.clauses.push(format!("{} = ?", column.expr));
        selection.params.push((*value).to_string());
    }

    // Rows without a local date have no day bucket on any path.
    selection
        .clauses
        .push(format!("{} IS NOT NULL", source.date_expr()));

    selection.from = source.from_clause(join_turn);
    selection.group = Some(group.expr);
    selection.split = split.map(|column| column.expr);
    Some(selection)
}

fn session_column(dimension: Dimension) -> Option<Column> {
    match dimension {
        Dimension::Project => Some(Column::own(text_label("s.project"))),
        Dimension::Branch => Some(Column::own(text_label("s.branch"))),
        Dimension::UserType => Some(Column::own(user_type_label("s.is_agent"))),
        Dimension::ToolVersion => Some(Column::own(text_label("s.tool_version"))),
        _ => None,
    }
}

fn semi_join_on(table: &str, label: String, values: usize) -> String {
    format!(
        "s.id IN (SELECT sj.session_id FROM {} sj WHERE {} IN ({}))",
        table,
        label,
        placeholders(values)
    )
}

pub(crate) struct RawTurns {
    pub timezone: Timezone,
}

impl AggregationSource for RawTurns {
    fn family(&self) -> FactFamily {
        FactFamily::Turns
    }

    fn column(&self, dimension: Dimension) -> Option<Column> {
        match dimension {
            Dimension::Date => Some(Column::own(self.date_expr())),
            Dimension::Model => Some(Column::own(text_label("t.model"))),
            Dimension::EntryType => Some(Column::own(text_label("t.entry_type"))),
            Dimension::StopReason => Some(Column::own(text_label("t.stop_reason"))),
            other => session_column(other),
        }
    }

    fn date_expr(&self) -> String {
        local_date_expr("t.timestamp", self.timezone)
    }

    fn metric_expr(&self, metric: Metric) -> String {
        match metric {
            Metric::Cost => "ROUND(SUM(t.cost_usd), 6)".to_string(),
            Metric::Turns => "COUNT(*)".to_string(),
            Metric::InputTokens => "SUM(t.input_tokens)".to_string(),
            Metric::OutputTokens => "SUM(t.output_tokens)".to_string(),
            Metric::CacheReadTokens => "SUM(t.cache_read_tokens)".to_string(),
            Metric::CacheWriteTokens => "SUM(t.cache_write_tokens)".to_string(),
            Metric::ThinkingChars => "SUM(t.thinking_chars)".to_string(),
            _ => "0".to_string(),
        }
    }

    fn contribution_expr(&self, metric: Metric) -> String {
        match metric {
            Metric::Cost => "SUM(t.cost_usd)".to_string(),
            other => self.metric_expr(other),
        }
    }

    fn from_clause(&self, _join_turn: bool) -> String {
        "turn t JOIN session s ON s.id = t.session_id".to_string()
    }

    fn semi_join(&self, dimension: Dimension, values: usize) -> Option<String> {
        match dimension {
            Dimension::Language => Some(semi_join_on(
                "tool_call",
                text_label("sj.language"),
                values,
            )),
            _ => None,
        }
    }
}

pub(crate) struct RawToolCalls {
    pub timezone: Timezone,
}

impl AggregationSource for RawToolCalls {
    fn family(&self) -> FactFamily {
        FactFamily::ToolCalls
    }

    fn column(&self, dimension: Dimension) -> Option<Column> {
        match dimension {
            Dimension::Date => Some(Column::own(self.date_expr())),
            Dimension::Model => Some(Column::via_turn(text_label("t.model"))),
            Dimension::EntryType => Some(Column::via_turn(text_label("t.entry_type"))),
            Dimension::Tool => Some(Column::own(text_label("c.tool_name"))),
            Dimension::Language => Some(Column::own(text_label("c.language"))),
            Dimension::ErrorCategory => Some(Column::own(text_label("c.error_category"))),
            other => session_column(other),
        }
    }

    fn date_expr(&self) -> String {
        local_date_expr("c.timestamp", self.timezone)
    }

    fn metric_expr(&self, metric: Metric) -> String {
        match metric {
            Metric::ToolCalls => "COUNT(*)".to_string(),
            Metric::Errors => "SUM(CASE WHEN c.success = 0 THEN 1 ELSE 0 END)".to_string(),
            Metric::LinesAdded => "SUM(c.lines_added)".to_string(),
            Metric::LinesDeleted => "SUM(c.lines_deleted)".to_string(),
            Metric::LocWritten => "SUM(c.loc_written)".to_string(),
            _ => "0".to_string(),
        }
    }

    fn from_clause(&self, join_turn: bool) -> String {
        let mut from = "tool_call c JOIN session s ON s.id = c.session_id".to_string();
        if join_turn {
            from.push_str(" LEFT JOIN turn t ON t.id = c.turn_id");
        }
        from
    }
}

pub(crate) struct RawSessions {
    pub timezone: Timezone,
}

impl AggregationSource for RawSessions {
    fn family(&self) -> FactFamily {
        FactFamily::Sessions
    }

    fn column(&self, dimension: Dimension) -> Option<Column> {
        match dimension {
            Dimension::Date => Some(Column::own(self.date_expr())),
            other => session_column(other),
        }
    }

    fn date_expr(&self) -> String {
        local_date_expr("s.first_timestamp", self.timezone)
    }

    fn metric_expr(&self, metric: Metric) -> String {
        match metric {
            Metric::Sessions => "COUNT(*)".to_string(),
            Metric::SessionDuration => "SUM(s.duration_seconds)".to_string(),
            Metric::SpawnedSessions => {
                "SUM(CASE WHEN s.parent_session_id IS NOT NULL THEN 1 ELSE 0 END)".to_string()
            }
            _ => "0".to_string(),
        }
    }

    fn from_clause(&self, _join_turn: bool) -> String {
        "session s".to_string()
    }

    fn semi_join(&self, dimension: Dimension, values: usize) -> Option<String> {
        match dimension {
            Dimension::Model => Some(semi_join_on("turn", text_label("sj.model"), values)),
            Dimension::Language => Some(semi_join_on(
                "tool_call",
                text_label("sj.language"),
                values,
            )),
            _ => None,
        }
    }
}

pub(crate) fn raw_source(family: FactFamily, timezone: Timezone) -> Box<dyn AggregationSource> {
    match family {
        FactFamily::Turns => Box::new(RawTurns { timezone }),
        FactFamily::ToolCalls => Box::new(RawToolCalls { timezone }),
        FactFamily::Sessions => Box::new(RawSessions { timezone }),
    }
}

pub(crate) fn rollup_table(family: FactFamily) -> &'static str {
    match family {
        FactFamily::Turns => "rollup_turn_daily",
        FactFamily::ToolCalls => "rollup_tool_call_daily",
        FactFamily::Sessions => "rollup_session_daily",
    }
}

/// Stored column holding a metric's pre-summed value.
pub(crate) fn rollup_metric_column(metric: Metric) -> &'static str {
    match metric {
        Metric::Cost => "cost_usd",
        other => other.as_str(),
    }
}

/// Reads a family's daily rollup table. Every stored column already holds
/// the raw label, so dimensions map to plain column references.
pub(crate) struct RollupSource {
    pub family: FactFamily,
}

impl AggregationSource for RollupSource {
    fn family(&self) -> FactFamily {
        self.family
    }

    fn column(&self, dimension: Dimension) -> Option<Column> {
        if !self.family.dimensions().contains(&dimension) {
            return None;
        }
        match dimension {
            Dimension::Date => Some(Column::own("r.local_date")),
            other => Some(Column::own(format!("r.{}", other.as_str()))),
        }
    }

    fn date_expr(&self) -> String {
        "r.local_date".to_string()
    }

    fn metric_expr(&self, metric: Metric) -> String {
        let column = rollup_metric_column(metric);
        if metric.is_currency() {
            format!("ROUND(SUM(r.{}), 6)", column)
        } else {
            format!("SUM(r.{})", column)
        }
    }

    fn from_clause(&self, _join_turn: bool) -> String {
        format!("{} r", rollup_table(self.family))
    }
}
