use chrono::NaiveDate;
use explorer_core::{FilterOption, FilterOptions};
use rusqlite::{Connection, params_from_iter};

use crate::Db;
use crate::error::Result;
use crate::local_date::local_date_expr;
use crate::strategy::{known_model_predicate, text_label};

struct OptionSource<'a> {
    label: String,
    from: &'a str,
    timestamp: &'a str,
    extra: Option<String>,
}

fn option_values(
    conn: &Connection,
    source: OptionSource<'_>,
    date_expr: impl Fn(&str) -> String,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    limit: usize,
) -> Result<Vec<FilterOption>> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(date_from) = date_from {
        clauses.push(format!("{} >= ?", date_expr(source.timestamp)));
        params.push(date_from.to_string());
    }
    if let Some(date_to) = date_to {
        clauses.push(format!("{} <= ?", date_expr(source.timestamp)));
        params.push(date_to.to_string());
    }
    if let Some(extra) = source.extra {
        clauses.push(extra);
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {label} AS value, COUNT(*) AS n FROM {from} {where_clause} GROUP BY value ORDER BY n DESC, value ASC LIMIT {limit}",
        label = source.label,
        from = source.from,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok(FilterOption {
                value: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Db {
    /// Distinct filter values in a date range, most frequent first.
    ///
    /// Projects and branches count sessions, models count turns and
    /// languages count tool calls. Placeholder models are never offered.
    pub fn filter_options(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        limit: usize,
    ) -> Result<FilterOptions> {
        let date_expr = |column: &str| local_date_expr(column, self.timezone);
        let model_label = text_label("t.model");
        let projects = option_values(
            &self.conn,
            OptionSource {
                label: text_label("s.project"),
                from: "session s",
                timestamp: "s.first_timestamp",
                extra: None,
            },
            date_expr,
            date_from,
            date_to,
            limit,
        )?;
        let branches = option_values(
            &self.conn,
            OptionSource {
                label: text_label("s.branch"),
                from: "session s",
                timestamp: "s.first_timestamp",
                extra: None,
            },
            date_expr,
            date_from,
            date_to,
            limit,
        )?;
        let models = option_values(
            &self.conn,
            OptionSource {
                extra: Some(known_model_predicate(&model_label)),
                label: model_label,
                from: "turn t",
                timestamp: "t.timestamp",
            },
            date_expr,
            date_from,
            date_to,
            limit,
        )?;
        let languages = option_values(
            &self.conn,
            OptionSource {
                label: text_label("c.language"),
                from: "tool_call c",
                timestamp: "c.timestamp",
                extra: None,
            },
            date_expr,
            date_from,
            date_to,
            limit,
        )?;
        Ok(FilterOptions {
            projects,
            models,
            branches,
            languages,
        })
    }
}
