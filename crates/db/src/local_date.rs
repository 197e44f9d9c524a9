use explorer_core::Timezone;

/// SQL expression for the local calendar date (`YYYY-MM-DD`) of a stored
/// UTC timestamp column.
///
/// This is the only place the local-date rule is written down; aggregation,
/// rollup refresh, drill-down and the miners all call it.
pub fn local_date_expr(column: &str, timezone: Timezone) -> String {
    match timezone {
        Timezone::Local => format!("date({}, 'localtime')", column),
        Timezone::FixedOffset { minutes } => {
            format!("date({}, '{:+} minutes')", column, minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn eval(expr: &str) -> String {
        let conn = Connection::open_in_memory().expect("open");
        conn.query_row(&format!("SELECT {}", expr), [], |row| row.get(0))
            .expect("eval")
    }

    #[test]
    fn formats_expressions() {
        assert_eq!(
            local_date_expr("t.timestamp", Timezone::Local),
            "date(t.timestamp, 'localtime')"
        );
        assert_eq!(
            local_date_expr("t.timestamp", Timezone::FixedOffset { minutes: -300 }),
            "date(t.timestamp, '-300 minutes')"
        );
        assert_eq!(
            local_date_expr("t.timestamp", Timezone::utc()),
            "date(t.timestamp, '+0 minutes')"
        );
    }

    #[test]
    fn fixed_offset_crosses_midnight() {
        let east = local_date_expr("'2025-12-18T22:30:00Z'", Timezone::fixed_hours(2));
        assert_eq!(eval(&east), "2025-12-19");
        let west = local_date_expr("'2025-12-19T01:15:00.250Z'", Timezone::fixed_hours(-5));
        assert_eq!(eval(&west), "2025-12-18");
        let utc = local_date_expr("'2025-12-19T23:59:59Z'", Timezone::utc());
        assert_eq!(eval(&utc), "2025-12-19");
    }
}
