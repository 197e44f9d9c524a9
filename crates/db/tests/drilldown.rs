mod support;

use chrono::NaiveDate;
use explorer_core::{
    DailyCost, Dimension, DrilldownRequest, Metric, QueryFilters, QueryRequest,
};
use explorer_db::{Db, DbError};
use support::{assert_close, insert, make_session, make_turn, seeded_db, setup_db};

fn all_pages(db: &Db, request: DrilldownRequest) -> Vec<(String, f64)> {
    let mut sessions = Vec::new();
    let mut page = 1;
    loop {
        let result = db
            .drilldown(&request.clone().page(page, 1))
            .expect("drilldown");
        if result.sessions.is_empty() {
            assert_eq!(u64::from(page) - 1, result.pagination.total_count);
            break;
        }
        sessions.extend(
            result
                .sessions
                .into_iter()
                .map(|session| (session.session_id, session.bucket_value)),
        );
        page += 1;
    }
    sessions
}

#[test]
fn lists_contributing_sessions_with_totals() {
    let test_db = seeded_db();
    let query = QueryRequest::new(Metric::Cost, Dimension::Project);
    let result = test_db
        .db
        .drilldown(&DrilldownRequest::new(query, "beta"))
        .expect("drilldown");
    assert_eq!(result.bucket.group_value, "beta");
    assert_eq!(result.pagination.total_count, 2);
    assert_eq!(result.pagination.total_pages, 1);
    let ids: Vec<_> = result
        .sessions
        .iter()
        .map(|session| session.session_id.as_str())
        .collect();
    assert_eq!(ids, vec!["s3", "s4"]);

    let s3 = &result.sessions[0];
    assert_close(s3.bucket_value, 2.25);
    assert_close(s3.total_cost, 2.25);
    assert_eq!(s3.turns, 2);
    assert_eq!(s3.tool_calls, 2);
    assert_eq!(s3.errors, 0);
    assert_eq!(s3.user_type, "human");
    assert_eq!(s3.branch, None);
    assert_eq!(s3.tool_version, None);
    assert_eq!(result.sessions[1].user_type, "agent");
    assert_eq!(result.sessions[1].branch, None);
    assert_eq!(result.sessions[1].tool_version.as_deref(), Some("1.1.0"));
    assert_close(result.sessions[1].bucket_value, 2.0625);
}

#[test]
fn split_buckets_select_on_both_labels() {
    let test_db = seeded_db();
    let query = QueryRequest::new(Metric::ToolCalls, Dimension::Tool).split_by(Dimension::Model);
    let request = DrilldownRequest::new(query, "Bash").split_value("claude-sonnet-4");
    let result = test_db.db.drilldown(&request).expect("drilldown");
    assert_eq!(result.sessions.len(), 1);
    let s2 = &result.sessions[0];
    assert_eq!(s2.session_id, "s2");
    assert_close(s2.bucket_value, 2.0);
    assert_eq!(s2.tool_calls, 3);
    assert_eq!(s2.errors, 2);
    assert_eq!(s2.turns, 2);
    assert_close(s2.total_cost, 0.375);
    assert_eq!(s2.branch.as_deref(), Some("feature"));
}

#[test]
fn date_buckets_use_local_dates() {
    let test_db = seeded_db();
    let query = QueryRequest::new(Metric::Turns, Dimension::Date);
    let result = test_db
        .db
        .drilldown(&DrilldownRequest::new(query, "2025-12-19"))
        .expect("drilldown");
    let sessions: Vec<_> = result
        .sessions
        .iter()
        .map(|session| (session.session_id.as_str(), session.bucket_value))
        .collect();
    assert_eq!(sessions, vec![("s2", 2.0), ("s3", 1.0)]);
}

#[test]
fn pages_add_up_to_each_bucket() {
    let test_db = seeded_db();
    let queries = vec![
        QueryRequest::new(Metric::Cost, Dimension::Project).split_by(Dimension::Model),
        QueryRequest::new(Metric::ToolCalls, Dimension::Date),
        QueryRequest::new(Metric::Errors, Dimension::Branch).split_by(Dimension::Tool),
        QueryRequest::new(Metric::Sessions, Dimension::UserType),
        QueryRequest::new(Metric::Cost, Dimension::Project).with_filters(QueryFilters {
            languages: vec!["rust".to_string()],
            ..QueryFilters::default()
        }),
    ];
    for query in queries {
        let result = test_db.db.execute(&query, false).expect("query");
        for row in &result.rows {
            let mut request = DrilldownRequest::new(query.clone(), row.group.clone());
            request.split_value = row.split.clone();
            let sessions = all_pages(&test_db.db, request);
            let sum: f64 = sessions.iter().map(|(_, value)| value).sum();
            assert_close(sum, row.value);
            let mut ids: Vec<_> = sessions.iter().map(|(id, _)| id.clone()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), sessions.len());
        }
    }
}

#[test]
fn sub_micro_costs_add_up_to_the_bucket() {
    let mut test_db = setup_db();
    let sessions = (0..10)
        .map(|idx| {
            make_session(
                &format!("m{idx}"),
                "micro",
                Some("main"),
                false,
                None,
                "2025-12-18T09:00:00Z",
                "2025-12-18T09:30:00Z",
            )
        })
        .collect();
    let turns = (0..10)
        .map(|idx| {
            make_turn(
                idx + 1,
                &format!("m{idx}"),
                "2025-12-18T09:05:00Z",
                Some("claude-opus-4"),
                0.0000004,
            )
        })
        .collect();
    insert(&mut test_db.db, sessions, turns, Vec::new());

    let query = QueryRequest::new(Metric::Cost, Dimension::Project);
    let result = test_db.db.execute(&query, false).expect("query");
    assert_eq!(result.rows.len(), 1);
    assert_close(result.rows[0].value, 0.000004);

    let sessions = all_pages(&test_db.db, DrilldownRequest::new(query, "micro"));
    assert_eq!(sessions.len(), 10);
    let sum: f64 = sessions.iter().map(|(_, value)| value).sum();
    assert_close(sum, result.rows[0].value);
    assert!(sessions.iter().all(|(_, value)| *value > 0.0));
}

#[test]
fn pages_past_the_end_are_empty() {
    let test_db = seeded_db();
    let query = QueryRequest::new(Metric::Cost, Dimension::Project);
    let result = test_db
        .db
        .drilldown(&DrilldownRequest::new(query, "alpha").page(3, 1))
        .expect("drilldown");
    assert!(result.sessions.is_empty());
    assert_eq!(result.pagination.total_count, 2);
    assert_eq!(result.pagination.total_pages, 2);
}

#[test]
fn rejects_placeholder_and_mismatched_selectors() {
    let test_db = seeded_db();
    let query = QueryRequest::new(Metric::Cost, Dimension::Model);
    let err = test_db
        .db
        .drilldown(&DrilldownRequest::new(query.clone(), "unknown"))
        .expect_err("placeholder");
    assert!(matches!(err, DbError::InvalidQuery(ref inner) if inner.field == "group_value"));

    let err = test_db
        .db
        .drilldown(&DrilldownRequest::new(query, "claude-opus-4").split_value("alpha"))
        .expect_err("split without split_by");
    assert!(matches!(err, DbError::InvalidQuery(ref inner) if inner.field == "split_value"));
}

#[test]
fn session_cost_trend_uses_local_days() {
    let test_db = seeded_db();
    let date = |d: u32| NaiveDate::from_ymd_opt(2025, 12, d).expect("date");
    assert_eq!(
        test_db.db.session_cost_trend("s3").expect("trend"),
        vec![
            DailyCost {
                date: date(19),
                cost: 1.5
            },
            DailyCost {
                date: date(20),
                cost: 0.75
            },
        ]
    );
    assert_eq!(
        test_db.db.session_cost_trend("s2").expect("trend"),
        vec![DailyCost {
            date: date(19),
            cost: 0.375
        }]
    );
    assert!(test_db.db.session_cost_trend("missing").expect("trend").is_empty());
}
