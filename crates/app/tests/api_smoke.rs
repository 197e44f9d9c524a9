use explorer_app::{ApiError, AppState, ExplorerConfig};
use explorer_core::{
    Dimension, DrilldownRequest, ExecutionPath, Metric, PatternFilters, QueryRequest,
    SessionRecord, Timezone, ToolCallRecord, TurnRecord, TurnTokens,
};
use tempfile::tempdir;

fn session(id: &str, parent: Option<&str>, is_agent: bool) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        project: "alpha".to_string(),
        first_timestamp: "2025-12-19T10:00:00Z".to_string(),
        last_timestamp: "2025-12-19T11:00:00Z".to_string(),
        duration_seconds: 3600,
        is_agent,
        parent_session_id: parent.map(str::to_string),
        branch: Some("main".to_string()),
        tool_version: Some("1.0.0".to_string()),
    }
}

fn turn(id: i64, session_id: &str, cost_usd: f64) -> TurnRecord {
    TurnRecord {
        id,
        uuid: format!("u{}", id),
        session_id: session_id.to_string(),
        timestamp: "2025-12-19T10:05:00Z".to_string(),
        model: Some("claude-opus-4".to_string()),
        tokens: TurnTokens::default(),
        thinking_chars: 0,
        cost_usd,
        stop_reason: None,
        is_sidechain: false,
        is_meta: false,
        entry_type: "assistant".to_string(),
    }
}

fn call(id: i64, turn_id: i64, session_id: &str, success: bool) -> ToolCallRecord {
    ToolCallRecord {
        id,
        turn_id,
        session_id: session_id.to_string(),
        timestamp: format!("2025-12-19T10:05:{:02}Z", id),
        tool_name: "Bash".to_string(),
        success,
        error_category: None,
        lines_added: 0,
        lines_deleted: 0,
        loc_written: 0,
        language: None,
        file_path: None,
    }
}

#[test]
fn explorer_services_smoke() {
    let dir = tempdir().expect("temp dir");
    let config = ExplorerConfig {
        db_path: dir.path().join("app.sqlite"),
        timezone: Timezone::utc(),
        ..ExplorerConfig::default()
    };
    let app_state = AppState::new(config);
    app_state.initialize().expect("initialize");

    let mut db = app_state.open_db().expect("open db");
    db.insert_sessions(&[session("root", None, false), session("child", Some("root"), true)])
        .expect("sessions");
    db.insert_turns(&[turn(1, "root", 1.25), turn(2, "child", 0.5)])
        .expect("turns");
    db.insert_tool_calls(&[
        call(1, 2, "child", false),
        call(2, 2, "child", false),
        call(3, 2, "child", true),
    ])
    .expect("calls");

    let request = QueryRequest::new(Metric::Cost, Dimension::UserType);
    let raw = app_state.services.explorer.query(&request).expect("query");
    assert_eq!(raw.metadata.source, ExecutionPath::Raw);
    assert!((raw.metadata.total - 1.75).abs() < 1e-9);

    let counts = app_state.services.rollups.refresh().expect("refresh");
    assert_eq!(counts.sessions, 2);
    let materialized = app_state.services.explorer.query(&request).expect("query");
    assert_eq!(materialized.metadata.source, ExecutionPath::Materialized);
    assert_eq!(materialized.rows, raw.rows);

    let drilldown = app_state
        .services
        .explorer
        .drilldown(&DrilldownRequest::new(request, "agent").page(1, 0))
        .expect("drilldown");
    assert_eq!(drilldown.pagination.page_size, 25);
    assert_eq!(drilldown.sessions[0].session_id, "child");
    assert_eq!(drilldown.sessions[0].errors, 2);

    let options = app_state
        .services
        .explorer
        .filter_options(None, None)
        .expect("options");
    assert_eq!(options.models[0].value, "claude-opus-4");

    let filters = PatternFilters::default();
    let loops = app_state.services.patterns.retry_loops(&filters).expect("loops");
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].retries, 2);
    let handoffs = app_state
        .services
        .patterns
        .failure_handoffs(&filters)
        .expect("handoffs");
    assert_eq!(handoffs.handoffs.len(), 1);
    let sequences = app_state
        .services
        .patterns
        .sequences(&filters, None)
        .expect("sequences");
    assert_eq!(sequences[0].tools, vec!["Bash", "Bash", "Bash"]);
}

#[test]
fn invalid_queries_map_to_bad_request() {
    let dir = tempdir().expect("temp dir");
    let config = ExplorerConfig {
        db_path: dir.path().join("app.sqlite"),
        ..ExplorerConfig::default()
    };
    let app_state = AppState::new(config);
    app_state.initialize().expect("initialize");

    let request = QueryRequest::new(Metric::SessionDuration, Dimension::Tool);
    let err = app_state
        .services
        .explorer
        .query(&request)
        .expect_err("invalid");
    let api = ApiError::from(err);
    assert_eq!(api.status, 400);
    assert_eq!(api.code.as_deref(), Some("invalid_query"));
    assert_eq!(api.field.as_deref(), Some("group_by"));
    assert!(api.allowed.contains(&"project".to_string()));
}
