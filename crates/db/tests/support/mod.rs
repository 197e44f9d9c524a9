#![allow(dead_code)]

use std::path::PathBuf;

use explorer_core::{SessionRecord, Timezone, ToolCallRecord, TurnRecord, TurnTokens};
use explorer_db::Db;
use tempfile::TempDir;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

/// Fixtures are written in UTC and read two hours east of it, so a turn at
/// 22:30Z lands on the next local day.
pub fn test_timezone() -> Timezone {
    Timezone::fixed_hours(2)
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path)
        .expect("open db")
        .with_timezone(test_timezone());
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn reopen(test_db: &TestDb, timezone: Timezone) -> Db {
    Db::open(&test_db.path)
        .expect("reopen db")
        .with_timezone(timezone)
}

pub fn make_session(
    id: &str,
    project: &str,
    branch: Option<&str>,
    is_agent: bool,
    parent: Option<&str>,
    first: &str,
    last: &str,
) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        project: project.to_string(),
        first_timestamp: first.to_string(),
        last_timestamp: last.to_string(),
        duration_seconds: 600,
        is_agent,
        parent_session_id: parent.map(str::to_string),
        branch: branch.map(str::to_string),
        tool_version: Some("1.0.0".to_string()),
    }
}

pub fn make_turn(
    id: i64,
    session_id: &str,
    timestamp: &str,
    model: Option<&str>,
    cost_usd: f64,
) -> TurnRecord {
    TurnRecord {
        id,
        uuid: format!("turn-{}", id),
        session_id: session_id.to_string(),
        timestamp: timestamp.to_string(),
        model: model.map(str::to_string),
        tokens: TurnTokens {
            input_tokens: 100,
            output_tokens: 40,
            cache_read_tokens: 10,
            cache_write_tokens: 5,
            ephemeral_5m_tokens: 0,
            ephemeral_1h_tokens: 0,
        },
        thinking_chars: 20,
        cost_usd,
        stop_reason: Some("end_turn".to_string()),
        is_sidechain: false,
        is_meta: false,
        entry_type: "assistant".to_string(),
    }
}

pub fn make_call(
    id: i64,
    turn_id: i64,
    session_id: &str,
    timestamp: &str,
    tool: &str,
    success: bool,
) -> ToolCallRecord {
    ToolCallRecord {
        id,
        turn_id,
        session_id: session_id.to_string(),
        timestamp: timestamp.to_string(),
        tool_name: tool.to_string(),
        success,
        error_category: None,
        lines_added: 0,
        lines_deleted: 0,
        loc_written: 0,
        language: None,
        file_path: None,
    }
}

pub fn insert(
    db: &mut Db,
    sessions: Vec<SessionRecord>,
    turns: Vec<TurnRecord>,
    calls: Vec<ToolCallRecord>,
) {
    db.insert_sessions(&sessions).expect("insert sessions");
    db.insert_turns(&turns).expect("insert turns");
    db.insert_tool_calls(&calls).expect("insert tool calls");
}

/// Four sessions over three local days:
///
/// - `s1` alpha/main, human, two turns on Dec 18 (one `<synthetic>`).
/// - `s2` alpha/feature, agent spawned by `s1`, starts 22:30Z on Dec 18,
///   which is Dec 19 locally; one turn has no model.
/// - `s3` beta, no branch, human, turns on Dec 19 and Dec 20.
/// - `s4` beta, blank branch, agent spawned by `s3`, one `unknown` turn.
///
/// Costs are dyadic so sums compare exactly.
pub fn seed(db: &mut Db) {
    let mut s1 = make_session(
        "s1",
        "alpha",
        Some("main"),
        false,
        None,
        "2025-12-18T08:00:00Z",
        "2025-12-18T10:00:00Z",
    );
    s1.duration_seconds = 7200;
    let s2 = make_session(
        "s2",
        "alpha",
        Some("feature"),
        true,
        Some("s1"),
        "2025-12-18T22:30:00Z",
        "2025-12-18T23:30:00Z",
    );
    let mut s3 = make_session(
        "s3",
        "beta",
        None,
        false,
        None,
        "2025-12-19T09:00:00Z",
        "2025-12-20T09:00:00Z",
    );
    s3.tool_version = None;
    let mut s4 = make_session(
        "s4",
        "beta",
        Some("  "),
        true,
        Some("s3"),
        "2025-12-20T12:00:00Z",
        "2025-12-20T12:30:00Z",
    );
    s4.tool_version = Some("1.1.0".to_string());

    let mut t2 = make_turn(2, "s1", "2025-12-18T09:00:00Z", Some("<synthetic>"), 0.0);
    t2.stop_reason = None;
    let mut t3 = make_turn(3, "s2", "2025-12-18T22:30:00Z", Some("claude-sonnet-4"), 0.25);
    t3.stop_reason = Some("tool_use".to_string());
    let mut t4 = make_turn(4, "s2", "2025-12-18T23:00:00.500Z", None, 0.125);
    t4.entry_type = "user".to_string();
    t4.stop_reason = None;
    let turns = vec![
        make_turn(1, "s1", "2025-12-18T08:00:00Z", Some("claude-opus-4"), 0.5),
        t2,
        t3,
        t4,
        make_turn(5, "s3", "2025-12-19T09:00:00Z", Some("claude-opus-4"), 1.5),
        make_turn(6, "s3", "2025-12-20T09:00:00Z", Some("claude-sonnet-4"), 0.75),
        make_turn(7, "s4", "2025-12-20T12:00:00Z", Some("unknown"), 0.0625),
        make_turn(8, "s4", "2025-12-20T12:10:00Z", Some("claude-sonnet-4"), 2.0),
    ];

    let rust = |mut call: ToolCallRecord| {
        call.language = Some("rust".to_string());
        call.file_path = Some("src/lib.rs".to_string());
        call
    };
    let python = |mut call: ToolCallRecord| {
        call.language = Some("python".to_string());
        call.file_path = Some("app.py".to_string());
        call
    };
    let mut c2 = rust(make_call(2, 1, "s1", "2025-12-18T08:00:20Z", "Write", false));
    c2.error_category = Some("permission".to_string());
    c2.lines_added = 10;
    let mut c3 = rust(make_call(3, 1, "s1", "2025-12-18T08:00:30Z", "Write", true));
    c3.lines_added = 12;
    c3.lines_deleted = 2;
    c3.loc_written = 12;
    let mut c4 = make_call(4, 3, "s2", "2025-12-18T22:30:10Z", "Bash", false);
    c4.error_category = Some("exit_code".to_string());
    let mut c5 = make_call(5, 3, "s2", "2025-12-18T22:30:20Z", "Bash", false);
    c5.error_category = Some("exit_code".to_string());
    let mut c8 = python(make_call(8, 6, "s3", "2025-12-20T09:00:10Z", "Edit", true));
    c8.lines_added = 3;
    c8.lines_deleted = 1;
    c8.loc_written = 3;
    let mut c10 = make_call(10, 2, "s1", "2025-12-18T09:00:10Z", "Read", true);
    c10.language = Some(String::new());
    let calls = vec![
        rust(make_call(1, 1, "s1", "2025-12-18T08:00:10Z", "Read", true)),
        c2,
        c3,
        c4,
        c5,
        make_call(6, 4, "s2", "2025-12-18T23:00:10Z", "Bash", true),
        python(make_call(7, 5, "s3", "2025-12-19T09:00:10Z", "Read", true)),
        c8,
        make_call(9, 8, "s4", "2025-12-20T12:10:10Z", "Grep", true),
        c10,
    ];

    insert(db, vec![s1, s2, s3, s4], turns, calls);
}

pub fn seeded_db() -> TestDb {
    let mut test_db = setup_db();
    seed(&mut test_db.db);
    test_db
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
