//! Behavioral pattern miners.
//!
//! Every miner here is a pure function over events already read from the
//! fact store. Events are regrouped per session before any sequential logic
//! runs, so nothing a miner reports can straddle two sessions even if the
//! input was not ordered by session.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pseudo-tool marking the start of a session in transition pairs.
pub const START_TOOL: &str = "START";

pub const DEFAULT_SEQUENCE_WINDOW: usize = 3;
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;
pub const DEFAULT_ANOMALY_LIMIT: usize = 20;

/// Minimum number of days a branch needs before it can have anomalies.
pub const MIN_ANOMALY_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub session_id: String,
    pub tool: String,
    pub success: bool,
}

/// Splits events into per-session runs, keeping the relative order of each
/// session's events. Sessions come back ordered by id.
fn by_session(events: &[ToolEvent]) -> BTreeMap<&str, Vec<&ToolEvent>> {
    let mut sessions: BTreeMap<&str, Vec<&ToolEvent>> = BTreeMap::new();
    for event in events {
        sessions
            .entry(event.session_id.as_str())
            .or_default()
            .push(event);
    }
    sessions
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub count: u64,
    pub failures: u64,
    pub failure_rate: f64,
}

/// Counts `previous -> current` tool pairs. A failure is attributed to the
/// transition that led into the failing call.
pub fn mine_transitions(events: &[ToolEvent]) -> Vec<Transition> {
    let mut counts: HashMap<(&str, &str), (u64, u64)> = HashMap::new();
    for session_events in by_session(events).values() {
        let mut previous = START_TOOL;
        for event in session_events.iter().copied() {
            let entry = counts.entry((previous, event.tool.as_str())).or_default();
            entry.0 += 1;
            if !event.success {
                entry.1 += 1;
            }
            previous = event.tool.as_str();
        }
    }
    let mut transitions: Vec<Transition> = counts
        .into_iter()
        .map(|((from, to), (count, failures))| Transition {
            from: from.to_string(),
            to: to.to_string(),
            count,
            failures,
            failure_rate: failures as f64 / count as f64,
        })
        .collect();
    transitions.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
    });
    transitions
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryLoop {
    pub session_id: String,
    pub tool: String,
    pub retries: u64,
    /// Failed calls of this tool anywhere in the session.
    pub failed_attempts: u64,
}

/// A retry is a call that repeats the previous call's tool right after that
/// call failed.
pub fn detect_retry_loops(events: &[ToolEvent]) -> Vec<RetryLoop> {
    let mut loops: Vec<RetryLoop> = Vec::new();
    for (session_id, session_events) in by_session(events) {
        let mut per_tool: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for event in session_events.iter().copied() {
            if !event.success {
                per_tool.entry(event.tool.as_str()).or_default().1 += 1;
            }
        }
        for pair in session_events.windows(2) {
            let (previous, current) = (pair[0], pair[1]);
            if previous.tool == current.tool && !previous.success {
                per_tool.entry(current.tool.as_str()).or_default().0 += 1;
            }
        }
        loops.extend(
            per_tool
                .into_iter()
                .filter(|(_, (retries, _))| *retries > 0)
                .map(|(tool, (retries, failed_attempts))| RetryLoop {
                    session_id: session_id.to_string(),
                    tool: tool.to_string(),
                    retries,
                    failed_attempts,
                }),
        );
    }
    loops.sort_by(|a, b| {
        b.retries
            .cmp(&a.retries)
            .then_with(|| a.session_id.cmp(&b.session_id))
            .then_with(|| a.tool.cmp(&b.tool))
    });
    loops
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePattern {
    pub tools: Vec<String>,
    pub count: u64,
    pub share: f64,
}

/// Most frequent fixed-size tool windows. `share` is relative to every
/// window observed across all sessions.
pub fn mine_sequences(events: &[ToolEvent], window: usize) -> Vec<SequencePattern> {
    if window == 0 {
        return Vec::new();
    }
    let mut counts: HashMap<Vec<&str>, u64> = HashMap::new();
    let mut total_windows = 0u64;
    for session_events in by_session(events).values() {
        let tools: Vec<&str> = session_events
            .iter()
            .copied()
            .map(|event| event.tool.as_str())
            .collect();
        for slice in tools.windows(window) {
            *counts.entry(slice.to_vec()).or_insert(0) += 1;
            total_windows += 1;
        }
    }
    let mut patterns: Vec<SequencePattern> = counts
        .into_iter()
        .map(|(tools, count)| SequencePattern {
            tools: tools.into_iter().map(str::to_string).collect(),
            count,
            share: count as f64 / total_windows as f64,
        })
        .collect();
    patterns.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tools.cmp(&b.tools)));
    patterns
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDailyCost {
    pub branch: String,
    pub date: NaiveDate,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyOptions {
    /// Number of population standard deviations above the mean.
    pub threshold: f64,
    pub limit: usize,
}

impl Default for AnomalyOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ANOMALY_THRESHOLD,
            limit: DEFAULT_ANOMALY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnomaly {
    pub branch: String,
    pub date: NaiveDate,
    pub cost: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub z_score: f64,
}

pub fn detect_cost_anomalies(
    points: &[BranchDailyCost],
    options: AnomalyOptions,
) -> Vec<CostAnomaly> {
    let mut series: BTreeMap<&str, Vec<&BranchDailyCost>> = BTreeMap::new();
    for point in points {
        series.entry(point.branch.as_str()).or_default().push(point);
    }
    let mut anomalies = Vec::new();
    for (branch, days) in series {
        if days.len() < MIN_ANOMALY_POINTS {
            continue;
        }
        let n = days.len() as f64;
        let mean = days.iter().map(|day| day.cost).sum::<f64>() / n;
        let variance = days
            .iter()
            .map(|day| (day.cost - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();
        if std_dev <= f64::EPSILON {
            continue;
        }
        let cutoff = mean + options.threshold * std_dev;
        for day in days {
            if day.cost > cutoff {
                anomalies.push(CostAnomaly {
                    branch: branch.to_string(),
                    date: day.date,
                    cost: day.cost,
                    mean,
                    std_dev,
                    z_score: (day.cost - mean) / std_dev,
                });
            }
        }
    }
    anomalies.sort_by(|a, b| {
        b.z_score
            .partial_cmp(&a.z_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.branch.cmp(&b.branch))
            .then_with(|| a.date.cmp(&b.date))
    });
    anomalies.truncate(options.limit);
    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(session: &str, tool: &str, success: bool) -> ToolEvent {
        ToolEvent {
            session_id: session.to_string(),
            tool: tool.to_string(),
            success,
        }
    }

    fn day(branch: &str, day: u32, cost: f64) -> BranchDailyCost {
        BranchDailyCost {
            branch: branch.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, day).expect("date"),
            cost,
        }
    }

    #[test]
    fn retries_count_each_repeat_after_failure() {
        let events = vec![
            event("a", "Write", false),
            event("a", "Write", false),
            event("a", "Write", true),
        ];
        let loops = detect_retry_loops(&events);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].session_id, "a");
        assert_eq!(loops[0].tool, "Write");
        assert_eq!(loops[0].retries, 2);
        assert_eq!(loops[0].failed_attempts, 2);
    }

    #[test]
    fn repeat_after_success_is_not_a_retry() {
        let events = vec![
            event("a", "Read", true),
            event("a", "Read", true),
            event("a", "Bash", false),
            event("b", "Bash", true),
        ];
        assert!(detect_retry_loops(&events).is_empty());
    }

    #[test]
    fn sequences_stay_inside_sessions() {
        let events = vec![
            event("x", "Write", true),
            event("x", "Read", true),
            event("x", "Write", true),
            event("x", "Bash", true),
            event("y", "Read", true),
            event("y", "Write", true),
            event("y", "Bash", true),
            event("y", "Edit", true),
        ];
        let patterns = mine_sequences(&events, 3);
        let count = |tools: &[&str]| {
            patterns
                .iter()
                .find(|pattern| pattern.tools == tools)
                .map(|pattern| pattern.count)
                .unwrap_or(0)
        };
        assert_eq!(count(&["Write", "Read", "Write"]), 1);
        assert_eq!(count(&["Read", "Write", "Bash"]), 2);
        assert_eq!(count(&["Write", "Bash", "Edit"]), 1);
        assert_eq!(count(&["Write", "Bash", "Read"]), 0);
        assert_eq!(count(&["Bash", "Read", "Write"]), 0);
        let total: u64 = patterns.iter().map(|pattern| pattern.count).sum();
        assert_eq!(total, 4);
        assert_eq!(patterns[0].tools, vec!["Read", "Write", "Bash"]);
        assert!((patterns[0].share - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sequences_ignore_interleaved_input_order() {
        let events = vec![
            event("x", "Read", true),
            event("y", "Edit", true),
            event("x", "Edit", true),
            event("y", "Bash", true),
        ];
        let patterns = mine_sequences(&events, 2);
        let windows: Vec<_> = patterns.iter().map(|pattern| pattern.tools.clone()).collect();
        assert_eq!(windows.len(), 2);
        assert!(windows.contains(&vec!["Read".to_string(), "Edit".to_string()]));
        assert!(windows.contains(&vec!["Edit".to_string(), "Bash".to_string()]));
    }

    #[test]
    fn transitions_start_each_session_fresh() {
        let events = vec![
            event("a", "Read", true),
            event("a", "Edit", false),
            event("a", "Edit", true),
            event("b", "Edit", true),
        ];
        let transitions = mine_transitions(&events);
        let find = |from: &str, to: &str| {
            transitions
                .iter()
                .find(|t| t.from == from && t.to == to)
                .cloned()
        };
        assert_eq!(find(START_TOOL, "Read").expect("start read").count, 1);
        assert_eq!(find(START_TOOL, "Edit").expect("start edit").count, 1);
        let read_edit = find("Read", "Edit").expect("read edit");
        assert_eq!(read_edit.failures, 1);
        assert!((read_edit.failure_rate - 1.0).abs() < 1e-12);
        assert_eq!(find("Edit", "Edit").expect("edit edit").failures, 0);
        assert!(find("Edit", "Read").is_none());
        assert_eq!(transitions.iter().map(|t| t.count).sum::<u64>(), 4);
    }

    #[test]
    fn anomaly_threshold_boundary() {
        let points = vec![
            day("main", 1, 1.0),
            day("main", 2, 1.0),
            day("main", 3, 10.0),
            day("feature", 1, 1.0),
        ];
        // z = (10 - 4) / 4.2426 ~= 1.414, below the default 2 sigma cutoff.
        assert!(detect_cost_anomalies(&points, AnomalyOptions::default()).is_empty());

        let loose = AnomalyOptions {
            threshold: 1.0,
            limit: 10,
        };
        let anomalies = detect_cost_anomalies(&points, loose);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].branch, "main");
        assert_eq!(anomalies[0].date.to_string(), "2025-12-03");
        assert!((anomalies[0].mean - 4.0).abs() < 1e-9);
        assert!((anomalies[0].z_score - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn anomaly_flags_spike_over_two_sigma() {
        let mut points: Vec<_> = (1..=9).map(|d| day("main", d, 1.0)).collect();
        points.push(day("main", 10, 10.0));
        let anomalies = detect_cost_anomalies(&points, AnomalyOptions::default());
        assert_eq!(anomalies.len(), 1);
        assert!((anomalies[0].z_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn anomaly_needs_points_and_variance() {
        let flat = vec![day("main", 1, 2.0), day("main", 2, 2.0), day("main", 3, 2.0)];
        assert!(detect_cost_anomalies(&flat, AnomalyOptions { threshold: 0.0, limit: 5 }).is_empty());
        let short = vec![day("dev", 1, 1.0), day("dev", 2, 50.0)];
        assert!(detect_cost_anomalies(&short, AnomalyOptions { threshold: 0.0, limit: 5 }).is_empty());
    }
}
