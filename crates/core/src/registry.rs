//! Dimension/metric registry.
//!
//! Every metric belongs to exactly one fact family, and each family declares
//! the dimensions it can be grouped or split by without a fan-out join. The
//! tables below are the only place that decides which (metric, dimension)
//! combinations are physically valid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactFamily {
    Turns,
    ToolCalls,
    Sessions,
}

impl FactFamily {
    pub const ALL: [FactFamily; 3] = [
        FactFamily::Turns,
        FactFamily::ToolCalls,
        FactFamily::Sessions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactFamily::Turns => "turns",
            FactFamily::ToolCalls => "tool_calls",
            FactFamily::Sessions => "sessions",
        }
    }

    pub fn dimensions(&self) -> &'static [Dimension] {
        match self {
            FactFamily::Turns => TURN_DIMENSIONS,
            FactFamily::ToolCalls => TOOL_CALL_DIMENSIONS,
            FactFamily::Sessions => SESSION_DIMENSIONS,
        }
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL
            .into_iter()
            .filter(move |metric| metric.family() == *self)
    }
}

impl fmt::Display for FactFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cost,
    Turns,
    InputTokens,
    OutputTokens,
    CacheReadTokens,
    CacheWriteTokens,
    ThinkingChars,
    ToolCalls,
    Errors,
    LinesAdded,
    LinesDeleted,
    LocWritten,
    Sessions,
    SessionDuration,
    SpawnedSessions,
}

impl Metric {
    pub const ALL: [Metric; 15] = [
        Metric::Cost,
        Metric::Turns,
        Metric::InputTokens,
        Metric::OutputTokens,
        Metric::CacheReadTokens,
        Metric::CacheWriteTokens,
        Metric::ThinkingChars,
        Metric::ToolCalls,
        Metric::Errors,
        Metric::LinesAdded,
        Metric::LinesDeleted,
        Metric::LocWritten,
        Metric::Sessions,
        Metric::SessionDuration,
        Metric::SpawnedSessions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cost => "cost",
            Metric::Turns => "turns",
            Metric::InputTokens => "input_tokens",
            Metric::OutputTokens => "output_tokens",
            Metric::CacheReadTokens => "cache_read_tokens",
            Metric::CacheWriteTokens => "cache_write_tokens",
            Metric::ThinkingChars => "thinking_chars",
            Metric::ToolCalls => "tool_calls",
            Metric::Errors => "errors",
            Metric::LinesAdded => "lines_added",
            Metric::LinesDeleted => "lines_deleted",
            Metric::LocWritten => "loc_written",
            Metric::Sessions => "sessions",
            Metric::SessionDuration => "session_duration",
            Metric::SpawnedSessions => "spawned_sessions",
        }
    }

    pub fn family(&self) -> FactFamily {
        match self {
            Metric::Cost
            | Metric::Turns
            | Metric::InputTokens
            | Metric::OutputTokens
            | Metric::CacheReadTokens
            | Metric::CacheWriteTokens
            | Metric::ThinkingChars => FactFamily::Turns,
            Metric::ToolCalls
            | Metric::Errors
            | Metric::LinesAdded
            | Metric::LinesDeleted
            | Metric::LocWritten => FactFamily::ToolCalls,
            Metric::Sessions | Metric::SessionDuration | Metric::SpawnedSessions => {
                FactFamily::Sessions
            }
        }
    }

    /// Monetary metrics are rounded; everything else is an exact count.
    pub fn is_currency(&self) -> bool {
        matches!(self, Metric::Cost)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = InvalidQuery;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.as_str() == value)
            .ok_or_else(|| {
                InvalidQuery::new("metric", "unknown metric")
                    .with_value(value)
                    .with_allowed(Metric::ALL.iter().map(Metric::as_str))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Date,
    Project,
    Branch,
    UserType,
    ToolVersion,
    Model,
    EntryType,
    StopReason,
    Tool,
    Language,
    ErrorCategory,
}

impl Dimension {
    pub const ALL: [Dimension; 11] = [
        Dimension::Date,
        Dimension::Project,
        Dimension::Branch,
        Dimension::UserType,
        Dimension::ToolVersion,
        Dimension::Model,
        Dimension::EntryType,
        Dimension::StopReason,
        Dimension::Tool,
        Dimension::Language,
        Dimension::ErrorCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Date => "date",
            Dimension::Project => "project",
            Dimension::Branch => "branch",
            Dimension::UserType => "user_type",
            Dimension::ToolVersion => "tool_version",
            Dimension::Model => "model",
            Dimension::EntryType => "entry_type",
            Dimension::StopReason => "stop_reason",
            Dimension::Tool => "tool",
            Dimension::Language => "language",
            Dimension::ErrorCategory => "error_category",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = InvalidQuery;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == value)
            .ok_or_else(|| {
                InvalidQuery::new("dimension", "unknown dimension")
                    .with_value(value)
                    .with_allowed(Dimension::ALL.iter().map(Dimension::as_str))
            })
    }
}

const SESSION_DIMENSIONS: &[Dimension] = &[
    Dimension::Date,
    Dimension::Project,
    Dimension::Branch,
    Dimension::UserType,
    Dimension::ToolVersion,
];

const TURN_DIMENSIONS: &[Dimension] = &[
    Dimension::Date,
    Dimension::Project,
    Dimension::Branch,
    Dimension::UserType,
    Dimension::ToolVersion,
    Dimension::Model,
    Dimension::EntryType,
    Dimension::StopReason,
];

const TOOL_CALL_DIMENSIONS: &[Dimension] = &[
    Dimension::Date,
    Dimension::Project,
    Dimension::Branch,
    Dimension::UserType,
    Dimension::ToolVersion,
    Dimension::Model,
    Dimension::EntryType,
    Dimension::Tool,
    Dimension::Language,
    Dimension::ErrorCategory,
];

pub fn allowed_dimensions(metric: Metric) -> &'static [Dimension] {
    metric.family().dimensions()
}

pub fn validate(
    metric: Metric,
    group_by: Dimension,
    split_by: Option<Dimension>,
) -> Result<(), InvalidQuery> {
    let allowed = allowed_dimensions(metric);
    let reject = |field: &str, dimension: Dimension| {
        InvalidQuery::new(
            field,
            format!("dimension {} is not available for metric {}", dimension, metric),
        )
        .with_value(dimension.as_str())
        .with_allowed(allowed.iter().map(Dimension::as_str))
    };
    if !allowed.contains(&group_by) {
        return Err(reject("group_by", group_by));
    }
    if let Some(split_by) = split_by {
        if !allowed.contains(&split_by) {
            return Err(reject("split_by", split_by));
        }
        if split_by == group_by {
            return Err(
                InvalidQuery::new("split_by", "split_by must differ from group_by")
                    .with_value(split_by.as_str()),
            );
        }
    }
    Ok(())
}

/// Every (metric, group_by, split_by) combination the registry accepts.
pub fn legal_combinations() -> Vec<(Metric, Dimension, Option<Dimension>)> {
    let mut combos = Vec::new();
    for metric in Metric::ALL {
        let allowed = allowed_dimensions(metric);
        for group_by in allowed {
            combos.push((metric, *group_by, None));
            for split_by in allowed {
                if split_by != group_by {
                    combos.push((metric, *group_by, Some(*split_by)));
                }
            }
        }
    }
    combos
}
