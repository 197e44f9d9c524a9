use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::InvalidQuery;
use crate::model::ModelName;
use crate::registry::{self, Dimension, FactFamily, Metric};

pub const MAX_PAGE_SIZE: u32 = 200;

/// Date range plus list filters shared by every query path.
///
/// Dates are local calendar dates and both ends are inclusive. List filters
/// match dimension labels and are ANDed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub projects: Vec<String>,
    pub models: Vec<String>,
    pub branches: Vec<String>,
    pub languages: Vec<String>,
}

impl QueryFilters {
    pub fn between(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            date_from: Some(date_from),
            date_to: Some(date_to),
            ..Self::default()
        }
    }

    /// Non-empty list filters paired with the dimension whose label they match.
    pub fn lists(&self) -> Vec<(Dimension, &[String])> {
        [
            (Dimension::Project, self.projects.as_slice()),
            (Dimension::Model, self.models.as_slice()),
            (Dimension::Branch, self.branches.as_slice()),
            (Dimension::Language, self.languages.as_slice()),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .collect()
    }

    pub fn validate(&self) -> Result<(), InvalidQuery> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(
                    InvalidQuery::new("date_from", "date_from must not be after date_to")
                        .with_value(from.to_string()),
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub metric: Metric,
    pub group_by: Dimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_by: Option<Dimension>,
    #[serde(flatten)]
    pub filters: QueryFilters,
}

impl QueryRequest {
    pub fn new(metric: Metric, group_by: Dimension) -> Self {
        Self {
            metric,
            group_by,
            split_by: None,
            filters: QueryFilters::default(),
        }
    }

    pub fn split_by(mut self, split_by: Dimension) -> Self {
        self.split_by = Some(split_by);
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn family(&self) -> FactFamily {
        self.metric.family()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> {
        std::iter::once(self.group_by).chain(self.split_by)
    }

    pub fn uses_model_dimension(&self) -> bool {
        self.dimensions().any(|dimension| dimension == Dimension::Model)
    }

    pub fn validate(&self) -> Result<(), InvalidQuery> {
        registry::validate(self.metric, self.group_by, self.split_by)?;
        self.filters.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
    pub value: f64,
}

/// Orders aggregation rows the same way regardless of which path produced them.
pub fn sort_rows(rows: &mut [AggregateRow], group_by: Dimension) {
    rows.sort_by(|a, b| {
        let primary = if group_by == Dimension::Date {
            a.group.cmp(&b.group)
        } else {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.group.cmp(&b.group))
        };
        primary.then_with(|| a.split.cmp(&b.split))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    Raw,
    Materialized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub metric: Metric,
    pub group_by: Dimension,
    pub split_by: Option<Dimension>,
    pub total: f64,
    pub row_count: usize,
    pub groups: Vec<String>,
    pub splits: Vec<String>,
    pub source: ExecutionPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<AggregateRow>,
    pub metadata: QueryMetadata,
}

impl QueryResult {
    pub fn from_rows(
        request: &QueryRequest,
        mut rows: Vec<AggregateRow>,
        source: ExecutionPath,
    ) -> Self {
        sort_rows(&mut rows, request.group_by);
        let total = rows.iter().map(|row| row.value).sum();
        let mut groups: Vec<String> = Vec::new();
        for row in &rows {
            if !groups.contains(&row.group) {
                groups.push(row.group.clone());
            }
        }
        let mut split_totals: HashMap<&str, f64> = HashMap::new();
        for row in &rows {
            if let Some(split) = row.split.as_deref() {
                *split_totals.entry(split).or_insert(0.0) += row.value;
            }
        }
        let mut splits: Vec<(&str, f64)> = split_totals.into_iter().collect();
        splits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        let metadata = QueryMetadata {
            metric: request.metric,
            group_by: request.group_by,
            split_by: request.split_by,
            total,
            row_count: rows.len(),
            groups,
            splits: splits.into_iter().map(|(split, _)| split.to_string()).collect(),
            source,
        };
        Self { rows, metadata }
    }
}

/// Selects one bucket of a previous query result and a page of its sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrilldownRequest {
    #[serde(flatten)]
    pub query: QueryRequest,
    pub group_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_value: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    25
}

impl DrilldownRequest {
    pub fn new(query: QueryRequest, group_value: impl Into<String>) -> Self {
        Self {
            query,
            group_value: group_value.into(),
            split_value: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }

    pub fn split_value(mut self, split_value: impl Into<String>) -> Self {
        self.split_value = Some(split_value.into());
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size())
    }

    pub fn validate(&self) -> Result<(), InvalidQuery> {
        self.query.validate()?;
        match (self.query.split_by, self.split_value.as_deref()) {
            (Some(split_by), None) => {
                return Err(InvalidQuery::new(
                    "split_value",
                    format!("split_value is required when split_by is {}", split_by),
                ));
            }
            (None, Some(value)) => {
                return Err(
                    InvalidQuery::new("split_value", "split_value requires split_by")
                        .with_value(value),
                );
            }
            _ => {}
        }
        let model_selector = if self.query.group_by == Dimension::Model {
            Some(("group_value", self.group_value.as_str()))
        } else if self.query.split_by == Some(Dimension::Model) {
            self.split_value
                .as_deref()
                .map(|value| ("split_value", value))
        } else {
            None
        };
        if let Some((field, value)) = model_selector {
            if !ModelName::parse(Some(value)).is_known() {
                return Err(InvalidQuery::new(
                    field,
                    "placeholder model values are never reported as buckets",
                )
                .with_value(value));
            }
        }
        Ok(())
    }

    pub fn bucket(&self) -> Bucket {
        Bucket {
            metric: self.query.metric,
            group_by: self.query.group_by,
            group_value: self.group_value.clone(),
            split_by: self.query.split_by,
            split_value: self.split_value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub metric: Metric,
    pub group_by: Dimension,
    pub group_value: String,
    pub split_by: Option<Dimension>,
    pub split_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrilldownSession {
    pub session_id: String,
    pub project: String,
    pub first_timestamp: String,
    pub user_type: String,
    pub branch: Option<String>,
    pub tool_version: Option<String>,
    pub bucket_value: f64,
    pub total_cost: f64,
    pub turns: u64,
    pub tool_calls: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_count: u64) -> Self {
        let size = u64::from(page_size.max(1));
        Self {
            page: page.max(1),
            page_size,
            total_count,
            total_pages: total_count.div_ceil(size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrilldownResult {
    pub bucket: Bucket,
    pub sessions: Vec<DrilldownSession>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    pub date: NaiveDate,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub projects: Vec<FilterOption>,
    pub models: Vec<FilterOption>,
    pub branches: Vec<FilterOption>,
    pub languages: Vec<FilterOption>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupCounts {
    pub turns: u64,
    pub tool_calls: u64,
    pub sessions: u64,
}

impl RollupCounts {
    pub fn get(&self, family: FactFamily) -> u64 {
        match family {
            FactFamily::Turns => self.turns,
            FactFamily::ToolCalls => self.tool_calls,
            FactFamily::Sessions => self.sessions,
        }
    }

    pub fn set(&mut self, family: FactFamily, rows: u64) {
        match family {
            FactFamily::Turns => self.turns = rows,
            FactFamily::ToolCalls => self.tool_calls = rows,
            FactFamily::Sessions => self.sessions = rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupStatus {
    pub family: FactFamily,
    pub row_count: u64,
    pub refreshed_at: Option<String>,
    pub timezone: Option<String>,
    pub ready: bool,
}

/// Scope for the pattern miners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub projects: Vec<String>,
    pub branches: Vec<String>,
}

impl From<&PatternFilters> for QueryFilters {
    fn from(value: &PatternFilters) -> Self {
        QueryFilters {
            date_from: value.date_from,
            date_to: value.date_to,
            projects: value.projects.clone(),
            branches: value.branches.clone(),
            ..QueryFilters::default()
        }
    }
}
