use chrono::NaiveDate;
use explorer_core::{
    DailyCost, DrilldownRequest, DrilldownResult, FilterOptions, QueryRequest, QueryResult,
};
use explorer_db::Db;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};

#[derive(Clone)]
pub struct ExplorerService {
    config: SharedConfig,
}

impl ExplorerService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let db = self.db()?;
        let result = db.execute(request, self.config.prefer_materialized)?;
        tracing::debug!(
            metric = request.metric.as_str(),
            group_by = request.group_by.as_str(),
            source = ?result.metadata.source,
            rows = result.metadata.row_count,
            "query answered"
        );
        Ok(result)
    }

    /// A zero page size falls back to the configured default.
    pub fn drilldown(&self, request: &DrilldownRequest) -> Result<DrilldownResult> {
        let db = self.db()?;
        if request.page_size == 0 {
            let mut request = request.clone();
            request.page_size = self.config.default_page_size;
            return Ok(db.drilldown(&request)?);
        }
        Ok(db.drilldown(request)?)
    }

    pub fn session_cost_trend(&self, session_id: &str) -> Result<Vec<DailyCost>> {
        Ok(self.db()?.session_cost_trend(session_id)?)
    }

    pub fn filter_options(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<FilterOptions> {
        let db = self.db()?;
        Ok(db.filter_options(date_from, date_to, self.config.filter_options_limit)?)
    }
}
