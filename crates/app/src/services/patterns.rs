use explorer_core::{
    AnomalyOptions, CostAnomaly, HandoffReport, PatternFilters, RetryLoop, SequencePattern,
    Transition,
};
use explorer_db::Db;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};

#[derive(Clone)]
pub struct PatternsService {
    config: SharedConfig,
}

impl PatternsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn cost_anomalies(&self, filters: &PatternFilters) -> Result<Vec<CostAnomaly>> {
        let options = AnomalyOptions {
            threshold: self.config.anomaly.threshold,
            limit: self.config.anomaly.limit,
        };
        let db = self.db()?;
        Ok(db.cost_anomalies(filters, options, self.config.prefer_materialized)?)
    }

    pub fn transitions(&self, filters: &PatternFilters) -> Result<Vec<Transition>> {
        Ok(self.db()?.tool_transitions(filters)?)
    }

    pub fn retry_loops(&self, filters: &PatternFilters) -> Result<Vec<RetryLoop>> {
        Ok(self.db()?.retry_loops(filters)?)
    }

    /// Uses the configured window when `window` is `None`.
    pub fn sequences(
        &self,
        filters: &PatternFilters,
        window: Option<usize>,
    ) -> Result<Vec<SequencePattern>> {
        let window = window.unwrap_or(self.config.mining.sequence_window);
        let db = self.db()?;
        Ok(db.tool_sequences(filters, window, self.config.mining.limit)?)
    }

    pub fn failure_handoffs(&self, filters: &PatternFilters) -> Result<HandoffReport> {
        Ok(self.db()?.failure_handoffs(filters)?)
    }
}
