use explorer_core::{ExecutionPath, QueryRequest, QueryResult};

use crate::Db;
use crate::error::{DbError, Result};

impl Db {
    /// Answers a query from the rollups when allowed and possible, otherwise
    /// from the fact tables. Both paths return the same rows.
    pub fn execute(&self, request: &QueryRequest, prefer_materialized: bool) -> Result<QueryResult> {
        request.validate()?;
        if prefer_materialized {
            match self.aggregate_materialized(request) {
                Ok(rows) => {
                    return Ok(QueryResult::from_rows(
                        request,
                        rows,
                        ExecutionPath::Materialized,
                    ));
                }
                Err(DbError::DataUnavailable(family)) => {
                    tracing::debug!(
                        family = family.as_str(),
                        metric = request.metric.as_str(),
                        "rollup unavailable, aggregating raw facts"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        let rows = self.aggregate(request)?;
        Ok(QueryResult::from_rows(request, rows, ExecutionPath::Raw))
    }
}
