pub mod error;
pub mod facts;
pub mod mining;
pub mod model;
pub mod query;
pub mod registry;
pub mod spawn;
pub mod time;

pub use error::InvalidQuery;
pub use facts::{SessionRecord, ToolCallRecord, TurnRecord, TurnTokens};
pub use mining::{
    AnomalyOptions, BranchDailyCost, CostAnomaly, RetryLoop, SequencePattern, ToolEvent,
    Transition, detect_cost_anomalies, detect_retry_loops, mine_sequences, mine_transitions,
};
pub use model::{ModelName, NONE_LABEL, SENTINEL_MODEL_LABELS, SYNTHETIC_MODEL};
pub use query::{
    AggregateRow, Bucket, DailyCost, DrilldownRequest, DrilldownResult, DrilldownSession,
    ExecutionPath, FilterOption, FilterOptions, Pagination, PatternFilters, QueryFilters,
    QueryMetadata, QueryRequest, QueryResult, RollupCounts, RollupStatus,
};
pub use registry::{Dimension, FactFamily, Metric, allowed_dimensions, legal_combinations};
pub use spawn::{
    BrokenEdge, FailureHandoff, HandoffDirection, HandoffReport, HandoffSummary, SessionOutcome,
    SpawnForest, SpawnNode, detect_failure_handoffs,
};
pub use time::Timezone;
