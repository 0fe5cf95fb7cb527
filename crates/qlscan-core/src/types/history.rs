use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the append-only scan history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// When the run finished
    pub timestamp: DateTime<Utc>,

    /// Findings reported by the run (0 when the run failed)
    pub issue_count: usize,

    /// Failure message, if the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryRecord {
    /// Record a successful run
    #[must_use]
    pub fn success(issue_count: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            issue_count,
            error: None,
        }
    }

    /// Record a failed run
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            issue_count: 0,
            error: Some(error.into()),
        }
    }
}
