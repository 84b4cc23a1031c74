use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::dataset::Dataset;

/// Status reported by a connector for its last query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Running,
    Completed,
    Error,
    SuccessNoResults,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Running => "RUNNING",
            QueryStatus::Completed => "COMPLETED",
            QueryStatus::Error => "ERROR",
            QueryStatus::SuccessNoResults => "SUCCESS_NO_RESULTS",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one submission through a `QueryHandler`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryJob {
    pub id: String,
    pub dataset: Dataset,
    pub query_text: String,
    pub status: QueryStatus,
    pub row_count: Option<usize>,
    pub execution_time_ms: Option<u64>,
    pub submitted_at: DateTime<Utc>,
}

impl QueryJob {
    pub fn new(dataset: Dataset, query_text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dataset,
            query_text,
            status: QueryStatus::Running,
            row_count: None,
            execution_time_ms: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn mark_finished(&mut self, status: QueryStatus, row_count: Option<usize>, execution_time_ms: u64) {
        self.status = status;
        self.row_count = row_count;
        self.execution_time_ms = Some(execution_time_ms);
    }
}

/// Execution phase of a UWS (TAP asynchronous) job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    Queued,
    Executing,
    Completed,
    Error,
    Aborted,
    Held,
    Suspended,
    Archived,
    Unknown,
}

impl JobPhase {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => JobPhase::Pending,
            "QUEUED" => JobPhase::Queued,
            "EXECUTING" => JobPhase::Executing,
            "COMPLETED" => JobPhase::Completed,
            "ERROR" => JobPhase::Error,
            "ABORTED" => JobPhase::Aborted,
            "HELD" => JobPhase::Held,
            "SUSPENDED" => JobPhase::Suspended,
            "ARCHIVED" => JobPhase::Archived,
            _ => JobPhase::Unknown,
        }
    }

    /// Phases after which polling stops. An unrecognised phase also ends
    /// the wait so the caller can report it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Completed
                | JobPhase::Error
                | JobPhase::Aborted
                | JobPhase::Archived
                | JobPhase::Unknown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(QueryStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(QueryStatus::SuccessNoResults.to_string(), "SUCCESS_NO_RESULTS");
        assert_eq!(
            serde_json::to_string(&QueryStatus::SuccessNoResults).unwrap(),
            "\"SUCCESS_NO_RESULTS\""
        );
    }

    #[test]
    fn test_jobs_get_distinct_ids() {
        let a = QueryJob::new(Dataset::Sdss, "SELECT 1".to_string());
        let b = QueryJob::new(Dataset::Sdss, "SELECT 1".to_string());
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, QueryStatus::Running);
    }

    #[test]
    fn test_job_phase_parsing() {
        assert_eq!(JobPhase::parse("COMPLETED\n"), JobPhase::Completed);
        assert_eq!(JobPhase::parse("executing"), JobPhase::Executing);
        assert_eq!(JobPhase::parse("whatever"), JobPhase::Unknown);
        assert_eq!(JobPhase::parse(" archived "), JobPhase::Archived);
        assert!(JobPhase::Aborted.is_terminal());
        assert!(!JobPhase::Queued.is_terminal());
        assert!(!JobPhase::Executing.is_terminal());
    }

    #[test]
    fn test_archived_and_unknown_end_polling() {
        assert!(JobPhase::Archived.is_terminal());
        assert!(JobPhase::parse("SOMETHING_NEW").is_terminal());
    }
}
