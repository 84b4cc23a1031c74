// Connector trait - abstraction over the catalog services a query can run against
use datafusion::arrow::record_batch::RecordBatch;
use reqwest::Response;
use std::time::Duration;

use crate::error::AstroError;
use crate::models::{Dataset, QueryStatus};
use crate::table;

/// Column some catalog services use to report a failed query as a result row
pub const ERROR_MESSAGE_COLUMN: &str = "error_message";

/// Run a query, report its status, hand back its results.
///
/// A connector holds the outcome of the last query it ran. Implementations
/// do not retry and rely on their HTTP client's timeout.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Run `query`, replacing any previous status and results.
    async fn run_query(&mut self, query: &str) -> Result<QueryStatus, AstroError>;

    fn check_status(&self) -> QueryStatus;

    /// Result table of the last query, `None` when it produced no rows.
    fn get_results(&self) -> Option<RecordBatch>;

    fn dataset(&self) -> Dataset;
}

/// Status and results shared by the connector implementations
#[derive(Debug, Clone)]
pub struct ConnectorState {
    status: QueryStatus,
    results: Option<RecordBatch>,
}

impl Default for ConnectorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorState {
    pub fn new() -> Self {
        Self {
            status: QueryStatus::Running,
            results: None,
        }
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn results(&self) -> Option<RecordBatch> {
        self.results.clone()
    }

    pub fn begin(&mut self) {
        self.status = QueryStatus::Running;
        self.results = None;
    }

    /// Record a transport or protocol failure.
    pub fn fail(&mut self) {
        self.status = QueryStatus::Error;
        self.results = None;
    }

    /// Classify a response table: nothing or no rows, an error row, or data.
    pub fn record(&mut self, table: Option<RecordBatch>) -> Result<QueryStatus, AstroError> {
        match table {
            Some(batch) if batch.num_rows() > 0 => {
                if table::has_column(&batch, ERROR_MESSAGE_COLUMN) {
                    let message = table::first_value_as_string(&batch, ERROR_MESSAGE_COLUMN)
                        .unwrap_or_else(|| "unknown error".to_string());
                    self.fail();
                    return Err(AstroError::Remote(format!("Query failed: {}", message)));
                }
                self.status = QueryStatus::Completed;
                self.results = Some(batch);
            }
            _ => {
                self.status = QueryStatus::SuccessNoResults;
                self.results = None;
            }
        }
        Ok(self.status)
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, AstroError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("astrolibrary/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AstroError::Internal(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> AstroError {
    if err.is_timeout() {
        AstroError::Network(format!("{} request timed out: {}", service, err))
    } else {
        AstroError::Network(format!("{} request failed: {}", service, err))
    }
}

/// Parse a CSV response body, turning non-success statuses into remote errors.
pub(crate) async fn read_csv_response(
    service: &str,
    response: Response,
) -> Result<Option<RecordBatch>, AstroError> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AstroError::Remote(format!(
            "{} query failed ({}): {}",
            service,
            status,
            error_body.trim()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(service, e))?;
    table::csv::parse_csv(&body)
}
