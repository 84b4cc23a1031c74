use datafusion::arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::time::Instant;

use crate::config::Config;
use crate::error::AstroError;
use crate::models::{Dataset, QueryJob, QueryStatus};
use crate::services::connector::{create_connector, Connector};
use crate::table::json::to_json_rows;
use crate::validation::SqlValidator;

/// Submits queries to one catalog and keeps a connector per submission.
///
/// Every submission gets a fresh identifier, so running the same query text
/// twice leaves two independent jobs behind.
pub struct QueryHandler {
    dataset: Dataset,
    config: Config,
    connectors: HashMap<String, Box<dyn Connector>>,
    jobs: Vec<QueryJob>,
}

impl QueryHandler {
    pub fn new(dataset_name: &str, config: Config) -> Result<Self, AstroError> {
        let dataset: Dataset = dataset_name.parse()?;
        Ok(Self {
            dataset,
            config,
            connectors: HashMap::new(),
            jobs: Vec::new(),
        })
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Validate and run `query`, returning the identifier of the new job.
    ///
    /// A failed run is still recorded under its identifier with status
    /// `ERROR` before the error is returned.
    pub async fn run_query(&mut self, query: &str) -> Result<String, AstroError> {
        let sql = SqlValidator::validate_select_only(query)?;

        let mut connector = create_connector(self.dataset, &self.config)?;
        let mut job = QueryJob::new(self.dataset, sql.clone());
        let id = job.id.clone();

        tracing::info!("Submitting {} query {}: {}", self.dataset, id, sql);
        let start_time = Instant::now();
        let outcome = connector.run_query(&sql).await;
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        let row_count = connector.get_results().map(|batch| batch.num_rows());
        job.mark_finished(connector.check_status(), row_count, execution_time_ms);

        match job.status {
            QueryStatus::SuccessNoResults => {
                tracing::warn!("Query {} returned no results", id)
            }
            status => tracing::debug!(
                "Query {} finished with status {} in {}ms",
                id,
                status,
                execution_time_ms
            ),
        }

        self.connectors.insert(id.clone(), connector);
        self.jobs.push(job);

        outcome.map(|_| id)
    }

    pub fn check_status(&self, query_id: &str) -> Result<QueryStatus, AstroError> {
        Ok(self.connector(query_id)?.check_status())
    }

    pub fn get_results(&self, query_id: &str) -> Result<Option<RecordBatch>, AstroError> {
        Ok(self.connector(query_id)?.get_results())
    }

    /// Results of `query_id` as one JSON object per row.
    pub fn get_results_json(
        &self,
        query_id: &str,
    ) -> Result<Option<Vec<serde_json::Map<String, serde_json::Value>>>, AstroError> {
        self.get_results(query_id)?
            .map(|batch| to_json_rows(&batch))
            .transpose()
    }

    /// Submitted jobs, oldest first
    pub fn jobs(&self) -> &[QueryJob] {
        &self.jobs
    }

    fn connector(&self, query_id: &str) -> Result<&dyn Connector, AstroError> {
        self.connectors
            .get(query_id)
            .map(|c| c.as_ref())
            .ok_or_else(|| AstroError::NotFound(format!("Query ID {} not found.", query_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn sdss_config(url: String) -> Config {
        let mut config = Config::default();
        config.sdss.base_url = url;
        config.sdss.timeout_secs = 5;
        config
    }

    #[test]
    fn test_rejects_unknown_dataset() {
        for name in ["", "Hubble", "  "] {
            let err = QueryHandler::new(name, Config::default()).err().unwrap();
            assert!(matches!(err, AstroError::Validation(_)), "name {:?}", name);
        }
        let handler = QueryHandler::new("gaia", Config::default()).unwrap();
        assert_eq!(handler.dataset(), Dataset::Gaia);
    }

    #[tokio::test]
    async fn test_run_query_and_fetch_results() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SkyServerWS/SearchTools/SqlSearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("#Table1\nobjid,ra,dec\n1237645879551066262,180.5,0.25\n")
            .create_async()
            .await;

        let mut handler = QueryHandler::new("SDSS", sdss_config(server.url())).unwrap();
        let id = handler
            .run_query("SELECT TOP 1 objid, ra, dec FROM PhotoObj")
            .await
            .unwrap();

        assert_eq!(handler.check_status(&id).unwrap(), QueryStatus::Completed);
        let results = handler.get_results(&id).unwrap().unwrap();
        assert_eq!(results.num_rows(), 1);
        assert_eq!(results.num_columns(), 3);

        let rows = handler.get_results_json(&id).unwrap().unwrap();
        assert_eq!(
            serde_json::Value::Object(rows[0].clone()),
            serde_json::json!({"objid": 1237645879551066262_i64, "ra": 180.5, "dec": 0.25})
        );

        let jobs = handler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].row_count, Some(1));
    }

    #[tokio::test]
    async fn test_same_query_gets_distinct_ids() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SkyServerWS/SearchTools/SqlSearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("z\n0.1\n")
            .expect(2)
            .create_async()
            .await;

        let mut handler = QueryHandler::new("sdss", sdss_config(server.url())).unwrap();
        let first = handler.run_query("SELECT TOP 1 z FROM SpecObj").await.unwrap();
        let second = handler.run_query("SELECT TOP 1 z FROM SpecObj").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(handler.jobs().len(), 2);
    }

    #[tokio::test]
    async fn test_error_row_marks_job_failed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SkyServerWS/SearchTools/SqlSearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("error_message\nInvalid object name 'PhotoObjj'.\n")
            .create_async()
            .await;

        let mut handler = QueryHandler::new("SDSS", sdss_config(server.url())).unwrap();
        let err = handler
            .run_query("SELECT TOP 1 objid FROM PhotoObjj")
            .await
            .unwrap_err();
        assert!(matches!(err, AstroError::Remote(_)));

        let job = &handler.jobs()[0];
        assert_eq!(job.status, QueryStatus::Error);
        assert_eq!(handler.check_status(&job.id).unwrap(), QueryStatus::Error);
        assert!(handler.get_results(&job.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SkyServerWS/SearchTools/SqlSearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("#Table1\n")
            .create_async()
            .await;

        let mut handler = QueryHandler::new("SDSS", sdss_config(server.url())).unwrap();
        let id = handler.run_query("SELECT TOP 1 z FROM SpecObj WHERE z > 99").await.unwrap();
        assert_eq!(handler.check_status(&id).unwrap(), QueryStatus::SuccessNoResults);
        assert!(handler.get_results(&id).unwrap().is_none());
        assert!(handler.get_results_json(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_query_text_is_rejected_locally() {
        let mut handler = QueryHandler::new("SDSS", sdss_config("http://127.0.0.1:1".to_string())).unwrap();
        for query in ["", "   ", "DELETE FROM PhotoObj"] {
            let err = handler.run_query(query).await.unwrap_err();
            assert!(matches!(err, AstroError::Validation(_)), "query {:?}", query);
        }
        assert!(handler.jobs().is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let handler = QueryHandler::new("SDSS", Config::default()).unwrap();
        assert!(matches!(handler.check_status("nope"), Err(AstroError::NotFound(_))));
        assert!(matches!(handler.get_results("nope"), Err(AstroError::NotFound(_))));
        assert!(matches!(handler.get_results_json("nope"), Err(AstroError::NotFound(_))));
    }
}
