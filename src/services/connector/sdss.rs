// SDSS SkyServer connector using the SqlSearch web service
use datafusion::arrow::record_batch::RecordBatch;
use reqwest::Client;

use crate::config::SdssConfig;
use crate::error::AstroError;
use crate::models::{Dataset, QueryStatus};
use crate::services::connector::adapter::{
    build_client, read_csv_response, transport_error, Connector, ConnectorState,
};

const SQL_SEARCH_PATH: &str = "SkyServerWS/SearchTools/SqlSearch";

pub struct SdssConnector {
    base_url: String,
    client: Client,
    state: ConnectorState,
}

impl SdssConnector {
    pub fn new(config: &SdssConfig) -> Result<Self, AstroError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build_client(config.timeout_secs)?,
            state: ConnectorState::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, SQL_SEARCH_PATH)
    }

    /// Execute SQL via SqlSearch, CSV output
    async fn execute_sql(&self, sql: &str) -> Result<Option<RecordBatch>, AstroError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("cmd", sql), ("format", "csv")])
            .send()
            .await
            .map_err(|e| transport_error("SDSS", e))?;

        read_csv_response("SDSS", response).await
    }
}

#[async_trait::async_trait]
impl Connector for SdssConnector {
    async fn run_query(&mut self, query: &str) -> Result<QueryStatus, AstroError> {
        self.state.begin();

        let table = match self.execute_sql(query).await {
            Ok(table) => table,
            Err(e) => {
                self.state.fail();
                return Err(e);
            }
        };

        self.state.record(table)
    }

    fn check_status(&self) -> QueryStatus {
        self.state.status()
    }

    fn get_results(&self) -> Option<RecordBatch> {
        self.state.results()
    }

    fn dataset(&self) -> Dataset {
        Dataset::Sdss
    }
}
