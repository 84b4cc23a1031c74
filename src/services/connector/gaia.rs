// Gaia archive connector using the ESA TAP service
//
// Synchronous queries go through `/sync`. Asynchronous jobs follow the UWS
// protocol: POST to `/async` with PHASE=RUN, read the job URL from the 303
// Location header, poll `{job}/phase`, then fetch `{job}/results/result`.
use datafusion::arrow::record_batch::RecordBatch;
use reqwest::{header::LOCATION, redirect, Client};
use std::time::Duration;
use url::Url;

use crate::config::GaiaConfig;
use crate::error::AstroError;
use crate::models::{Dataset, JobPhase, QueryStatus};
use crate::services::connector::adapter::{
    read_csv_response, transport_error, Connector, ConnectorState,
};

/// Handle of a submitted asynchronous TAP job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncJob {
    url: String,
}

impl AsyncJob {
    pub fn url(&self) -> &str {
        &self.url
    }
}

pub struct GaiaConnector {
    tap_url: String,
    client: Client,
    poll_interval: Duration,
    state: ConnectorState,
}

impl GaiaConnector {
    pub fn new(config: &GaiaConfig) -> Result<Self, AstroError> {
        Url::parse(&config.tap_url)
            .map_err(|e| AstroError::Validation(format!("Invalid Gaia TAP URL: {}", e)))?;

        // The job URL is read from the redirect itself
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::none())
            .user_agent(concat!("astrolibrary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AstroError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            tap_url: config.tap_url.trim_end_matches('/').to_string(),
            client,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            state: ConnectorState::new(),
        })
    }

    async fn execute_sync(&self, adql: &str) -> Result<Option<RecordBatch>, AstroError> {
        let response = self
            .client
            .post(format!("{}/sync", self.tap_url))
            .form(&[
                ("REQUEST", "doQuery"),
                ("LANG", "ADQL"),
                ("FORMAT", "csv"),
                ("QUERY", adql),
            ])
            .send()
            .await
            .map_err(|e| transport_error("Gaia", e))?;

        read_csv_response("Gaia", response).await
    }

    /// Submit an asynchronous job and start it.
    ///
    /// Returns `None` when the service accepts the request but hands back no
    /// job location.
    pub async fn launch_job_async(&self, adql: &str) -> Result<Option<AsyncJob>, AstroError> {
        let endpoint = format!("{}/async", self.tap_url);
        let response = self
            .client
            .post(&endpoint)
            .form(&[
                ("REQUEST", "doQuery"),
                ("LANG", "ADQL"),
                ("FORMAT", "csv"),
                ("PHASE", "RUN"),
                ("QUERY", adql),
            ])
            .send()
            .await
            .map_err(|e| transport_error("Gaia", e))?;

        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AstroError::Remote(format!(
                "Gaia job submission failed ({}): {}",
                status,
                error_body.trim()
            )));
        }

        let location = match response.headers().get(LOCATION) {
            Some(value) => value
                .to_str()
                .map_err(|e| AstroError::Parse(format!("Invalid job location header: {}", e)))?,
            None => return Ok(None),
        };

        // Location may be relative to the submission endpoint
        let job_url = Url::parse(&endpoint)
            .and_then(|base| base.join(location))
            .map_err(|e| AstroError::Parse(format!("Invalid job location '{}': {}", location, e)))?;

        tracing::info!("Gaia job submitted: {}", job_url);
        Ok(Some(AsyncJob {
            url: job_url.to_string().trim_end_matches('/').to_string(),
        }))
    }

    pub async fn job_phase(&self, job: &AsyncJob) -> Result<JobPhase, AstroError> {
        let response = self
            .client
            .get(format!("{}/phase", job.url))
            .send()
            .await
            .map_err(|e| transport_error("Gaia", e))?;

        if !response.status().is_success() {
            return Err(AstroError::Remote(format!(
                "Failed to read phase of {}: HTTP {}",
                job.url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error("Gaia", e))?;
        Ok(JobPhase::parse(&text))
    }

    /// Block until the job reaches a terminal phase. Anything other than
    /// `Completed` means there are no results to fetch.
    pub async fn wait_for_completion(&self, job: &AsyncJob) -> Result<JobPhase, AstroError> {
        loop {
            let phase = self.job_phase(job).await?;
            if phase.is_terminal() {
                tracing::debug!("Gaia job {} finished with phase {:?}", job.url, phase);
                return Ok(phase);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn fetch_results(&self, job: &AsyncJob) -> Result<Option<RecordBatch>, AstroError> {
        let response = self
            .client
            .get(format!("{}/results/result", job.url))
            .send()
            .await
            .map_err(|e| transport_error("Gaia", e))?;

        read_csv_response("Gaia", response).await
    }
}

#[async_trait::async_trait]
impl Connector for GaiaConnector {
    async fn run_query(&mut self, query: &str) -> Result<QueryStatus, AstroError> {
        self.state.begin();

        let table = match self.execute_sync(query).await {
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
        Dataset::Gaia
    }
}
