use datafusion::arrow::record_batch::RecordBatch;

use crate::config::GaiaConfig;
use crate::error::AstroError;
use crate::models::{CrossMatchRequest, JobPhase};
use crate::services::connector::GaiaConnector;

/// Matches SDSS spectroscopic objects to Gaia DR3 sources through the
/// `sdssdr13_best_neighbour` table, as an asynchronous TAP job.
pub struct CrossMatchService {
    connector: GaiaConnector,
}

impl CrossMatchService {
    pub fn new(config: &GaiaConfig) -> Result<Self, AstroError> {
        Ok(Self {
            connector: GaiaConnector::new(config)?,
        })
    }

    /// Run the cross-match and block until the job finishes.
    ///
    /// Returns `None` only when the archive hands back no job. A finished job
    /// without neighbours yields an empty table.
    pub async fn cross_match(
        &self,
        request: &CrossMatchRequest,
    ) -> Result<Option<RecordBatch>, AstroError> {
        let adql = request.to_adql();
        tracing::info!(
            "Cross-matching {} SDSS objects within {} arcsec",
            request.spec_objids().len(),
            request.max_angular_distance()
        );
        tracing::debug!("Cross-match query: {}", adql);

        let Some(job) = self.connector.launch_job_async(&adql).await? else {
            tracing::warn!("No matches were found");
            return Ok(None);
        };

        match self.connector.wait_for_completion(&job).await? {
            JobPhase::Completed => {}
            phase => {
                return Err(AstroError::Remote(format!(
                    "Cross-match job {} ended in phase {:?}",
                    job.url(),
                    phase
                )))
            }
        }

        let results = self.connector.fetch_results(&job).await?;
        match &results {
            Some(batch) if batch.num_rows() > 0 => {
                tracing::info!("Cross-match returned {} rows", batch.num_rows())
            }
            _ => tracing::warn!("No matches were found"),
        }
        Ok(results)
    }

    /// Cross-match from dynamically typed positional arguments
    /// (`[spec_objid_list, max_angular_distance?]`).
    pub async fn cross_match_args(
        &self,
        args: &[serde_json::Value],
    ) -> Result<Option<RecordBatch>, AstroError> {
        let request = CrossMatchRequest::from_args(args)?;
        self.cross_match(&request).await
    }
}
