use reqwest::Client;
use std::path::PathBuf;

use crate::config::SpectraConfig;
use crate::error::AstroError;
use crate::models::SpectraRequest;
use crate::services::connector::adapter::build_client;

/// Downloads individual SDSS spectra from the science archive.
pub struct SpectraService {
    config: SpectraConfig,
    client: Client,
}

impl SpectraService {
    pub fn new(config: SpectraConfig) -> Result<Self, AstroError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Validate `request`, download the spectrum and write it to
    /// `{output_dir}/spec-{plate}-{mjd}-{fiber}.{format}`.
    pub async fn fetch(&self, request: &SpectraRequest) -> Result<PathBuf, AstroError> {
        let target = request.validate()?;
        let url = target.url(&self.config);
        tracing::info!("Downloading spectrum {} from {}", target.file_name(), url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AstroError::Network(format!("Data downloading error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AstroError::Network(format!(
                "Data downloading error: HTTP {} for {}",
                status, url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AstroError::Network(format!("Data downloading error: {}", e)))?;

        tokio::fs::create_dir_all(&target.output_dir).await?;
        let path = target.file_path();
        tokio::fs::write(&path, &body).await?;

        tracing::info!("Saved {} bytes to {}", body.len(), path.display());
        Ok(path)
    }
}
