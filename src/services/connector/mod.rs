// Connector layer for the supported remote catalogs
pub mod adapter;
pub mod gaia;
pub mod sdss;

pub use adapter::{Connector, ConnectorState, ERROR_MESSAGE_COLUMN};
pub use gaia::{AsyncJob, GaiaConnector};
pub use sdss::SdssConnector;

use crate::config::Config;
use crate::error::AstroError;
use crate::models::Dataset;

/// Factory function to create the connector for a dataset
pub fn create_connector(dataset: Dataset, config: &Config) -> Result<Box<dyn Connector>, AstroError> {
    match dataset {
        Dataset::Sdss => Ok(Box::new(SdssConnector::new(&config.sdss)?)),
        Dataset::Gaia => Ok(Box::new(GaiaConnector::new(&config.gaia)?)),
    }
}
