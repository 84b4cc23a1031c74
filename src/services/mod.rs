pub mod connector; // Catalog connectors (SkyServer, Gaia TAP)
pub mod cross_match;
pub mod metadata_extractor;
pub mod preprocessing;
pub mod query_handler;
pub mod spectra;

pub use connector::{create_connector, Connector, GaiaConnector, SdssConnector};
pub use cross_match::*;
pub use metadata_extractor::*;
pub use preprocessing::*;
pub use query_handler::*;
pub use spectra::*;
