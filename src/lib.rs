pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod table;
pub mod validation;

pub use config::Config;
pub use error::{AstroError, Result};
pub use models::{
    CrossMatchRequest, Dataset, JobPhase, OutputFormat, QueryJob, QueryStatus, SpecType,
    SpectraRequest, SpectraTarget,
};
pub use services::{
    Connector, CrossMatchService, DataPreprocessing, GaiaConnector, MetaDataExtractor,
    QueryHandler, SdssConnector, SpectraService,
};
pub use validation::SqlValidator;
