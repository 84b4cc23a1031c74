pub mod cross_match;
pub mod dataset;
pub mod query;
pub mod spectra;

pub use cross_match::*;
pub use dataset::*;
pub use query::*;
pub use spectra::*;
