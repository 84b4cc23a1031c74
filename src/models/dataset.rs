use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AstroError;

/// Catalog backends a `QueryHandler` can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    #[serde(rename = "SDSS")]
    Sdss,
    #[serde(rename = "Gaia")]
    Gaia,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Sdss, Dataset::Gaia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Sdss => "SDSS",
            Dataset::Gaia => "Gaia",
        }
    }
}

impl FromStr for Dataset {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sdss" => Ok(Dataset::Sdss),
            "gaia" => Ok(Dataset::Gaia),
            _ => Err(AstroError::Validation(format!(
                "Dataset '{}' is not supported.",
                s
            ))),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
