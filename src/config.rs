use serde::Deserialize;
use std::env;

use crate::error::AstroError;

pub const DEFAULT_SDSS_BASE_URL: &str = "https://skyserver.sdss.org/dr18";
pub const DEFAULT_GAIA_TAP_URL: &str = "https://gea.esac.esa.int/tap-server/tap";
pub const DEFAULT_DR17_BASE_URL: &str = "http://dr17.sdss.org/sas/dr17";
pub const DEFAULT_DR18_BASE_URL: &str = "http://dr18.sdss.org/optical/spectrum/view/data";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sdss: SdssConfig,
    pub gaia: GaiaConfig,
    pub spectra: SpectraConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SdssConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GaiaConfig {
    pub tap_url: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpectraConfig {
    pub dr17_base_url: String,
    pub dr18_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sdss: SdssConfig {
                base_url: DEFAULT_SDSS_BASE_URL.to_string(),
                timeout_secs: 60,
            },
            gaia: GaiaConfig {
                tap_url: DEFAULT_GAIA_TAP_URL.to_string(),
                timeout_secs: 60,
                poll_interval_ms: 500,
            },
            spectra: SpectraConfig {
                dr17_base_url: DEFAULT_DR17_BASE_URL.to_string(),
                dr18_base_url: DEFAULT_DR18_BASE_URL.to_string(),
                timeout_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AstroError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("sdss.base_url", DEFAULT_SDSS_BASE_URL)?
            .set_default("sdss.timeout_secs", 60)?
            .set_default("gaia.tap_url", DEFAULT_GAIA_TAP_URL)?
            .set_default("gaia.timeout_secs", 60)?
            .set_default("gaia.poll_interval_ms", 500)?
            .set_default("spectra.dr17_base_url", DEFAULT_DR17_BASE_URL)?
            .set_default("spectra.dr18_base_url", DEFAULT_DR18_BASE_URL)?
            .set_default("spectra.timeout_secs", 30)?
            .set_default("logging.level", "info")?;

        // Load from environment variables
        let overrides = [
            ("SDSS_BASE_URL", "sdss.base_url"),
            ("GAIA_TAP_URL", "gaia.tap_url"),
            ("SPECTRA_DR17_BASE_URL", "spectra.dr17_base_url"),
            ("SPECTRA_DR18_BASE_URL", "spectra.dr18_base_url"),
            ("RUST_LOG", "logging.level"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let numeric_overrides = [
            ("SDSS_TIMEOUT_SECS", "sdss.timeout_secs"),
            ("GAIA_TIMEOUT_SECS", "gaia.timeout_secs"),
            ("GAIA_POLL_INTERVAL_MS", "gaia.poll_interval_ms"),
            ("SPECTRA_TIMEOUT_SECS", "spectra.timeout_secs"),
        ];
        for (var, key) in numeric_overrides {
            if let Ok(value) = env::var(var) {
                let parsed = value.parse::<u64>().map_err(|_| {
                    AstroError::Config(format!("{} must be a non-negative integer, got '{}'", var, value))
                })?;
                builder = builder.set_override(key, parsed)?;
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert!(!config.sdss.base_url.is_empty());
        assert!(!config.gaia.tap_url.is_empty());
    }

    #[test]
    fn test_default_spectra_timeout() {
        let config = Config::default();
        assert_eq!(config.spectra.timeout_secs, 30);
        assert_eq!(config.spectra.dr17_base_url, DEFAULT_DR17_BASE_URL);
        assert_eq!(config.gaia.poll_interval_ms, 500);
    }
}
