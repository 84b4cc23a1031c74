use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::SpectraConfig;
use crate::error::AstroError;

/// Output format of a downloaded spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Fits,
    Csv,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, AstroError> {
        match s {
            "fits" => Ok(OutputFormat::Fits),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(AstroError::Validation(
                "Unsupported output format. Supported formats: 'fits', 'csv'".to_string(),
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Fits => "fits",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Spectrograph product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecType {
    Lite,
    Full,
}

impl SpecType {
    pub fn parse(s: &str) -> Result<Self, AstroError> {
        match s {
            "lite" => Ok(SpecType::Lite),
            "full" => Ok(SpecType::Full),
            _ => Err(AstroError::Validation(format!("Invalid spec value: '{}'", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecType::Lite => "lite",
            SpecType::Full => "full",
        }
    }
}

/// Unvalidated spectra download request.
///
/// Identifiers are optional so that missing values can be reported the same
/// way as invalid ones; zero counts as missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectraRequest {
    pub survey: Option<String>,
    pub run2d: Option<String>,
    pub spec: String,
    pub plate_id: Option<i64>,
    pub mjd: Option<i64>,
    pub fiber_id: Option<i64>,
    pub dr_number: Option<i64>,
    pub output_format: String,
    pub output_dir: PathBuf,
}

impl Default for SpectraRequest {
    fn default() -> Self {
        Self {
            survey: None,
            run2d: None,
            spec: "lite".to_string(),
            plate_id: None,
            mjd: None,
            fiber_id: None,
            dr_number: None,
            output_format: "fits".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl SpectraRequest {
    pub fn new(plate_id: i64, mjd: i64, fiber_id: i64) -> Self {
        Self {
            plate_id: Some(plate_id),
            mjd: Some(mjd),
            fiber_id: Some(fiber_id),
            ..Self::default()
        }
    }

    pub fn survey(mut self, survey: impl Into<String>) -> Self {
        self.survey = Some(survey.into());
        self
    }

    pub fn run2d(mut self, run2d: impl Into<String>) -> Self {
        self.run2d = Some(run2d.into());
        self
    }

    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = spec.into();
        self
    }

    pub fn dr_number(mut self, dr_number: i64) -> Self {
        self.dr_number = Some(dr_number);
        self
    }

    pub fn output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Build a request from a loosely typed JSON object using the SDSS
    /// parameter names (`plateid`, `mjd`, `fiberid`, `dr_number`, ...).
    ///
    /// Presence is checked before type, so `{"plateid": null}` reports a
    /// missing identifier while `{"plateid": "abc"}` reports a type error.
    pub fn from_json(value: &Value) -> Result<Self, AstroError> {
        let obj = value.as_object().ok_or_else(|| {
            AstroError::Validation("Spectra request must be a JSON object".to_string())
        })?;

        let is_missing = |key: &str| match obj.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::Number(n)) => n.as_f64() == Some(0.0),
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Bool(b)) => !b,
            _ => false,
        };

        if ["plateid", "mjd", "fiberid"].into_iter().any(|k| is_missing(k)) {
            return Err(AstroError::Validation(
                "PLATEID, MJD, and FIBERID must be provided".to_string(),
            ));
        }
        if ["survey", "run2d", "dr_number"].into_iter().any(|k| is_missing(k)) {
            return Err(AstroError::Validation(
                "SURVEY, RUN2D, and DR_NUMBER must be provided".to_string(),
            ));
        }

        let integer = |key: &str| {
            obj.get(key).and_then(Value::as_i64).ok_or_else(|| {
                AstroError::Validation(
                    "PLATEID, MJD, and FIBERID must be of type integer".to_string(),
                )
            })
        };
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        // dr_number arrives as either 18 or "18"
        let dr_number = match obj.get("dr_number") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| AstroError::Validation("DR_NUMBER must be an integer".to_string()))?;

        let defaults = Self::default();
        Ok(Self {
            survey: text("survey"),
            run2d: text("run2d"),
            spec: text("spec").unwrap_or(defaults.spec),
            plate_id: Some(integer("plateid")?),
            mjd: Some(integer("mjd")?),
            fiber_id: Some(integer("fiberid")?),
            dr_number: Some(dr_number),
            output_format: text("output_format").unwrap_or(defaults.output_format),
            output_dir: text("output_dir").map(PathBuf::from).unwrap_or(defaults.output_dir),
        })
    }

    /// Check the request and resolve it into a download target.
    pub fn validate(&self) -> Result<SpectraTarget, AstroError> {
        let present = |v: Option<i64>| v.filter(|id| *id != 0);
        let (plate, mjd, fiber) = match (present(self.plate_id), present(self.mjd), present(self.fiber_id)) {
            (Some(p), Some(m), Some(f)) => (p, m, f),
            _ => {
                return Err(AstroError::Validation(
                    "PLATEID, MJD, and FIBERID must be provided".to_string(),
                ))
            }
        };

        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();
        let (survey, run2d, dr_number) =
            match (non_empty(&self.survey), non_empty(&self.run2d), present(self.dr_number)) {
                (Some(s), Some(r), Some(d)) => (s, r, d),
                _ => {
                    return Err(AstroError::Validation(
                        "SURVEY, RUN2D, and DR_NUMBER must be provided".to_string(),
                    ))
                }
            };

        if plate < 1 || mjd < 1 || fiber < 1 {
            return Err(AstroError::Validation("ID must be a positive number".to_string()));
        }

        let format = OutputFormat::parse(&self.output_format)?;
        let spec = SpecType::parse(&self.spec)?;

        Ok(SpectraTarget {
            survey,
            run2d,
            spec,
            plate: plate as u64,
            mjd: mjd as u64,
            fiber: fiber as u64,
            dr_number,
            format,
            output_dir: self.output_dir.clone(),
        })
    }
}

/// A validated spectra request
#[derive(Debug, Clone, PartialEq)]
pub struct SpectraTarget {
    pub survey: String,
    pub run2d: String,
    pub spec: SpecType,
    pub plate: u64,
    pub mjd: u64,
    pub fiber: u64,
    pub dr_number: i64,
    pub format: OutputFormat,
    pub output_dir: PathBuf,
}

impl SpectraTarget {
    pub fn padded_plate(&self) -> String {
        format!("{:04}", self.plate)
    }

    pub fn padded_fiber(&self) -> String {
        format!("{:04}", self.fiber)
    }

    pub fn file_name(&self) -> String {
        format!(
            "spec-{}-{}-{}.{}",
            self.padded_plate(),
            self.mjd,
            self.padded_fiber(),
            self.format.extension()
        )
    }

    pub fn file_path(&self) -> PathBuf {
        self.output_dir.join(self.file_name())
    }

    /// DR17 serves the FITS file directly from the SAS tree; every other
    /// release goes through the spectrum view endpoint.
    pub fn url(&self, config: &SpectraConfig) -> String {
        let plate = self.padded_plate();
        let fiber = self.padded_fiber();
        if self.dr_number == 17 {
            format!(
                "{}/{}/spectro/redux/{}/spectra/{}/{}/spec-{}-{}-{}.fits",
                config.dr17_base_url.trim_end_matches('/'),
                self.survey,
                self.run2d,
                self.spec.as_str(),
                plate,
                plate,
                self.mjd,
                fiber
            )
        } else {
            format!(
                "{}/format={}/spec={}?plateid={}&mjd={}&fiberid={}",
                config.dr18_base_url.trim_end_matches('/'),
                self.format.extension(),
                self.spec.as_str(),
                plate,
                self.mjd,
                fiber
            )
        }
    }
}
