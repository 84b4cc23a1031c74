use datafusion::arrow::array::{ArrayRef, Float64Array};
use datafusion::arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;

use crate::error::AstroError;
use crate::table;

pub const DEFAULT_WAVELENGTH_COLUMN: &str = "Wavelength";
pub const DEFAULT_FLUX_COLUMN: &str = "Flux";
pub const DEFAULT_LOGLAM_COLUMN: &str = "LOGLAM";

/// Speed of light in km/s
const SPEED_OF_LIGHT: f64 = 299_792.458;

/// WMAP nine-year flat ΛCDM parameters
const WMAP9_H0: f64 = 69.32;
const WMAP9_OMEGA_M: f64 = 0.2865;

/// A single spectrum or catalog table loaded for cleaning.
///
/// Every transform rewrites the table in place; there is no undo.
pub struct DataPreprocessing {
    table: RecordBatch,
    min_wavelength: f64,
    max_wavelength: f64,
    redshift: f64,
}

impl DataPreprocessing {
    /// Load `path` (FITS first extension or CSV). `min_wavelength` and
    /// `max_wavelength` bound the range kept by [`wave_align`](Self::wave_align).
    pub fn new(
        path: impl AsRef<Path>,
        min_wavelength: f64,
        max_wavelength: f64,
        redshift: f64,
    ) -> Result<Self, AstroError> {
        let path = path.as_ref();
        if min_wavelength > max_wavelength {
            return Err(AstroError::Validation(format!(
                "Invalid wavelength range [{}, {}]",
                min_wavelength, max_wavelength
            )));
        }

        let table = table::load_table(path)?;
        tracing::debug!(
            "Loaded {} rows, {} columns from {}",
            table.num_rows(),
            table.num_columns(),
            path.display()
        );
        Self::from_table(table, min_wavelength, max_wavelength, redshift)
    }

    pub fn from_table(
        table: RecordBatch,
        min_wavelength: f64,
        max_wavelength: f64,
        redshift: f64,
    ) -> Result<Self, AstroError> {
        if table.num_rows() == 0 {
            return Err(AstroError::Validation("The loaded table is empty.".to_string()));
        }
        Ok(Self {
            table,
            min_wavelength,
            max_wavelength,
            redshift,
        })
    }

    pub fn table(&self) -> &RecordBatch {
        &self.table
    }

    pub fn into_table(self) -> RecordBatch {
        self.table
    }

    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    /// Z-score `column` using the population standard deviation.
    ///
    /// Nulls and NaNs are left as they are and ignored for the statistics. A
    /// constant column becomes all zeros.
    pub fn normalize_column(&mut self, column: &str) -> Result<(), AstroError> {
        let values = table::numeric_column(&self.table, column)?;
        let finite: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            return Err(AstroError::Validation(format!(
                "Column '{}' has no numeric values to normalize",
                column
            )));
        }

        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let std = (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let scale = if std == 0.0 { 1.0 } else { std };
        tracing::debug!("Normalizing {} (mean={}, std={})", column, mean, std);

        let normalized: Float64Array = values
            .into_iter()
            .map(|v| v.map(|x| (x - mean) / scale))
            .collect();
        self.replace_column(column, Arc::new(normalized))
    }

    /// Drop rows outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]` and return the bounds.
    ///
    /// Quartiles interpolate linearly between the closest ranks. Rows with a
    /// null or NaN value in `column` are dropped too.
    pub fn remove_outliers_column(&mut self, column: &str) -> Result<(f64, f64), AstroError> {
        let values = table::numeric_column(&self.table, column)?;
        let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return Err(AstroError::Validation(format!(
                "Column '{}' has no numeric values",
                column
            )));
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = percentile(&sorted, 0.25);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let mask: Vec<bool> = values
            .iter()
            .map(|v| matches!(v, Some(x) if *x >= lower && *x <= upper))
            .collect();
        let before = self.table.num_rows();
        self.table = table::filter_rows(&self.table, mask)?;
        tracing::info!(
            "Removed {} outliers from {} (bounds [{}, {}])",
            before - self.table.num_rows(),
            column,
            lower,
            upper
        );

        Ok((lower, upper))
    }

    /// Write `{flux}_corrected = flux / (wavelength * (1 + z))`.
    ///
    /// Returns the luminosity distance in Mpc for the configured redshift
    /// under WMAP9 cosmology. The distance is reported only; it does not
    /// enter the corrected flux.
    pub fn correct_redshift(&mut self, wavelength: &str, flux: &str) -> Result<f64, AstroError> {
        let lambda = table::numeric_column(&self.table, wavelength)?;
        let flux_values = table::numeric_column(&self.table, flux)?;

        let factor = 1.0 + self.redshift;
        let corrected: Float64Array = lambda
            .into_iter()
            .zip(flux_values)
            .map(|(l, f)| match (l, f) {
                (Some(l), Some(f)) => Some(f / (l * factor)),
                _ => None,
            })
            .collect();

        let distance = luminosity_distance(self.redshift);
        tracing::debug!("Luminosity distance at z={}: {} Mpc", self.redshift, distance);

        self.replace_column(&format!("{}_corrected", flux), Arc::new(corrected))?;
        Ok(distance)
    }

    /// Derive `wavelength = 10^loglam` when `loglam` exists, then keep rows
    /// inside the target wavelength range, bounds included.
    pub fn wave_align(&mut self, wavelength: &str, loglam: &str) -> Result<(), AstroError> {
        if table::has_column(&self.table, loglam) {
            let linear: Float64Array = table::numeric_column(&self.table, loglam)?
                .into_iter()
                .map(|v| v.map(|x| 10f64.powf(x)))
                .collect();
            self.replace_column(wavelength, Arc::new(linear))?;
        }

        let (min, max) = (self.min_wavelength, self.max_wavelength);
        let mask: Vec<bool> = table::numeric_column(&self.table, wavelength)?
            .into_iter()
            .map(|v| matches!(v, Some(x) if x >= min && x <= max))
            .collect();
        self.table = table::filter_rows(&self.table, mask)?;
        tracing::debug!("{} rows within [{}, {}]", self.table.num_rows(), min, max);
        Ok(())
    }

    fn replace_column(&mut self, name: &str, values: ArrayRef) -> Result<(), AstroError> {
        self.table = table::with_column(&self.table, name, values)?;
        Ok(())
    }
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Luminosity distance (Mpc) in flat ΛCDM with WMAP9 parameters, ignoring
/// radiation.
pub fn luminosity_distance(z: f64) -> f64 {
    if z <= 0.0 {
        return 0.0;
    }

    let omega_lambda = 1.0 - WMAP9_OMEGA_M;
    let inv_e = |z: f64| 1.0 / (WMAP9_OMEGA_M * (1.0 + z).powi(3) + omega_lambda).sqrt();

    // Composite Simpson over [0, z]
    const STEPS: usize = 1000;
    let h = z / STEPS as f64;
    let mut sum = inv_e(0.0) + inv_e(z);
    for i in 1..STEPS {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * inv_e(i as f64 * h);
    }
    let comoving = SPEED_OF_LIGHT / WMAP9_H0 * sum * h / 3.0;

    (1.0 + z) * comoving
}
