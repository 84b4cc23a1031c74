// Tabular data helpers over Arrow record batches
//
// Every table in the crate (query results, cross-match results, spectra
// loaded for preprocessing) is a single `RecordBatch`. This module loads them
// from disk and provides the column-level operations the services need.

pub mod byte_order;
pub mod csv;
pub mod json;
#[cfg(feature = "fits")]
pub mod fits;

use datafusion::arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use datafusion::arrow::compute::{cast, filter_record_batch};
use datafusion::arrow::datatypes::{DataType, Field, FieldRef, Float64Type, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;

use crate::error::AstroError;

/// Input file kinds recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Fits,
    Csv,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self, AstroError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("fits") => Ok(FileKind::Fits),
            Some("csv") => Ok(FileKind::Csv),
            _ => Err(AstroError::Validation(format!(
                "Unsupported file format for the file: '{}'. Please provide a FITS or CSV file.",
                path.display()
            ))),
        }
    }
}

/// Load a FITS (first extension) or CSV file into a single batch.
pub fn load_table(path: &Path) -> Result<RecordBatch, AstroError> {
    let kind = FileKind::from_path(path)?;
    // Surface a missing file as an I/O error before any format-specific reader
    std::fs::metadata(path)?;

    match kind {
        FileKind::Csv => csv::read_csv_file(path),
        FileKind::Fits => read_fits(path),
    }
}

#[cfg(feature = "fits")]
fn read_fits(path: &Path) -> Result<RecordBatch, AstroError> {
    fits::read_first_extension(path)
}

#[cfg(not(feature = "fits"))]
fn read_fits(path: &Path) -> Result<RecordBatch, AstroError> {
    Err(AstroError::Validation(format!(
        "Cannot read '{}': FITS input requires the `fits` feature",
        path.display()
    )))
}

/// Values of a numeric column widened to f64; nulls stay `None`.
pub fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>, AstroError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| AstroError::missing_column(name))?;

    if !column.data_type().is_numeric() {
        return Err(AstroError::Validation(format!(
            "Column '{}' is not numeric ({})",
            name,
            column.data_type()
        )));
    }

    let values = cast(column, &DataType::Float64)?;
    Ok(values.as_primitive::<Float64Type>().iter().collect())
}

pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

/// Replace `name` in place, or append it when the batch has no such column.
pub fn with_column(batch: &RecordBatch, name: &str, values: ArrayRef) -> Result<RecordBatch, AstroError> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut columns = batch.columns().to_vec();
    let field: FieldRef = Arc::new(Field::new(name, values.data_type().clone(), true));

    match schema.index_of(name) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = values;
        }
        Err(_) => {
            fields.push(field);
            columns.push(values);
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Keep the rows whose mask entry is `true`.
pub fn filter_rows(batch: &RecordBatch, mask: Vec<bool>) -> Result<RecordBatch, AstroError> {
    if mask.len() != batch.num_rows() {
        return Err(AstroError::Internal(format!(
            "Row mask has {} entries for {} rows",
            mask.len(),
            batch.num_rows()
        )));
    }
    Ok(filter_record_batch(batch, &BooleanArray::from(mask))?)
}

/// Project the named columns, failing on the first one that is absent.
pub fn select_columns<S: AsRef<str>>(batch: &RecordBatch, names: &[S]) -> Result<RecordBatch, AstroError> {
    let schema = batch.schema();
    let indices = names
        .iter()
        .map(|name| {
            schema.index_of(name.as_ref()).map_err(|_| {
                AstroError::Validation(
                    "one or more field names you provided do not exist in the metadata.".to_string(),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(batch.project(&indices)?)
}

/// First value of a column rendered as text, if any.
pub fn first_value_as_string(batch: &RecordBatch, name: &str) -> Option<String> {
    let column = batch.column_by_name(name)?;
    if column.is_empty() || column.is_null(0) {
        return None;
    }
    let text = cast(column, &DataType::Utf8).ok()?;
    Some(text.as_string::<i32>().value(0).to_string())
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use datafusion::arrow::array::{Float64Array, Int64Array, StringArray};

    pub fn float_batch(columns: &[(&str, Vec<f64>)]) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Float64, true))
            .collect();
        let arrays: Vec<ArrayRef> = columns
            .iter()
            .map(|(_, values)| Arc::new(Float64Array::from(values.clone())) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    pub fn mixed_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("objid", DataType::Int64, true),
            Field::new("class", DataType::Utf8, true),
            Field::new("redshift", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![1237645879551066262, 1237645879578460255])),
                Arc::new(StringArray::from(vec!["GALAXY", "QSO"])),
                Arc::new(Float64Array::from(vec![0.03212454, 1.2])),
            ],
        )
        .unwrap()
    }
}
