use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::csv::reader::Format;
use datafusion::arrow::csv::ReaderBuilder;
use datafusion::arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;

use crate::error::AstroError;

/// Read a UTF-8 CSV file with a header row.
pub fn read_csv_file(path: &Path) -> Result<RecordBatch, AstroError> {
    let bytes = std::fs::read(path)?;
    parse_csv(&bytes)?.ok_or_else(|| {
        AstroError::Validation(format!("File '{}' contains no data", path.display()))
    })
}

/// Parse CSV text into one batch with an inferred schema.
///
/// Lines starting with `#` are dropped first (SkyServer prefixes its CSV
/// output with `#Table1`). Returns `None` when nothing but comments or blank
/// lines remain; a header without rows gives an empty batch.
pub fn parse_csv(data: &[u8]) -> Result<Option<RecordBatch>, AstroError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| AstroError::Parse(format!("CSV content is not valid UTF-8: {}", e)))?;

    let cleaned = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.is_empty() {
        return Ok(None);
    }

    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(cleaned.as_bytes(), None)
        .map_err(|e| AstroError::Parse(format!("Failed to infer CSV schema: {}", e)))?;
    let schema = Arc::new(schema);

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(cleaned.as_bytes())
        .map_err(|e| AstroError::Parse(format!("Failed to create CSV reader: {}", e)))?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AstroError::Parse(format!("Failed to read CSV rows: {}", e)))?;

    Ok(Some(concat_batches(&schema, &batches)?))
}
