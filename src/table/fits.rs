use datafusion::arrow::array::{ArrayRef, Float64Array, StringArray};
use datafusion::arrow::datatypes::{Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::FitsFile;
use std::path::Path;
use std::sync::Arc;

use crate::error::AstroError;
use crate::table::byte_order::{decode_column, ByteOrder, ScalarKind};

/// Position and type of one column inside a binary table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnSlot {
    offset: usize,
    repeat: usize,
    code: char,
    scaled: bool,
}

/// Load the binary table in the first extension HDU.
///
/// Scalar integer and floating point columns are read as raw big-endian
/// bytes and decoded through [`decode_column`] into host order. Text
/// columns and scaled (`TSCALn`/`TZEROn`) columns go through cfitsio's typed
/// readers; vector-valued columns are skipped.
pub fn read_first_extension(path: &Path) -> Result<RecordBatch, AstroError> {
    let mut fptr = FitsFile::open(path).map_err(|e| {
        AstroError::Parse(format!("Failed to open FITS file {}: {}", path.display(), e))
    })?;

    let hdu = fptr
        .hdu(1)
        .map_err(|e| AstroError::Parse(format!("Failed to access HDU 1: {}", e)))?;

    let (names, num_rows) = match &hdu.info {
        HduInfo::TableInfo {
            column_descriptions,
            num_rows,
        } => (
            column_descriptions
                .iter()
                .map(|c| c.name.clone())
                .collect::<Vec<_>>(),
            *num_rows,
        ),
        _ => {
            return Err(AstroError::Parse(format!(
                "HDU 1 of {} is not a table",
                path.display()
            )))
        }
    };

    let row_width = read_header_int(&hdu, &mut fptr, "NAXIS1")? as usize;
    let slots = column_layout(&hdu, &mut fptr, names.len())?;
    let raw = read_raw_rows(&hdu, &mut fptr, num_rows, row_width)?;

    let mut fields = Vec::with_capacity(names.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(names.len());

    for (name, slot) in names.iter().zip(&slots) {
        if slot.repeat != 1 && slot.code != 'A' {
            tracing::debug!("Skipping vector column {} (repeat {})", name, slot.repeat);
            continue;
        }

        let array: ArrayRef = match ScalarKind::from_tform(slot.code) {
            Some(kind) if !slot.scaled => {
                let bytes = gather_column(&raw, row_width, slot.offset, kind.width());
                decode_column(&bytes, kind, ByteOrder::Big, ByteOrder::host())?
            }
            _ if slot.code == 'A' => match hdu.read_col::<String>(&mut fptr, name) {
                Ok(values) => Arc::new(StringArray::from(
                    values
                        .into_iter()
                        .map(|v| v.trim_end().to_string())
                        .collect::<Vec<_>>(),
                )),
                Err(e) => {
                    tracing::warn!("Skipping text column {}: {}", name, e);
                    continue;
                }
            },
            _ => match hdu.read_col::<f64>(&mut fptr, name) {
                Ok(values) => Arc::new(Float64Array::from(values)),
                Err(_) => {
                    tracing::warn!("Skipping FITS column {} with unsupported type {}", name, slot.code);
                    continue;
                }
            },
        };

        fields.push(Field::new(name, array.data_type().clone(), true));
        columns.push(array);
    }

    if columns.is_empty() {
        return Err(AstroError::Parse(format!(
            "No readable columns in {}",
            path.display()
        )));
    }

    tracing::debug!("Loaded {} columns, {} rows from {}", columns.len(), num_rows, path.display());
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn read_header_int(hdu: &FitsHdu, fptr: &mut FitsFile, key: &str) -> Result<i64, AstroError> {
    hdu.read_key::<i64>(fptr, key)
        .map_err(|e| AstroError::Parse(format!("Missing or invalid {} keyword: {}", key, e)))
}

fn column_layout(hdu: &FitsHdu, fptr: &mut FitsFile, count: usize) -> Result<Vec<ColumnSlot>, AstroError> {
    let mut offset = 0;
    let mut slots = Vec::with_capacity(count);

    for n in 1..=count {
        let tform: String = hdu
            .read_key(fptr, &format!("TFORM{}", n))
            .map_err(|e| AstroError::Parse(format!("Missing TFORM{}: {}", n, e)))?;
        let (repeat, code) = parse_tform(&tform)
            .ok_or_else(|| AstroError::Parse(format!("Unsupported TFORM{} '{}'", n, tform)))?;
        let scaled = hdu.read_key::<f64>(fptr, &format!("TSCAL{}", n)).is_ok()
            || hdu.read_key::<f64>(fptr, &format!("TZERO{}", n)).is_ok();

        slots.push(ColumnSlot {
            offset,
            repeat,
            code,
            scaled,
        });
        offset += field_width(repeat, code);
    }

    Ok(slots)
}

/// Split a TFORM value such as `1D`, `E` or `20A` into repeat count and type code.
fn parse_tform(tform: &str) -> Option<(usize, char)> {
    let tform = tform.trim();
    let digits: String = tform.chars().take_while(|c| c.is_ascii_digit()).collect();
    let code = tform[digits.len()..].chars().next()?.to_ascii_uppercase();
    let repeat = if digits.is_empty() { 1 } else { digits.parse().ok()? };
    matches!(code, 'L' | 'X' | 'B' | 'I' | 'J' | 'K' | 'A' | 'E' | 'D' | 'C' | 'M' | 'P' | 'Q')
        .then_some((repeat, code))
}

/// Bytes a field occupies in a row
fn field_width(repeat: usize, code: char) -> usize {
    match code {
        'X' => repeat.div_ceil(8),
        'L' | 'B' | 'A' => repeat,
        'I' => 2 * repeat,
        'J' | 'E' => 4 * repeat,
        'K' | 'D' | 'C' | 'P' => 8 * repeat,
        'M' | 'Q' => 16 * repeat,
        _ => 0,
    }
}

/// The table data exactly as stored on disk, `num_rows * row_width` bytes.
fn read_raw_rows(
    hdu: &FitsHdu,
    fptr: &mut FitsFile,
    num_rows: usize,
    row_width: usize,
) -> Result<Vec<u8>, AstroError> {
    let mut buffer = vec![0u8; num_rows * row_width];
    if buffer.is_empty() {
        return Ok(buffer);
    }

    // Reading a keyword makes this HDU current for the raw call below
    read_header_int(hdu, fptr, "NAXIS2")?;

    let mut status = 0;
    // SAFETY: the current HDU is the table and `buffer` holds exactly the
    // number of bytes requested.
    unsafe {
        fitsio::sys::ffgtbb(
            fptr.as_raw(),
            1,
            1,
            buffer.len() as i64,
            buffer.as_mut_ptr(),
            &mut status,
        );
    }
    if status != 0 {
        return Err(AstroError::Parse(format!(
            "Failed to read table bytes (cfitsio status {})",
            status
        )));
    }
    Ok(buffer)
}

/// Pack one fixed-width field from every row into a contiguous buffer.
fn gather_column(raw: &[u8], row_width: usize, offset: usize, width: usize) -> Vec<u8> {
    raw.chunks_exact(row_width)
        .flat_map(|row| &row[offset..offset + width])
        .copied()
        .collect()
}

#[cfg(test)]
pub(crate) mod test_util {
    use fitsio::tables::{ColumnDataType, ColumnDescription};
    use fitsio::FitsFile;
    use std::path::Path;

    /// Write a primary HDU plus a binary table with the given double columns.
    pub fn write_double_table(path: &Path, columns: &[(&str, Vec<f64>)]) {
        let mut fptr = FitsFile::create(path).open().unwrap();
        let descriptions: Vec<_> = columns
            .iter()
            .map(|(name, _)| {
                ColumnDescription::new(*name)
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap()
            })
            .collect();
        let hdu = fptr.create_table("DATA".to_string(), &descriptions).unwrap();
        for (name, values) in columns {
            hdu.write_col(&mut fptr, *name, values.as_slice()).unwrap();
        }
    }
}
