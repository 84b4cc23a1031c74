// Converts result tables to JSON rows; backs `QueryHandler::get_results_json`.

use datafusion::arrow::array::{Array, ArrayRef, AsArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use datafusion::arrow::record_batch::RecordBatch;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::AstroError;

/// One JSON object per row, keyed by column name.
pub fn to_json_rows(batch: &RecordBatch) -> Result<Vec<Map<String, JsonValue>>, AstroError> {
    let schema = batch.schema();
    let columns = batch
        .columns()
        .iter()
        .map(column_to_json)
        .collect::<Result<Vec<_>, _>>()?;

    let rows = (0..batch.num_rows())
        .map(|row_idx| {
            schema
                .fields()
                .iter()
                .zip(&columns)
                .map(|(field, values)| (field.name().clone(), values[row_idx].clone()))
                .collect()
        })
        .collect();

    Ok(rows)
}

fn column_to_json(column: &ArrayRef) -> Result<Vec<JsonValue>, AstroError> {
    let values = match column.data_type() {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let ints = cast(column, &DataType::Int64)?;
            ints.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(JsonValue::Null, JsonValue::from))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let ints = cast(column, &DataType::UInt64)?;
            ints.as_primitive::<UInt64Type>()
                .iter()
                .map(|v| v.map_or(JsonValue::Null, JsonValue::from))
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let floats = cast(column, &DataType::Float64)?;
            // NaN and infinities have no JSON form
            floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.and_then(Number::from_f64).map_or(JsonValue::Null, JsonValue::Number))
                .collect()
        }
        DataType::Boolean => column
            .as_boolean()
            .iter()
            .map(|v| v.map_or(JsonValue::Null, JsonValue::Bool))
            .collect(),
        _ => {
            let text = cast(column, &DataType::Utf8)?;
            text.as_string::<i32>()
                .iter()
                .map(|v| v.map_or(JsonValue::Null, |s| JsonValue::String(s.to_string())))
                .collect()
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_util::mixed_batch;
    use serde_json::json;

    #[test]
    fn test_rows_keyed_by_column() {
        let rows = to_json_rows(&mixed_batch()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            JsonValue::Object(rows[0].clone()),
            json!({"objid": 1237645879551066262_i64, "class": "GALAXY", "redshift": 0.03212454})
        );
        assert_eq!(rows[1]["class"], json!("QSO"));
    }

    #[test]
    fn test_nan_becomes_null() {
        let batch = crate::table::test_util::float_batch(&[("Flux", vec![f64::NAN, 1.5])]);
        let rows = to_json_rows(&batch).unwrap();
        assert_eq!(rows[0]["Flux"], JsonValue::Null);
        assert_eq!(rows[1]["Flux"], json!(1.5));
    }
}
