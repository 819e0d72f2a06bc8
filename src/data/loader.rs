use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Date64Array, Float32Array,
    Float64Array, Int64Array, StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt64Array,
};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, TimeUnit};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, Dataset, Value};
use super::schema::classify;
use crate::config::EngineConfig;
use crate::error::ParseError;

/// What the host says the uploaded bytes are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Csv,
    Json,
    Parquet,
    Spreadsheet,
}

impl FormatHint {
    /// Guess from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "parquet" | "pq" => Some(Self::Parquet),
            "xlsx" | "xls" | "xlsm" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a file from disk. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one record per line
/// * `.json`    – `[{ "col": value, ... }, ...]` (records orientation)
/// * `.parquet` – flat columns of strings, numbers, booleans, dates;
///   dictionary, decimal and other castable types are converted first
pub fn load_file(path: &Path, config: &EngineConfig) -> Result<Dataset, ParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let hint = FormatHint::from_extension(ext).ok_or_else(|| ParseError::UnsupportedFormat {
        format: format!(".{ext}"),
    })?;
    let bytes = std::fs::read(path)?;
    info!("loading {} ({} bytes)", path.display(), bytes.len());
    load_dataset(&bytes, hint, config)
}

/// Parse uploaded bytes into a classified [`Dataset`].
pub fn load_dataset(
    bytes: &[u8],
    hint: FormatHint,
    config: &EngineConfig,
) -> Result<Dataset, ParseError> {
    config.validate()?;
    let named = match hint {
        FormatHint::Csv => read_csv(bytes, config)?,
        FormatHint::Json => read_json(bytes, config)?,
        FormatHint::Parquet => read_parquet(bytes)?,
        FormatHint::Spreadsheet => {
            return Err(ParseError::UnsupportedFormat {
                format: "spreadsheet".to_string(),
            })
        }
    };

    let columns = keep_usable_headers(named, config);
    if columns.is_empty() {
        return Err(ParseError::NoColumns);
    }
    let dataset = classify(&Dataset::from_raw(columns)?);
    info!(
        "loaded {} rows × {} columns",
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

/// Drop empty / placeholder header names and repeats of an earlier name.
fn keep_usable_headers(named: Vec<(String, Vec<Value>)>, config: &EngineConfig) -> Vec<Column> {
    let mut seen = BTreeSet::new();
    named
        .into_iter()
        .filter_map(|(name, values)| {
            let name = name.trim().to_string();
            if config.is_placeholder_header(&name) {
                debug!("dropping placeholder column '{name}'");
                return None;
            }
            if !seen.insert(name.clone()) {
                warn!("dropping repeated column '{name}'");
                return None;
            }
            Some(Column::raw(name, values))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn read_csv(bytes: &[u8], config: &EngineConfig) -> Result<Vec<(String, Vec<Value>)>, ParseError> {
    let delimiter = u8::try_from(config.csv_delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ParseError::UnsupportedFormat {
            format: format!("CSV delimited by '{}'", config.csv_delimiter),
        })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut values: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(ParseError::MalformedRow {
                row: row_no + 1,
                reason: format!("expected {} fields, found {}", headers.len(), record.len()),
            });
        }
        for (col, field) in record.iter().enumerate() {
            values[col].push(guess_cell_type(field, config));
        }
    }

    Ok(headers.into_iter().zip(values).collect())
}

fn guess_cell_type(s: &str, config: &EngineConfig) -> Value {
    let s = s.trim();
    if config.is_null_token(s) {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::from(f);
    }
    match s {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::Text(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "city": "NY", "age": 25 },
///   { "city": "LA", "age": null }
/// ]
/// ```
///
/// Keys missing from a record load as absent values. Columns keep file
/// order: a key takes its place in the first record that carries it.
fn read_json(bytes: &[u8], config: &EngineConfig) -> Result<Vec<(String, Vec<Value>)>, ParseError> {
    let root: JsonValue = serde_json::from_slice(bytes)?;
    let records = root.as_array().ok_or_else(|| ParseError::MalformedRow {
        row: 0,
        reason: "expected a top-level JSON array of records".to_string(),
    })?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec.as_object().ok_or_else(|| ParseError::MalformedRow {
            row: i,
            reason: "record is not a JSON object".to_string(),
        })?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    Ok(names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|rec| {
                    rec.get(&name)
                        .map(|v| json_to_value(v, config))
                        .unwrap_or(Value::Null)
                })
                .collect();
            (name, values)
        })
        .collect())
}

fn json_to_value(val: &JsonValue, config: &EngineConfig) -> Value {
    match val {
        JsonValue::String(s) if config.is_null_token(s.trim()) => Value::Null,
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::from(f)
            } else {
                Value::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Nested columns are rendered as text
/// where Arrow can cast them, and rejected otherwise.
fn read_parquet(bytes: &[u8]) -> Result<Vec<(String, Vec<Value>)>, ParseError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<(String, Vec<Value>)> = schema
        .fields()
        .iter()
        .map(|f| (f.name().clone(), Vec::new()))
        .collect();

    for batch_result in reader {
        let batch = batch_result?;
        for (idx, (name, values)) in columns.iter_mut().enumerate() {
            let col = readable_array(name, batch.column(idx))?;
            values.extend((0..batch.num_rows()).map(|row| extract_value(&col, row)));
        }
    }

    Ok(columns)
}

// -- Arrow helpers --

/// Cast a column into one of the types [`extract_value`] reads: narrow
/// integers to `Int64`, decimals and half floats to `Float64`, dictionaries
/// to their value type, anything else to `Utf8`.
fn readable_array(name: &str, col: &ArrayRef) -> Result<ArrayRef, ParseError> {
    let target = match col.data_type() {
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Int64
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64
        | DataType::Boolean
        | DataType::Date32
        | DataType::Date64
        | DataType::Timestamp(_, _) => return Ok(Arc::clone(col)),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => DataType::Int64,
        DataType::Float16 | DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => {
            DataType::Float64
        }
        DataType::Dictionary(_, value_type) => value_type.as_ref().clone(),
        _ => DataType::Utf8,
    };
    if !can_cast_types(col.data_type(), &target) {
        return Err(ParseError::UnsupportedFormat {
            format: format!("Parquet column '{name}' of type {}", col.data_type()),
        });
    }
    debug!("casting column '{name}' from {} to {target}", col.data_type());
    let converted = cast(col.as_ref(), &target)?;
    if matches!(col.data_type(), DataType::Dictionary(_, _)) {
        // The value type may itself need a cast.
        return readable_array(name, &converted);
    }
    Ok(converted)
}

/// Extract a single cell from a column already passed through
/// [`readable_array`].
fn extract_value(col: &ArrayRef, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| Value::Text(a.value(row).to_string()))
            .unwrap_or(Value::Null),
        DataType::LargeUtf8 => Value::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int64 => int_cell(any.downcast_ref::<Int64Array>().map(|a| a.value(row))),
        DataType::UInt64 => any
            .downcast_ref::<UInt64Array>()
            .map(|a| match i64::try_from(a.value(row)) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::from(a.value(row) as f64),
            })
            .unwrap_or(Value::Null),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| Value::from(a.value(row) as f64))
            .unwrap_or(Value::Null),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| Value::from(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Bool(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::Date32 => datetime_cell(
            any.downcast_ref::<Date32Array>()
                .and_then(|a| NaiveDate::from_num_days_from_ce_opt(a.value(row) + UNIX_EPOCH_DAYS))
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        ),
        DataType::Date64 => datetime_cell(
            any.downcast_ref::<Date64Array>()
                .and_then(|a| DateTime::from_timestamp_millis(a.value(row)))
                .map(|d| d.naive_utc()),
        ),
        DataType::Timestamp(unit, _) => datetime_cell(timestamp_cell(col, *unit, row)),
        // readable_array leaves no other types
        _ => Value::Null,
    }
}

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS: i32 = 719_163;

fn int_cell(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

fn datetime_cell(v: Option<NaiveDateTime>) -> Value {
    v.map(Value::Datetime).unwrap_or(Value::Null)
}

fn timestamp_cell(col: &Arc<dyn Array>, unit: TimeUnit, row: usize) -> Option<NaiveDateTime> {
    let any = col.as_any();
    let dt = match unit {
        TimeUnit::Second => any
            .downcast_ref::<TimestampSecondArray>()
            .and_then(|a| DateTime::from_timestamp(a.value(row), 0)),
        TimeUnit::Millisecond => any
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|a| DateTime::from_timestamp_millis(a.value(row))),
        TimeUnit::Microsecond => any
            .downcast_ref::<TimestampMicrosecondArray>()
            .and_then(|a| DateTime::from_timestamp_micros(a.value(row))),
        TimeUnit::Nanosecond => any
            .downcast_ref::<TimestampNanosecondArray>()
            .map(|a| DateTime::from_timestamp_nanos(a.value(row))),
    };
    dt.map(|d| d.naive_utc())
}
