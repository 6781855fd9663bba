use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde_json::{Map, Value as JsonValue};

use crate::error::{AppError, ProfileError};
use crate::models::{Column, ColumnType, Dataset, Value};
use crate::services::profile::utils::parse_temporal;

/// Share of present strings that must parse as dates for a JSON column to be
/// tagged temporal.
const DATE_RATIO_THRESHOLD: f64 = 0.8;

// 1970-01-01 counted from 0001-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Cell texts read as missing in CSV uploads, on top of empty fields.
pub const CSV_NULL_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

static JSON_NULL: JsonValue = JsonValue::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn from_filename(filename: &str) -> Result<Self, AppError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            _ => Err(AppError::InvalidInput(format!(
                "Unsupported file '{}': only CSV and JSON files are supported",
                filename
            ))),
        }
    }
}

pub fn load_dataset(file_data: &[u8], format: FileFormat) -> Result<Dataset, AppError> {
    if file_data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(AppError::ParseError("Uploaded file is empty".to_string()));
    }

    let start = std::time::Instant::now();
    let dataset = match format {
        FileFormat::Csv => {
            let df = read_csv(file_data)?;
            dataset_from_frame(&df)?
        }
        FileFormat::Json => {
            let doc: JsonValue = serde_json::from_slice(file_data)?;
            dataset_from_json(&doc)?
        }
    };
    tracing::info!(
        "Loaded {:?} dataset with {} rows, {} columns in {:?}",
        format,
        dataset.row_count(),
        dataset.column_count(),
        start.elapsed()
    );
    Ok(dataset)
}

pub fn read_csv(file_data: &[u8]) -> Result<DataFrame, AppError> {
    CsvReader::new(Cursor::new(file_data))
        .has_header(true)
        .with_null_values(Some(NullValues::AllColumns(
            CSV_NULL_MARKERS.iter().map(|m| m.to_string()).collect(),
        )))
        .with_try_parse_dates(true)
        .finish()
        .map_err(|e| {
            tracing::error!("Failed to read CSV: {}", e);
            AppError::ParseError(format!("Failed to read CSV: {}", e))
        })
}

pub fn dataset_from_frame(df: &DataFrame) -> Result<Dataset, ProfileError> {
    let columns = df
        .get_columns()
        .iter()
        .map(|series| {
            let series = series.rechunk();
            let values = (0..series.len())
                .map(|idx| series.get(idx).map(from_any_value))
                .collect::<PolarsResult<Vec<_>>>()
                .map_err(|e| {
                    ProfileError::InvalidDataset(format!(
                        "column '{}' cannot be read: {}",
                        series.name(),
                        e
                    ))
                })?;
            Ok(Column::new(series.name(), column_type(series.dtype()), values))
        })
        .collect::<Result<Vec<_>, ProfileError>>()?;

    Dataset::new(columns)
}

fn column_type(dtype: &DataType) -> ColumnType {
    match dtype {
        DataType::Boolean => ColumnType::Boolean,
        DataType::String => ColumnType::Text,
        d if d.is_numeric() => ColumnType::Numeric,
        d if d.is_temporal() => ColumnType::Temporal,
        _ => ColumnType::Other,
    }
}

fn from_any_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::Int32(v) => Value::Int(v as i64),
        AnyValue::Int64(v) => Value::Int(v),
        AnyValue::UInt32(v) => Value::Int(v as i64),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Float(v as f64), Value::Int),
        AnyValue::Float32(v) => Value::Float(v as f64),
        AnyValue::Float64(v) => Value::Float(v),
        AnyValue::Date(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map_or(Value::Null, Value::Date),
        AnyValue::Datetime(v, unit, _) => {
            let micros = match unit {
                TimeUnit::Nanoseconds => v.div_euclid(1_000),
                TimeUnit::Microseconds => v,
                TimeUnit::Milliseconds => v.saturating_mul(1_000),
            };
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            DateTime::<Utc>::from_timestamp(micros.div_euclid(1_000_000), nanos)
                .map_or(Value::Null, |dt| Value::DateTime(dt.naive_utc()))
        }
        other => Value::Text(other.to_string()),
    }
}

/// Accepts the shapes a records- or columns-oriented JSON export produces:
/// `[{col: v, ..}, ..]`, `{col: [v, ..], ..}` and `{col: {row: v, ..}, ..}`.
pub fn dataset_from_json(doc: &JsonValue) -> Result<Dataset, ProfileError> {
    match doc {
        JsonValue::Array(rows) => from_records(rows),
        JsonValue::Object(map) => from_column_map(map),
        _ => Err(ProfileError::InvalidDataset(
            "expected a JSON array of records or an object of columns".to_string(),
        )),
    }
}

fn from_records(rows: &[JsonValue]) -> Result<Dataset, ProfileError> {
    let mut records: Vec<&Map<String, JsonValue>> = Vec::with_capacity(rows.len());
    let mut names: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();

    for (i, row) in rows.iter().enumerate() {
        let record = row.as_object().ok_or_else(|| {
            ProfileError::InvalidDataset(format!("row {} is not a JSON object", i))
        })?;
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                names.push(key.as_str());
            }
        }
        records.push(record);
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let cells = records
                .iter()
                .map(|record| record.get(name).unwrap_or(&JSON_NULL))
                .collect::<Vec<_>>();
            build_column(name, &cells)
        })
        .collect();

    Dataset::new(columns)
}

fn from_column_map(map: &Map<String, JsonValue>) -> Result<Dataset, ProfileError> {
    if let Some((name, _)) = map.iter().find(|(_, column)| !column.is_array() && !column.is_object()) {
        return Err(ProfileError::InvalidDataset(format!(
            "column '{}' is a scalar, expected an array or an object",
            name
        )));
    }

    // Plain column arrays line up by position.
    if map.values().all(JsonValue::is_array) {
        let columns = map
            .iter()
            .filter_map(|(name, column)| {
                column
                    .as_array()
                    .map(|values| build_column(name, &values.iter().collect::<Vec<_>>()))
            })
            .collect();
        return Dataset::new(columns);
    }

    // Columns keyed by row index line up by key, in first-seen order.
    let mut row_keys: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for column in map.values() {
        let keys: Vec<String> = match column {
            JsonValue::Object(by_row) => by_row.keys().cloned().collect(),
            JsonValue::Array(values) => (0..values.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };
        for key in keys {
            if seen.insert(key.clone()) {
                row_keys.push(key);
            }
        }
    }

    let columns = map
        .iter()
        .map(|(name, column)| {
            let cells = row_keys
                .iter()
                .map(|key| row_cell(column, key).unwrap_or(&JSON_NULL))
                .collect::<Vec<_>>();
            build_column(name, &cells)
        })
        .collect();

    Dataset::new(columns)
}

fn row_cell<'a>(column: &'a JsonValue, key: &str) -> Option<&'a JsonValue> {
    match column {
        JsonValue::Object(by_row) => by_row.get(key),
        JsonValue::Array(values) => key.parse::<usize>().ok().and_then(|i| values.get(i)),
        _ => None,
    }
}

fn build_column(name: &str, cells: &[&JsonValue]) -> Column {
    let kind = infer_json_type(cells);
    // A numeric column holding any float is stored entirely as floats.
    let widen = kind == ColumnType::Numeric
        && cells
            .iter()
            .any(|v| v.is_number() && v.as_i64().is_none());

    let values = cells
        .iter()
        .map(|cell| match (kind, cell) {
            (_, JsonValue::Null) => Value::Null,
            (ColumnType::Temporal, JsonValue::String(s)) => {
                parse_temporal(s).unwrap_or_else(|| Value::Text(s.clone()))
            }
            (_, cell) => from_json_scalar(cell, widen),
        })
        .collect();

    Column::new(name, kind, values)
}

fn infer_json_type(cells: &[&JsonValue]) -> ColumnType {
    let present: Vec<&JsonValue> = cells.iter().copied().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        return ColumnType::Other;
    }

    if present.iter().all(|v| v.is_boolean()) {
        ColumnType::Boolean
    } else if present.iter().all(|v| v.is_number()) {
        ColumnType::Numeric
    } else if present.iter().all(|v| v.is_string()) {
        let dates = present
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| parse_temporal(s).is_some())
            .count();
        if dates as f64 >= present.len() as f64 * DATE_RATIO_THRESHOLD {
            ColumnType::Temporal
        } else {
            ColumnType::Text
        }
    } else {
        ColumnType::Other
    }
}

fn from_json_scalar(cell: &JsonValue, widen: bool) -> Value {
    match cell {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) if !widen => Value::Int(i),
            _ => n.as_f64().map_or(Value::Null, Value::Float),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        nested => Value::Text(nested.to_string()),
    }
}
