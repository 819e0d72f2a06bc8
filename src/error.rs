use serde::Serialize;
use thiserror::Error;

use crate::chart::contract::{ChartKind, Role};
use crate::data::model::ColumnKind;

/// Failure to turn uploaded bytes into a [`Dataset`](crate::data::model::Dataset).
/// Shown to the user verbatim; the previous dataset stays loaded.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed Parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Unsupported file format: {format}")]
    UnsupportedFormat { format: String },
    #[error("Row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
    #[error("File has no usable columns")]
    NoColumns,
    #[error(transparent)]
    Shape(#[from] DatasetError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Duplicate column name '{name}'")]
    DuplicateColumn { name: String },
    #[error("Column '{name}' has {found} values, expected {expected}")]
    RaggedColumn {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// A filter entry that cannot be applied to the current snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Filter references unknown column '{column}'")]
    UnknownColumn { column: String },
    #[error("Column '{column}' is {kind}; it takes a {expected} filter")]
    ShapeMismatch {
        column: String,
        kind: ColumnKind,
        expected: &'static str,
    },
    #[error("Range filter on '{column}' has low {low} above high {high}")]
    InvertedRange { column: String, low: String, high: String },
    #[error("Column '{column}' has no observed values to filter on")]
    NoObservedValues { column: String },
    #[error("Cannot read '{value}' as a bound for column '{column}'")]
    BadBound { column: String, value: String },
    #[error("Cannot parse filter clause '{clause}': expected col=a,b or col=lo..hi")]
    BadClause { clause: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("Cannot use unknown column '{column}' as a time axis")]
    UnknownColumn { column: String },
    #[error("Column '{column}' row {row}: '{value}' is not a recognised date or time")]
    Unparseable {
        column: String,
        row: usize,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Why a chart request could not be resolved against a snapshot.
///
/// Every rejection is a value meant for direct display; resolution never
/// panics and never leaves partial output behind.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("{chart} needs a column for the '{role}' role")]
    RoleUnbound { chart: ChartKind, role: Role },
    #[error("Column '{column}' selected for '{role}' does not exist")]
    UnknownColumn { role: Role, column: String },
    #[error("{chart} needs a {} column for '{role}', but '{column}' is {found}", join_kinds(.accepted))]
    RoleKindMismatch {
        chart: ChartKind,
        role: Role,
        column: String,
        found: ColumnKind,
        accepted: Vec<ColumnKind>,
    },
    #[error("'{column}' is bound to both '{first}' and '{second}'; pick different columns")]
    AxesNotDistinct {
        first: Role,
        second: Role,
        column: String,
    },
    #[error("Too many unique values for a {chart}: '{column}' has {distinct}, limit is {limit}")]
    TooManyCategories {
        chart: ChartKind,
        column: String,
        distinct: usize,
        limit: usize,
    },
    #[error("{chart} needs at least {required} numeric columns, dataset has {available}")]
    InsufficientNumericColumns {
        chart: ChartKind,
        required: usize,
        available: usize,
    },
    #[error("No rows left to plot; the current filters exclude every row")]
    EmptyDataset,
}

fn join_kinds(kinds: &[ColumnKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}
