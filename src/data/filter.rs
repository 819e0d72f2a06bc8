use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use super::model::{Column, ColumnKind, Dataset, Value};
use super::schema::parse_datetime;
use crate::error::FilterError;

// ---------------------------------------------------------------------------
// Predicates and the per-column filter spec
// ---------------------------------------------------------------------------

/// What one column filter keeps. The shape must match the column kind:
/// categorical columns take `OneOf`, numeric and datetime columns `Range`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Keep rows whose value is in the set. An empty set keeps nothing.
    OneOf { allowed: BTreeSet<Value> },
    /// Inclusive range; an unset bound defaults to the observed min / max.
    Range {
        low: Option<Value>,
        high: Option<Value>,
    },
}

impl Predicate {
    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::OneOf {
            allowed: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(low: Option<Value>, high: Option<Value>) -> Self {
        Predicate::Range { low, high }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterEntry {
    pub column: String,
    pub predicate: Predicate,
}

/// Per-column filters in the order the user declared them.
/// A column that has no entry is not constrained.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterSpec {
    entries: Vec<FilterEntry>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn get(&self, column: &str) -> Option<&Predicate> {
        self.entries
            .iter()
            .find(|e| e.column == column)
            .map(|e| &e.predicate)
    }

    /// Declare (or re-declare) the filter for a column. A re-declared column
    /// keeps its original position in the declaration order.
    pub fn set(&mut self, column: impl Into<String>, predicate: Predicate) {
        let column = column.into();
        match self.entries.iter_mut().find(|e| e.column == column) {
            Some(entry) => entry.predicate = predicate,
            None => self.entries.push(FilterEntry { column, predicate }),
        }
    }

    pub fn with(mut self, column: impl Into<String>, predicate: Predicate) -> Self {
        self.set(column, predicate);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Predicate> {
        let idx = self.entries.iter().position(|e| e.column == column)?;
        Some(self.entries.remove(idx).predicate)
    }

    /// Start a column's filter with everything selected (i.e. show all).
    pub fn init_for(&mut self, dataset: &Dataset, column: &str) -> Result<(), FilterError> {
        let col = lookup(dataset, column)?;
        let predicate = match col.kind() {
            ColumnKind::Categorical => Predicate::OneOf {
                allowed: col.unique_values(),
            },
            ColumnKind::Numeric | ColumnKind::Datetime => Predicate::range(None, None),
            ColumnKind::Unknown => {
                return Err(FilterError::NoObservedValues {
                    column: column.to_string(),
                })
            }
        };
        self.set(column, predicate);
        Ok(())
    }

    /// Flip one value of a categorical filter. A column without a filter yet
    /// starts from "all selected".
    pub fn toggle_value(
        &mut self,
        dataset: &Dataset,
        column: &str,
        value: &Value,
    ) -> Result<(), FilterError> {
        if self.get(column).is_none() {
            self.init_for(dataset, column)?;
        }
        let Some(entry) = self.entries.iter_mut().find(|e| e.column == column) else {
            return Ok(());
        };
        match &mut entry.predicate {
            Predicate::OneOf { allowed } => {
                if !allowed.remove(value) {
                    allowed.insert(value.clone());
                }
                Ok(())
            }
            Predicate::Range { .. } => Err(shape_error(lookup(dataset, column)?)),
        }
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, dataset: &Dataset, column: &str) -> Result<(), FilterError> {
        self.init_for(dataset, column)
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.set(column, Predicate::OneOf {
            allowed: BTreeSet::new(),
        });
    }

    /// Check every entry against the snapshot before anything is applied.
    pub fn validate(&self, dataset: &Dataset) -> Result<(), FilterError> {
        for entry in &self.entries {
            let col = lookup(dataset, &entry.column)?;
            match (&entry.predicate, col.kind()) {
                (_, ColumnKind::Unknown) => {
                    return Err(FilterError::NoObservedValues {
                        column: entry.column.clone(),
                    })
                }
                (Predicate::OneOf { .. }, ColumnKind::Categorical) => {}
                (Predicate::Range { low, high }, ColumnKind::Numeric | ColumnKind::Datetime) => {
                    let lo = low.as_ref().map(|b| bound_scalar(col, b)).transpose()?;
                    let hi = high.as_ref().map(|b| bound_scalar(col, b)).transpose()?;
                    if let (Some(lo), Some(hi)) = (lo, hi) {
                        if lo > hi {
                            return Err(FilterError::InvertedRange {
                                column: entry.column.clone(),
                                low: display_bound(low),
                                high: display_bound(high),
                            });
                        }
                    }
                }
                _ => return Err(shape_error(col)),
            }
        }
        Ok(())
    }
}

fn lookup<'a>(dataset: &'a Dataset, column: &str) -> Result<&'a Column, FilterError> {
    dataset
        .column(column)
        .ok_or_else(|| FilterError::UnknownColumn {
            column: column.to_string(),
        })
}

fn shape_error(col: &Column) -> FilterError {
    FilterError::ShapeMismatch {
        column: col.name().to_string(),
        kind: col.kind(),
        expected: match col.kind() {
            ColumnKind::Categorical => "value-set",
            _ => "range",
        },
    }
}

/// A range bound must sit on the column's axis: a number for numeric
/// columns, a datetime for datetime columns.
fn bound_scalar(col: &Column, bound: &Value) -> Result<f64, FilterError> {
    let scalar = match col.kind() {
        ColumnKind::Datetime => bound.as_datetime().and_then(|_| bound.as_scalar()),
        _ => bound.as_f64(),
    };
    scalar.ok_or_else(|| FilterError::BadBound {
        column: col.name().to_string(),
        value: bound.to_string(),
    })
}

fn display_bound(bound: &Option<Value>) -> String {
    bound
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

// ---------------------------------------------------------------------------
// Applying a spec
// ---------------------------------------------------------------------------

/// A filtered snapshot plus the human-readable list of filters that
/// actually narrowed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub dataset: Dataset,
    pub audit: Vec<String>,
}

/// Apply `spec` to `dataset`, producing a new snapshot.
///
/// A filter that selects the column's whole observed domain is a no-op: it
/// keeps absent values and is left out of the audit trail. Any narrowing
/// filter also drops rows where its column is absent. Filters are ANDed.
/// Zero surviving rows is a valid, empty result.
pub fn apply(dataset: &Dataset, spec: &FilterSpec) -> Result<Filtered, FilterError> {
    spec.validate(dataset)?;

    let mut keep = vec![true; dataset.len()];
    let mut audit = Vec::new();

    for entry in spec.entries() {
        let col = lookup(dataset, &entry.column)?;
        let Some(test) = narrowing_test(col, &entry.predicate)? else {
            debug!("filter on '{}' selects everything, skipped", entry.column);
            continue;
        };
        for (row, value) in col.values().iter().enumerate() {
            if keep[row] && (value.is_absent() || !test.matches(value)) {
                keep[row] = false;
            }
        }
        audit.push(test.describe(&entry.column));
    }

    if audit.is_empty() {
        return Ok(Filtered {
            dataset: dataset.clone(),
            audit,
        });
    }

    let rows: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter(|(_, &k)| k)
        .map(|(i, _)| i)
        .collect();
    debug!("filters kept {} of {} rows", rows.len(), dataset.len());

    Ok(Filtered {
        dataset: dataset.select_rows(&rows),
        audit,
    })
}

enum RowTest<'a> {
    Member(&'a BTreeSet<Value>),
    Between {
        low: f64,
        high: f64,
        low_label: String,
        high_label: String,
    },
}

impl RowTest<'_> {
    fn matches(&self, value: &Value) -> bool {
        match self {
            RowTest::Member(allowed) => allowed.contains(value),
            RowTest::Between { low, high, .. } => value
                .as_scalar()
                .is_some_and(|v| *low <= v && v <= *high),
        }
    }

    fn describe(&self, column: &str) -> String {
        match self {
            RowTest::Member(allowed) if allowed.is_empty() => {
                format!("{column}: no values selected")
            }
            RowTest::Member(allowed) => {
                let labels: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                format!("{column} is one of: {}", labels.join(", "))
            }
            RowTest::Between {
                low_label,
                high_label,
                ..
            } => format!("{column} between {low_label} and {high_label}"),
        }
    }
}

/// `None` when the predicate selects every observed value of the column.
fn narrowing_test<'a>(
    col: &Column,
    predicate: &'a Predicate,
) -> Result<Option<RowTest<'a>>, FilterError> {
    match predicate {
        Predicate::OneOf { allowed } => {
            let covers_all = col.present().all(|v| allowed.contains(v));
            Ok((!covers_all).then_some(RowTest::Member(allowed)))
        }
        Predicate::Range { low, high } => {
            let profile = col.profile();
            let Some((min, max)) = col.scalar_bounds() else {
                return Ok(None);
            };
            let lo = low.as_ref().map(|b| bound_scalar(col, b)).transpose()?;
            let hi = high.as_ref().map(|b| bound_scalar(col, b)).transpose()?;
            if lo.map_or(true, |lo| lo <= min) && hi.map_or(true, |hi| hi >= max) {
                return Ok(None);
            }
            let label = |bound: &Option<Value>, observed: Option<Value>| {
                bound
                    .clone()
                    .or(observed)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            };
            Ok(Some(RowTest::Between {
                low: lo.unwrap_or(min),
                high: hi.unwrap_or(max),
                low_label: label(low, profile.min),
                high_label: label(high, profile.max),
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Textual filter clauses
// ---------------------------------------------------------------------------

/// Parse `col=a,b` (categorical) or `col=lo..hi` (numeric / datetime, either
/// side may be empty) against the snapshot the filter will be applied to.
///
/// Categorical tokens select the observed values whose display text equals
/// the token. Datetime bounds are read with `datetime_formats`.
pub fn parse_clause(
    dataset: &Dataset,
    clause: &str,
    datetime_formats: &[String],
) -> Result<FilterEntry, FilterError> {
    let bad = || FilterError::BadClause {
        clause: clause.to_string(),
    };
    let (column, rhs) = clause.split_once('=').ok_or_else(bad)?;
    let column = column.trim();
    if column.is_empty() {
        return Err(bad());
    }
    let col = lookup(dataset, column)?;

    let predicate = match col.kind() {
        ColumnKind::Categorical => {
            let wanted: BTreeSet<&str> = rhs.split(',').map(str::trim).collect();
            Predicate::OneOf {
                allowed: col
                    .unique_values()
                    .into_iter()
                    .filter(|v| wanted.contains(v.to_string().as_str()))
                    .collect(),
            }
        }
        kind @ (ColumnKind::Numeric | ColumnKind::Datetime) => {
            let (lo, hi) = rhs.split_once("..").ok_or_else(bad)?;
            let bound = |text: &str| -> Option<Value> {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                let parsed = match kind {
                    ColumnKind::Datetime => {
                        parse_datetime(text, datetime_formats).map(Value::Datetime)
                    }
                    _ => text.parse::<f64>().ok().map(Value::Float),
                };
                Some(parsed.unwrap_or_else(|| Value::Text(text.to_string())))
            };
            Predicate::range(bound(lo), bound(hi))
        }
        ColumnKind::Unknown => {
            return Err(FilterError::NoObservedValues {
                column: column.to_string(),
            })
        }
    };

    Ok(FilterEntry {
        column: column.to_string(),
        predicate,
    })
}
