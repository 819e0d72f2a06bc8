use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::{Column, ColumnKind, Dataset, Value};

// ---------------------------------------------------------------------------
// Derived data handed to the renderer
// ---------------------------------------------------------------------------

/// Rendering data computed for a resolved chart. Absent values never
/// contribute to any of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartData {
    /// Bar and pie slices.
    ValueCounts { counts: Vec<ValueCount> },
    /// Histogram and KDE input.
    Values { values: Vec<f64> },
    Box { summary: BoxSummary },
    Series { points: Vec<SeriesPoint> },
    Points { points: Vec<Point> },
    Correlation { matrix: CorrelationMatrix },
    Groups { groups: Vec<Group> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// One line-chart point; `x` is the row position, or the time axis value
/// when one is bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub x: Value,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Pairwise Pearson correlations; `None` where fewer than two complete
/// pairs exist or a column is constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub label: String,
    pub values: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Computations
// ---------------------------------------------------------------------------

/// Observed values with their frequencies, most frequent first; ties keep
/// value order.
pub fn value_counts(column: &Column) -> Vec<ValueCount> {
    let mut tally: BTreeMap<&Value, usize> = BTreeMap::new();
    for v in column.present() {
        *tally.entry(v).or_default() += 1;
    }
    let mut counts: Vec<ValueCount> = tally
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.clone(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

pub fn numeric_values(column: &Column) -> Vec<f64> {
    column.present().filter_map(Value::as_f64).collect()
}

/// Five-number summary with linearly interpolated quartiles.
pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(BoxSummary {
        count: sorted.len(),
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

/// `sorted` must be non-empty and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Pearson correlation over rows where both columns are present.
pub fn pearson(a: &Column, b: &Column) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .values()
        .iter()
        .zip(b.values())
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

pub fn correlation_matrix(columns: &[&Column]) -> CorrelationMatrix {
    let data = columns
        .iter()
        .map(|a| columns.iter().map(|b| pearson(a, b)).collect())
        .collect();
    CorrelationMatrix {
        columns: columns.iter().map(|c| c.name().to_string()).collect(),
        data,
    }
}

/// Line points for `primary`. Without a time axis the row position is the
/// x value; with one, rows missing either value are dropped and points are
/// ordered by time.
pub fn series(primary: &Column, time_axis: Option<&Column>) -> Vec<SeriesPoint> {
    match time_axis {
        None => primary
            .values()
            .iter()
            .enumerate()
            .filter_map(|(row, v)| {
                Some(SeriesPoint {
                    x: Value::Integer(row as i64),
                    y: v.as_f64()?,
                })
            })
            .collect(),
        Some(time) => {
            let mut points: Vec<SeriesPoint> = time
                .values()
                .iter()
                .zip(primary.values())
                .filter_map(|(t, v)| {
                    let t = t.as_datetime()?;
                    Some(SeriesPoint {
                        x: Value::Datetime(t),
                        y: v.as_f64()?,
                    })
                })
                .collect();
            points.sort_by(|a, b| a.x.cmp(&b.x));
            points
        }
    }
}

/// Scatter points for rows where every axis is present.
pub fn points(
    x: &Column,
    y: &Column,
    z: Option<&Column>,
    category: Option<&Column>,
) -> Vec<Point> {
    (0..x.len())
        .filter_map(|row| {
            let z = match z {
                Some(col) => Some(col.values()[row].as_f64()?),
                None => None,
            };
            Some(Point {
                x: x.values()[row].as_f64()?,
                y: y.values()[row].as_f64()?,
                z,
                category: category
                    .map(|c| &c.values()[row])
                    .filter(|v| !v.is_absent())
                    .map(ToString::to_string),
            })
        })
        .collect()
}

/// Numeric values split by category label; rows missing either are dropped.
pub fn groups(category: &Column, values: &Column) -> Vec<Group> {
    let mut by_label: BTreeMap<&Value, Vec<f64>> = BTreeMap::new();
    for (label, v) in category.values().iter().zip(values.values()) {
        if label.is_absent() {
            continue;
        }
        if let Some(v) = v.as_f64() {
            by_label.entry(label).or_default().push(v);
        }
    }
    by_label
        .into_iter()
        .map(|(label, values)| Group {
            label: label.to_string(),
            values,
        })
        .collect()
}

/// Every numeric column of the snapshot, in column order.
pub fn numeric_columns(dataset: &Dataset) -> Vec<&Column> {
    dataset.columns_of(ColumnKind::Numeric).collect()
}
