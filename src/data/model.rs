use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::chart::aggregate::{box_summary, numeric_values, value_counts};
use crate::error::DatasetError;

// ---------------------------------------------------------------------------
// Value – a single cell in a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Using `BTreeMap` / `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Only produced by an explicit time-axis coercion, never by loading.
    Datetime(NaiveDateTime),
    /// Absent value.
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        // Integers and floats share a rank so mixed columns sort by magnitude.
        fn rank(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) | Float(_) => 2,
                Text(_) => 3,
                Datetime(_) => 4,
            }
        }
        let ra = rank(self);
        let rb = rank(other);
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Integer(a), Float(b)) => (*a as f64)
                .total_cmp(b)
                .then(std::cmp::Ordering::Less),
            (Float(a), Integer(b)) => a
                .total_cmp(&(*b as f64))
                .then(std::cmp::Ordering::Greater),
            (Text(a), Text(b)) => a.cmp(b),
            (Datetime(a), Datetime(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Text(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Datetime(d) => d.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Datetime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Null
        } else {
            Value::Float(v)
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to interpret the value as a real number.  Text counts when it
    /// parses, so numeric codes loaded as strings still classify as numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Position on a continuous axis: numbers as-is, datetimes as epoch
    /// milliseconds. Used for range filters and line/scatter points.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Datetime(d) => Some(d.and_utc().timestamp_millis() as f64),
            other => other.as_f64(),
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Datetime(d) => Some(*d),
            _ => None,
        }
    }

    /// One spelling per number: integral values that fit exactly become
    /// `Integer`, the rest `Float`, and `-0.0` folds into `0`. `None` when
    /// the value is not a number.
    pub fn canonical_number(&self) -> Option<Value> {
        if let Value::Integer(i) = self {
            return Some(Value::Integer(*i));
        }
        let v = self.as_f64()?;
        if v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER {
            Some(Value::Integer(v as i64))
        } else {
            Some(Value::Float(v))
        }
    }
}

/// Largest magnitude below which every integral `f64` is exact.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

// ---------------------------------------------------------------------------
// ColumnKind – semantic type assigned by the classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Datetime,
    #[default]
    Unknown,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Datetime => "datetime",
            ColumnKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// One named column of a [`Dataset`]. The kind is only ever set by the
/// classifier, so a column handed out by a snapshot is always classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    name: String,
    values: Vec<Value>,
    kind: ColumnKind,
}

impl Column {
    pub(crate) fn raw(name: String, values: Vec<Value>) -> Self {
        Column {
            name,
            values,
            kind: ColumnKind::Unknown,
        }
    }

    /// Numeric columns are rewritten to canonical numbers so `1`, `1.0`
    /// and `"1"` are one value for counting, legends and filters.
    pub(crate) fn with_kind(mut self, kind: ColumnKind) -> Self {
        if kind == ColumnKind::Numeric {
            for v in &mut self.values {
                if let Some(n) = v.canonical_number() {
                    *v = n;
                }
            }
        }
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present values, in row order.
    pub fn present(&self) -> impl Iterator<Item = &Value> + '_ {
        self.values.iter().filter(|v| !v.is_absent())
    }

    /// The sorted set of observed (present) values.
    pub fn unique_values(&self) -> BTreeSet<Value> {
        self.present().cloned().collect()
    }

    /// Observed minimum and maximum on the scalar axis, if any value has one.
    pub fn scalar_bounds(&self) -> Option<(f64, f64)> {
        self.present()
            .filter_map(Value::as_scalar)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn profile(&self) -> ColumnProfile {
        let present = self.present().count();
        let (min, max) = match self.kind {
            ColumnKind::Numeric | ColumnKind::Datetime => {
                let mut scalars = self
                    .present()
                    .filter_map(|v| v.as_scalar().map(|s| (s, v)));
                match scalars.next() {
                    Some(first) => {
                        let (lo, hi) = scalars.fold((first, first), |(lo, hi), cur| {
                            (
                                if cur.0 < lo.0 { cur } else { lo },
                                if cur.0 > hi.0 { cur } else { hi },
                            )
                        });
                        (Some(lo.1.clone()), Some(hi.1.clone()))
                    }
                    None => (None, None),
                }
            }
            _ => (None, None),
        };
        let mut profile = ColumnProfile {
            name: self.name.clone(),
            kind: self.kind,
            present,
            absent: self.values.len() - present,
            distinct: self.unique_values().len(),
            min,
            max,
            ..ColumnProfile::default()
        };
        match self.kind {
            ColumnKind::Numeric => {
                let values = numeric_values(self);
                profile.mean = mean(&values);
                profile.std = sample_std(&values);
                if let Some(summary) = box_summary(&values) {
                    profile.q1 = Some(summary.q1);
                    profile.median = Some(summary.median);
                    profile.q3 = Some(summary.q3);
                }
            }
            ColumnKind::Categorical => {
                if let Some(top) = value_counts(self).into_iter().next() {
                    profile.top = Some(top.value);
                    profile.freq = Some(top.count);
                }
            }
            ColumnKind::Datetime | ColumnKind::Unknown => {}
        }
        profile
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `n - 1` in the denominator.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Summary of one column, for schema display. Numeric columns also carry
/// mean, spread and quartiles; categorical columns the most frequent value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub present: usize,
    pub absent: usize,
    pub distinct: usize,
    pub min: Option<Value>,
    pub max: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<usize>,
}

/// The first rows of a snapshot, row-major, for a quick look at the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

// ---------------------------------------------------------------------------
// Dataset – one immutable snapshot
// ---------------------------------------------------------------------------

/// An ordered set of equally long, uniquely named columns.
///
/// Snapshots are never mutated: filtering and coercion build a new
/// `Dataset`, so anyone still holding the old one is unaffected.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build and classify a dataset from named value vectors.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Column::raw(name.into(), values))
            .collect();
        let dataset = Self::from_raw(columns)?;
        Ok(super::schema::classify(&dataset))
    }

    /// Validate shape without classifying.
    pub(crate) fn from_raw(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let mut seen = BTreeSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(DatasetError::DuplicateColumn {
                    name: col.name.clone(),
                });
            }
        }
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(DatasetError::RaggedColumn {
                name: bad.name.clone(),
                expected: n_rows,
                found: bad.len(),
            });
        }
        Ok(Dataset { columns, n_rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.n_rows
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn columns_of(&self, kind: ColumnKind) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().filter(move |c| c.kind == kind)
    }

    pub fn numeric_count(&self) -> usize {
        self.columns_of(ColumnKind::Numeric).count()
    }

    pub fn profiles(&self) -> Vec<ColumnProfile> {
        self.columns.iter().map(Column::profile).collect()
    }

    /// Up to `n` leading rows.
    pub fn head(&self, n: usize) -> Preview {
        Preview {
            columns: self.column_names().map(str::to_string).collect(),
            rows: (0..n.min(self.n_rows))
                .map(|row| self.columns.iter().map(|c| c.values[row].clone()).collect())
                .collect(),
        }
    }

    /// Keep only the given rows (in the given order). The result is
    /// re-classified because narrowing can change a column's kind.
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = rows.iter().map(|&r| c.values[r].clone()).collect();
                Column::raw(c.name.clone(), values)
            })
            .collect();
        super::schema::classify(&Dataset {
            columns,
            n_rows: rows.len(),
        })
    }

    /// Swap one column's values, keeping its position. Caller re-classifies.
    pub(crate) fn with_column_values(&self, name: &str, values: Vec<Value>) -> Dataset {
        let mut replacement = Some(values);
        let columns = self
            .columns
            .iter()
            .map(|c| match replacement.take() {
                Some(values) if c.name == name => Column::raw(c.name.clone(), values),
                other => {
                    replacement = other;
                    c.clone()
                }
            })
            .collect();
        Dataset {
            columns,
            n_rows: self.n_rows,
        }
    }

    pub(crate) fn map_columns(&self, f: impl Fn(&Column) -> ColumnKind) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| c.clone().with_kind(f(c)))
                .collect(),
            n_rows: self.n_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::from_columns(vec![
            ("a", vec![Value::Integer(1)]),
            ("a", vec![Value::Integer(2)]),
        ])
        .unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateColumn { name } if name == "a"));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::from_columns(vec![
            ("a", vec![Value::Integer(1), Value::Integer(2)]),
            ("b", vec![Value::Integer(2)]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::RaggedColumn { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn value_ordering_is_total() {
        let mut set = BTreeSet::new();
        set.insert(Value::Float(2.0));
        set.insert(Value::Null);
        set.insert(Value::from("b"));
        set.insert(Value::Integer(3));
        set.insert(Value::from("a"));
        let ordered: Vec<String> = set.iter().map(|v| v.to_string()).collect();
        assert_eq!(ordered, vec!["<null>", "2", "3", "a", "b"]);
    }

    #[test]
    fn profile_counts_absent_values() {
        let ds = Dataset::from_columns(vec![(
            "age",
            vec![25.0.into(), 30.0.into(), 35.0.into(), Value::Null],
        )])
        .unwrap();
        let p = ds.column("age").unwrap().profile();
        assert_eq!(p.kind, ColumnKind::Numeric);
        assert_eq!((p.present, p.absent, p.distinct), (3, 1, 3));
        assert_eq!(p.min, Some(Value::Integer(25)));
        assert_eq!(p.max, Some(Value::Integer(35)));
    }

    #[test]
    fn numeric_spellings_collapse_to_one_value() {
        let ds = Dataset::from_columns(vec![(
            "n",
            vec![
                Value::Integer(1),
                Value::Float(1.0),
                Value::from("1"),
                Value::Float(-0.0),
                Value::Integer(0),
                Value::Float(2.5),
                Value::from("2.50"),
                Value::Null,
            ],
        )])
        .unwrap();
        let col = ds.column("n").unwrap();
        assert_eq!(col.kind(), ColumnKind::Numeric);
        let unique: Vec<Value> = col.unique_values().into_iter().collect();
        assert_eq!(
            unique,
            vec![Value::Integer(0), Value::Integer(1), Value::Float(2.5)]
        );
        assert!(col.values()[7].is_absent());
    }

    #[test]
    fn categorical_text_keeps_its_spelling() {
        let ds = Dataset::from_columns(vec![(
            "code",
            vec![Value::from("1"), Value::from("1.0"), Value::from("x")],
        )])
        .unwrap();
        assert_eq!(ds.column("code").unwrap().unique_values().len(), 3);
    }

    #[test]
    fn profile_describes_numeric_spread() {
        let ds = Dataset::from_columns(vec![(
            "score",
            vec![
                Value::Integer(2),
                Value::Integer(4),
                Value::Null,
                Value::Integer(4),
                Value::Integer(6),
            ],
        )])
        .unwrap();
        let p = ds.column("score").unwrap().profile();
        assert_eq!(p.mean, Some(4.0));
        let std = p.std.unwrap();
        assert!((std - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!((p.q1, p.median, p.q3), (Some(3.5), Some(4.0), Some(4.5)));
        assert_eq!((p.top, p.freq), (None, None));
    }

    #[test]
    fn profile_reports_most_frequent_label() {
        let ds = Dataset::from_columns(vec![(
            "city",
            vec![
                Value::from("LA"),
                Value::from("NY"),
                Value::from("NY"),
                Value::Null,
            ],
        )])
        .unwrap();
        let p = ds.column("city").unwrap().profile();
        assert_eq!(p.top, Some(Value::from("NY")));
        assert_eq!(p.freq, Some(2));
        assert_eq!(p.mean, None);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("mean").is_none());
        assert_eq!(json["top"], "NY");
    }

    #[test]
    fn head_takes_leading_rows() {
        let ds = Dataset::from_columns(vec![
            ("a", vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]),
            ("b", vec![Value::from("x"), Value::Null, Value::from("z")]),
        ])
        .unwrap();
        let preview = ds.head(2);
        assert_eq!(preview.columns, vec!["a", "b"]);
        assert_eq!(
            preview.rows,
            vec![
                vec![Value::Integer(1), Value::from("x")],
                vec![Value::Integer(2), Value::Null],
            ]
        );
        assert_eq!(ds.head(10).rows.len(), 3);
    }

    #[test]
    fn select_rows_reclassifies() {
        let ds = Dataset::from_columns(vec![(
            "code",
            vec![Value::from("1"), Value::from("2"), Value::from("x")],
        )])
        .unwrap();
        assert_eq!(ds.column("code").unwrap().kind(), ColumnKind::Categorical);
        let narrowed = ds.select_rows(&[0, 1]);
        assert_eq!(narrowed.column("code").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(narrowed.len(), 2);
    }
}
