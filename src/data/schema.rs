use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;

use super::model::{Column, ColumnKind, Dataset, Value};
use crate::error::CoercionError;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Assign a semantic kind to every column. Pure function of the values;
/// numeric columns come back holding canonical numbers.
pub fn classify(dataset: &Dataset) -> Dataset {
    dataset.map_columns(kind_of)
}

/// Rules, first match wins:
/// * no present value → `Unknown`
/// * every present value is a datetime → `Datetime` (only after coercion)
/// * every present value reads as a real number → `Numeric`
/// * anything else → `Categorical`
pub fn kind_of(column: &Column) -> ColumnKind {
    let mut present = column.present().peekable();
    if present.peek().is_none() {
        return ColumnKind::Unknown;
    }
    if column.present().all(|v| matches!(v, Value::Datetime(_))) {
        return ColumnKind::Datetime;
    }
    if column.present().all(|v| v.as_f64().is_some()) {
        return ColumnKind::Numeric;
    }
    ColumnKind::Categorical
}

// ---------------------------------------------------------------------------
// Time-axis coercion
// ---------------------------------------------------------------------------

/// Parse `column` as datetimes and return a new, re-classified snapshot.
///
/// This is the only way a column becomes `Datetime`. Any present value that
/// matches none of `formats` (after RFC 3339) fails the whole coercion.
pub fn coerce_datetime(
    dataset: &Dataset,
    column: &str,
    formats: &[String],
) -> Result<Dataset, CoercionError> {
    let col = dataset
        .column(column)
        .ok_or_else(|| CoercionError::UnknownColumn {
            column: column.to_string(),
        })?;
    if col.kind() == ColumnKind::Datetime {
        return Ok(dataset.clone());
    }

    let values = col
        .values()
        .iter()
        .enumerate()
        .map(|(row, v)| match v {
            Value::Null => Ok(Value::Null),
            Value::Datetime(d) => Ok(Value::Datetime(*d)),
            other => {
                let text = other.to_string();
                parse_datetime(&text, formats)
                    .map(Value::Datetime)
                    .ok_or_else(|| CoercionError::Unparseable {
                        column: column.to_string(),
                        row,
                        value: text,
                    })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("coerced column '{column}' to datetime");
    Ok(classify(&dataset.with_column_values(column, values)))
}

/// RFC 3339 first (normalised to UTC), then each pattern as a datetime and
/// as a bare date at midnight.
pub fn parse_datetime(text: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(text, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(text, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn formats() -> Vec<String> {
        EngineConfig::default().datetime_formats
    }

    #[test]
    fn classification_rules() {
        let ds = Dataset::from_columns(vec![
            ("empty", vec![Value::Null, Value::Null]),
            ("num", vec![Value::Integer(1), Value::from("2.5")]),
            ("text", vec![Value::from("a"), Value::Integer(1)]),
            ("flags", vec![Value::Bool(true), Value::Bool(false)]),
        ])
        .unwrap();
        let kinds: Vec<ColumnKind> = ds.columns().iter().map(Column::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Unknown,
                ColumnKind::Numeric,
                ColumnKind::Categorical,
                ColumnKind::Categorical,
            ]
        );
    }

    #[test]
    fn date_looking_text_stays_categorical() {
        let ds = Dataset::from_columns(vec![("day", vec![Value::from("2024-01-02")])]).unwrap();
        assert_eq!(ds.column("day").unwrap().kind(), ColumnKind::Categorical);
    }

    #[test]
    fn coercion_makes_datetime_and_keeps_nulls() {
        let ds = Dataset::from_columns(vec![(
            "day",
            vec![
                Value::from("2024-01-02"),
                Value::Null,
                Value::from("2024-01-03T10:00:00Z"),
            ],
        )])
        .unwrap();
        let coerced = coerce_datetime(&ds, "day", &formats()).unwrap();
        let col = coerced.column("day").unwrap();
        assert_eq!(col.kind(), ColumnKind::Datetime);
        assert!(col.values()[1].is_absent());
        assert_eq!(col.values()[0].to_string(), "2024-01-02 00:00:00");
        // the input snapshot is untouched
        assert_eq!(ds.column("day").unwrap().kind(), ColumnKind::Categorical);
    }

    #[test]
    fn coercion_reports_first_bad_value() {
        let ds = Dataset::from_columns(vec![(
            "day",
            vec![Value::from("2024-01-02"), Value::from("soon")],
        )])
        .unwrap();
        let err = coerce_datetime(&ds, "day", &formats()).unwrap_err();
        assert_eq!(
            err,
            CoercionError::Unparseable {
                column: "day".into(),
                row: 1,
                value: "soon".into()
            }
        );
    }

    #[test]
    fn coercion_of_missing_column() {
        let ds = Dataset::from_columns(vec![("a", vec![Value::Integer(1)])]).unwrap();
        assert!(matches!(
            coerce_datetime(&ds, "b", &formats()),
            Err(CoercionError::UnknownColumn { .. })
        ));
    }
}
