//! Property checks over randomly shaped datasets.

use proptest::prelude::*;

use chartwise::chart::{resolve, ChartKind, ChartRequest, Role};
use chartwise::data::filter::{apply, FilterSpec, Predicate};
use chartwise::data::model::{ColumnKind, Dataset, Value};
use chartwise::data::schema::classify;

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (-1_000i64..1_000).prop_map(Value::Integer),
        3 => (-1e6f64..1e6).prop_map(Value::Float),
        3 => prop::sample::select(vec!["red", "green", "blue", "42"]).prop_map(Value::from),
        1 => Just(Value::Null),
    ]
}

/// Columns are either numeric-only, text-only, or mixed, so every kind shows up.
fn column(rows: usize) -> impl Strategy<Value = Vec<Value>> {
    prop_oneof![
        prop::collection::vec(
            prop_oneof![(-100i64..100).prop_map(Value::Integer), Just(Value::Null)],
            rows
        ),
        prop::collection::vec(
            prop_oneof![
                prop::sample::select(vec!["a", "b", "c"]).prop_map(Value::from),
                Just(Value::Null)
            ],
            rows
        ),
        prop::collection::vec(cell(), rows),
    ]
}

fn dataset() -> impl Strategy<Value = Dataset> {
    (0usize..25, 1usize..5)
        .prop_flat_map(|(rows, cols)| prop::collection::vec(column(rows), cols))
        .prop_map(|cols| {
            Dataset::from_columns(
                cols.into_iter()
                    .enumerate()
                    .map(|(i, values)| (format!("c{i}"), values)),
            )
            .unwrap()
        })
}

/// A filter on `column` derived from the snapshot: a subset of the observed
/// values for categorical columns, a lower bound for numeric ones.
fn predicate_for(ds: &Dataset, column: &str, keep: usize, low: f64) -> Option<Predicate> {
    let col = ds.column(column)?;
    match col.kind() {
        ColumnKind::Categorical => Some(Predicate::one_of(
            col.unique_values().into_iter().take(keep),
        )),
        ColumnKind::Numeric => Some(Predicate::range(Some(Value::Float(low)), None)),
        _ => None,
    }
}

proptest! {
    #[test]
    fn classification_is_idempotent(ds in dataset()) {
        let once = classify(&ds);
        prop_assert_eq!(&once, &ds);
        prop_assert_eq!(classify(&once), once);
    }

    #[test]
    fn empty_filter_spec_is_a_noop(ds in dataset()) {
        let out = apply(&ds, &FilterSpec::new()).unwrap();
        prop_assert_eq!(out.dataset, ds);
        prop_assert!(out.audit.is_empty());
    }

    #[test]
    fn adding_a_filter_never_adds_rows(
        ds in dataset(),
        picks in prop::collection::vec((0usize..5, 0usize..4, -150.0f64..150.0), 1..4),
    ) {
        let mut spec = FilterSpec::new();
        let mut previous = ds.len();
        for (col_idx, keep, low) in picks {
            let name = format!("c{}", col_idx % ds.columns().len());
            if spec.get(&name).is_some() {
                continue;
            }
            let Some(predicate) = predicate_for(&ds, &name, keep, low) else {
                continue;
            };
            spec.set(name, predicate);
            let out = apply(&ds, &spec).unwrap();
            prop_assert!(out.dataset.len() <= previous);
            prop_assert!(out.audit.len() <= spec.len());
            prop_assert_eq!(out.dataset.columns().len(), ds.columns().len());
            previous = out.dataset.len();
        }
    }

    #[test]
    fn tightening_a_filter_is_monotonic(ds in dataset(), keep in 0usize..4) {
        let Some(col) = ds.columns().iter().find(|c| c.kind() == ColumnKind::Categorical) else {
            return Ok(());
        };
        let name = col.name().to_string();
        let wide = FilterSpec::new().with(
            name.clone(),
            Predicate::one_of(col.unique_values().into_iter().take(keep + 1)),
        );
        let narrow = FilterSpec::new().with(
            name,
            Predicate::one_of(col.unique_values().into_iter().take(keep)),
        );
        let wide_rows = apply(&ds, &wide).unwrap().dataset.len();
        let narrow_rows = apply(&ds, &narrow).unwrap().dataset.len();
        prop_assert!(narrow_rows <= wide_rows);
    }

    #[test]
    fn resolution_is_deterministic(
        ds in dataset(),
        kind in prop::sample::select(ChartKind::ALL.to_vec()),
        picks in prop::collection::vec(0usize..5, Role::ALL.len()),
    ) {
        let names: Vec<String> = ds.column_names().map(str::to_string).collect();
        let request = Role::ALL
            .into_iter()
            .zip(picks)
            .fold(ChartRequest::new(kind), |req, (role, pick)| {
                req.bind(role, names[pick % names.len()].clone())
            });
        prop_assert_eq!(resolve(&ds, &request), resolve(&ds, &request));
    }

    #[test]
    fn resolved_bindings_respect_role_contracts(
        ds in dataset(),
        kind in prop::sample::select(ChartKind::ALL.to_vec()),
        picks in prop::collection::vec(0usize..5, Role::ALL.len()),
    ) {
        let names: Vec<String> = ds.column_names().map(str::to_string).collect();
        let request = Role::ALL
            .into_iter()
            .zip(picks)
            .fold(ChartRequest::new(kind), |req, (role, pick)| {
                req.bind(role, names[pick % names.len()].clone())
            });
        if let Ok(chart) = resolve(&ds, &request) {
            let contract = kind.contract();
            for spec in contract.required {
                let bound = &chart.bindings[&spec.role];
                prop_assert!(spec.admits(bound.kind));
                prop_assert_eq!(ds.column(&bound.name).map(|c| c.kind()), Some(bound.kind));
            }
            for spec in contract.optional {
                if let Some(bound) = chart.bindings.get(&spec.role) {
                    prop_assert!(spec.admits(bound.kind));
                }
            }
            prop_assert!(!ds.is_empty());
        }
    }
}
