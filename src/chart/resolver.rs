use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use super::aggregate::{self, ChartData};
use super::contract::{ChartKind, Constraint, Role, RoleSpec};
use super::request::ChartRequest;
use crate::color::ColorLegend;
use crate::config::EngineConfig;
use crate::data::model::{Column, ColumnKind, Dataset};
use crate::error::RejectionReason;

/// The column a role ended up bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// A chart the renderer can draw without further checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChart {
    pub kind: ChartKind,
    /// Exactly the roles this chart kind reads that were bound.
    pub bindings: BTreeMap<Role, BoundColumn>,
    pub data: ChartData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<ColorLegend>,
}

pub type Resolution = Result<ResolvedChart, RejectionReason>;

/// Resolve with the default limits.
pub fn resolve(dataset: &Dataset, request: &ChartRequest) -> Resolution {
    resolve_with(dataset, request, &EngineConfig::default())
}

/// Check `request` against the snapshot and, only if every check passes,
/// compute the chart data.
///
/// Order: empty snapshot, then each role of the contract (bound, existing,
/// right kind), then the contract's extra constraints. Bindings for roles
/// the chart kind does not read are ignored.
pub fn resolve_with(dataset: &Dataset, request: &ChartRequest, config: &EngineConfig) -> Resolution {
    if dataset.is_empty() {
        return Err(RejectionReason::EmptyDataset);
    }

    let chart = request.kind;
    let contract = chart.contract();

    let mut bound: BTreeMap<Role, &Column> = BTreeMap::new();
    for spec in contract.required {
        let name = request
            .binding(spec.role)
            .ok_or(RejectionReason::RoleUnbound {
                chart,
                role: spec.role,
            })?;
        bound.insert(spec.role, bind(dataset, chart, spec, name)?);
    }
    for spec in contract.optional {
        if let Some(name) = request.binding(spec.role) {
            bound.insert(spec.role, bind(dataset, chart, spec, name)?);
        }
    }
    for (role, column) in request.bindings() {
        if !contract.uses(*role) {
            debug!("{chart}: ignoring binding {role}={column}");
        }
    }

    for constraint in contract.constraints {
        check(dataset, chart, constraint, &bound, config)?;
    }

    let data = chart_data(dataset, chart, &bound)?;
    let legend = bound
        .get(&Role::Category)
        .map(|col| ColorLegend::new(col.name(), &col.unique_values()));

    Ok(ResolvedChart {
        kind: chart,
        bindings: bound
            .iter()
            .map(|(role, col)| {
                (
                    *role,
                    BoundColumn {
                        name: col.name().to_string(),
                        kind: col.kind(),
                    },
                )
            })
            .collect(),
        data,
        legend,
    })
}

fn bind<'a>(
    dataset: &'a Dataset,
    chart: ChartKind,
    spec: &RoleSpec,
    name: &str,
) -> Result<&'a Column, RejectionReason> {
    let column = dataset
        .column(name)
        .ok_or_else(|| RejectionReason::UnknownColumn {
            role: spec.role,
            column: name.to_string(),
        })?;
    if !spec.admits(column.kind()) {
        return Err(RejectionReason::RoleKindMismatch {
            chart,
            role: spec.role,
            column: name.to_string(),
            found: column.kind(),
            accepted: spec.accepts.to_vec(),
        });
    }
    Ok(column)
}

fn check(
    dataset: &Dataset,
    chart: ChartKind,
    constraint: &Constraint,
    bound: &BTreeMap<Role, &Column>,
    config: &EngineConfig,
) -> Result<(), RejectionReason> {
    match *constraint {
        Constraint::MinNumericColumns(required) => {
            let available = dataset.numeric_count();
            if available < required {
                return Err(RejectionReason::InsufficientNumericColumns {
                    chart,
                    required,
                    available,
                });
            }
        }
        Constraint::DistinctRoles(roles) => {
            let present: Vec<(Role, &str)> = roles
                .iter()
                .filter_map(|r| bound.get(r).map(|c| (*r, c.name())))
                .collect();
            for (i, (first, name)) in present.iter().enumerate() {
                if let Some((second, _)) = present[i + 1..].iter().find(|(_, n)| n == name) {
                    return Err(RejectionReason::AxesNotDistinct {
                        first: *first,
                        second: *second,
                        column: name.to_string(),
                    });
                }
            }
        }
        Constraint::MaxDistinct(role) => {
            if let Some(col) = bound.get(&role) {
                let distinct = col.unique_values().len();
                if distinct > config.max_pie_categories {
                    return Err(RejectionReason::TooManyCategories {
                        chart,
                        column: col.name().to_string(),
                        distinct,
                        limit: config.max_pie_categories,
                    });
                }
            }
        }
    }
    Ok(())
}

fn chart_data(
    dataset: &Dataset,
    chart: ChartKind,
    bound: &BTreeMap<Role, &Column>,
) -> Result<ChartData, RejectionReason> {
    let role = |r: Role| {
        bound
            .get(&r)
            .copied()
            .ok_or(RejectionReason::RoleUnbound { chart, role: r })
    };
    let data = match chart {
        ChartKind::Bar | ChartKind::Pie => ChartData::ValueCounts {
            counts: aggregate::value_counts(role(Role::Primary)?),
        },
        ChartKind::Histogram | ChartKind::Kde => ChartData::Values {
            values: aggregate::numeric_values(role(Role::Primary)?),
        },
        ChartKind::Box => {
            let values = aggregate::numeric_values(role(Role::Primary)?);
            ChartData::Box {
                summary: aggregate::box_summary(&values).ok_or(RejectionReason::EmptyDataset)?,
            }
        }
        ChartKind::Line => ChartData::Series {
            points: aggregate::series(role(Role::Primary)?, bound.get(&Role::X).copied()),
        },
        ChartKind::Scatter => ChartData::Points {
            points: aggregate::points(
                role(Role::X)?,
                role(Role::Y)?,
                None,
                bound.get(&Role::Category).copied(),
            ),
        },
        ChartKind::Scatter3d => ChartData::Points {
            points: aggregate::points(
                role(Role::X)?,
                role(Role::Y)?,
                Some(role(Role::Z)?),
                bound.get(&Role::Category).copied(),
            ),
        },
        ChartKind::Heatmap => ChartData::Correlation {
            matrix: aggregate::correlation_matrix(&aggregate::numeric_columns(dataset)),
        },
        ChartKind::Violin => ChartData::Groups {
            groups: aggregate::groups(role(Role::Category)?, role(Role::Primary)?),
        },
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Value;

    fn people() -> Dataset {
        Dataset::from_columns(vec![
            ("age", vec![25.0.into(), 30.0.into(), 35.0.into(), Value::Null]),
            ("city", vec!["NY".into(), "NY".into(), "LA".into(), Value::Null]),
            ("income", vec![10.0.into(), 20.0.into(), 25.0.into(), 40.0.into()]),
        ])
        .unwrap()
    }

    #[test]
    fn histogram_of_text_column_is_a_kind_mismatch() {
        let out = resolve(&people(), &ChartRequest::new(ChartKind::Histogram).bind(Role::Primary, "city"));
        assert!(matches!(
            out,
            Err(RejectionReason::RoleKindMismatch {
                role: Role::Primary,
                found: ColumnKind::Categorical,
                ..
            })
        ));
    }

    #[test]
    fn histogram_excludes_absent_values() {
        let out = resolve(&people(), &ChartRequest::new(ChartKind::Histogram).bind(Role::Primary, "age"))
            .unwrap();
        assert_eq!(out.kind, ChartKind::Histogram);
        assert_eq!(out.bindings[&Role::Primary].name, "age");
        assert_eq!(out.data, ChartData::Values { values: vec![25.0, 30.0, 35.0] });
        assert!(out.legend.is_none());
    }

    #[test]
    fn unbound_and_unknown_roles() {
        let ds = people();
        assert_eq!(
            resolve(&ds, &ChartRequest::new(ChartKind::Scatter).bind(Role::X, "age")),
            Err(RejectionReason::RoleUnbound {
                chart: ChartKind::Scatter,
                role: Role::Y
            })
        );
        assert_eq!(
            resolve(&ds, &ChartRequest::new(ChartKind::Box).bind(Role::Primary, "height")),
            Err(RejectionReason::UnknownColumn {
                role: Role::Primary,
                column: "height".into()
            })
        );
    }

    #[test]
    fn scatter_axes_must_differ() {
        let request = ChartRequest::new(ChartKind::Scatter)
            .bind(Role::X, "age")
            .bind(Role::Y, "age");
        assert_eq!(
            resolve(&people(), &request),
            Err(RejectionReason::AxesNotDistinct {
                first: Role::X,
                second: Role::Y,
                column: "age".into()
            })
        );
    }

    #[test]
    fn scatter_with_category_gets_legend() {
        let request = ChartRequest::new(ChartKind::Scatter)
            .bind(Role::X, "age")
            .bind(Role::Y, "income")
            .bind(Role::Category, "city");
        let out = resolve(&people(), &request).unwrap();
        let ChartData::Points { points } = &out.data else {
            panic!("expected points, got {:?}", out.data);
        };
        assert_eq!(points.len(), 3);
        assert_eq!(out.legend.as_ref().map(ColorLegend::len), Some(2));
        assert_eq!(out.bindings.len(), 3);
    }

    #[test]
    fn stale_bindings_are_ignored() {
        let request = ChartRequest::new(ChartKind::Pie)
            .bind(Role::Primary, "city")
            .bind(Role::Z, "no-such-column")
            .bind(Role::Group, "age");
        let out = resolve(&people(), &request).unwrap();
        assert_eq!(out.bindings.keys().copied().collect::<Vec<_>>(), vec![Role::Primary]);
    }

    #[test]
    fn scatter3d_needs_three_numeric_columns() {
        let request = ChartRequest::new(ChartKind::Scatter3d)
            .bind(Role::X, "age")
            .bind(Role::Y, "income")
            .bind(Role::Z, "age");
        assert_eq!(
            resolve(&people(), &request),
            Err(RejectionReason::InsufficientNumericColumns {
                chart: ChartKind::Scatter3d,
                required: 3,
                available: 2
            })
        );
    }

    #[test]
    fn heatmap_correlates_numeric_columns() {
        let out = resolve(&people(), &ChartRequest::new(ChartKind::Heatmap)).unwrap();
        let ChartData::Correlation { matrix } = out.data else {
            panic!("expected a correlation matrix");
        };
        assert_eq!(matrix.columns, vec!["age", "income"]);
        assert!(out.bindings.is_empty());
    }

    #[test]
    fn pie_limit_comes_from_config() {
        let config = EngineConfig {
            max_pie_categories: 1,
            ..Default::default()
        };
        let request = ChartRequest::new(ChartKind::Pie).bind(Role::Primary, "city");
        assert_eq!(
            resolve_with(&people(), &request, &config),
            Err(RejectionReason::TooManyCategories {
                chart: ChartKind::Pie,
                column: "city".into(),
                distinct: 2,
                limit: 1
            })
        );
    }

    #[test]
    fn violin_groups_by_category() {
        let request = ChartRequest::new(ChartKind::Violin)
            .bind(Role::Category, "city")
            .bind(Role::Primary, "income");
        let out = resolve(&people(), &request).unwrap();
        let ChartData::Groups { groups } = out.data else {
            panic!("expected groups");
        };
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["LA", "NY"]);
    }

    #[test]
    fn line_rejects_non_datetime_x() {
        let request = ChartRequest::new(ChartKind::Line)
            .bind(Role::Primary, "income")
            .bind(Role::X, "age");
        assert!(matches!(
            resolve(&people(), &request),
            Err(RejectionReason::RoleKindMismatch { role: Role::X, .. })
        ));
    }
}
