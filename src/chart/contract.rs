use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::data::model::ColumnKind;

// ---------------------------------------------------------------------------
// Chart kinds and roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Histogram,
    Pie,
    Box,
    Line,
    Scatter,
    Scatter3d,
    Heatmap,
    Violin,
    Kde,
}

impl ChartKind {
    pub const ALL: [ChartKind; 10] = [
        ChartKind::Bar,
        ChartKind::Histogram,
        ChartKind::Pie,
        ChartKind::Box,
        ChartKind::Line,
        ChartKind::Scatter,
        ChartKind::Scatter3d,
        ChartKind::Heatmap,
        ChartKind::Violin,
        ChartKind::Kde,
    ];

    pub fn contract(self) -> &'static RoleContract {
        match self {
            ChartKind::Bar => &BAR,
            ChartKind::Histogram => &HISTOGRAM,
            ChartKind::Pie => &PIE,
            ChartKind::Box => &BOX,
            ChartKind::Line => &LINE,
            ChartKind::Scatter => &SCATTER,
            ChartKind::Scatter3d => &SCATTER_3D,
            ChartKind::Heatmap => &HEATMAP,
            ChartKind::Violin => &VIOLIN,
            ChartKind::Kde => &KDE,
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChartKind::Bar => "Bar chart",
            ChartKind::Histogram => "Histogram",
            ChartKind::Pie => "Pie chart",
            ChartKind::Box => "Box plot",
            ChartKind::Line => "Line chart",
            ChartKind::Scatter => "Scatter plot",
            ChartKind::Scatter3d => "3D scatter plot",
            ChartKind::Heatmap => "Heatmap",
            ChartKind::Violin => "Violin plot",
            ChartKind::Kde => "KDE plot",
        };
        f.write_str(s)
    }
}

/// Accepts short names ("kde", "scatter3d") as well as the menu labels
/// ("Box Plot", "Scatter Plot"), case-insensitively.
impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let key = key
            .strip_suffix("chart")
            .or_else(|| key.strip_suffix("plot"))
            .unwrap_or(&key);
        match key {
            "bar" => Ok(ChartKind::Bar),
            "histogram" | "hist" => Ok(ChartKind::Histogram),
            "pie" => Ok(ChartKind::Pie),
            "box" => Ok(ChartKind::Box),
            "line" => Ok(ChartKind::Line),
            "scatter" => Ok(ChartKind::Scatter),
            "scatter3d" | "3dscatter" => Ok(ChartKind::Scatter3d),
            "heatmap" | "correlation" => Ok(ChartKind::Heatmap),
            "violin" => Ok(ChartKind::Violin),
            "kde" | "density" => Ok(ChartKind::Kde),
            _ => Err(format!("unknown chart kind '{s}'")),
        }
    }
}

/// A named slot a chart kind fills with a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    X,
    Y,
    Z,
    Category,
    Group,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Primary,
        Role::X,
        Role::Y,
        Role::Z,
        Role::Category,
        Role::Group,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::X => "x",
            Role::Y => "y",
            Role::Z => "z",
            Role::Category => "category",
            Role::Group => "group",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Role contracts
// ---------------------------------------------------------------------------

/// Accepted column kinds for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSpec {
    pub role: Role,
    pub accepts: &'static [ColumnKind],
}

impl RoleSpec {
    pub fn admits(&self, kind: ColumnKind) -> bool {
        self.accepts.contains(&kind)
    }
}

/// Checks that go beyond per-role kinds, evaluated in listed order after
/// every role binding has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// The dataset must hold at least this many numeric columns.
    MinNumericColumns(usize),
    /// These roles, when bound, must name different columns.
    DistinctRoles(&'static [Role]),
    /// The role's column may have at most the configured number of
    /// distinct values.
    MaxDistinct(Role),
}

/// Static rule set defining when a chart kind is satisfiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleContract {
    pub required: &'static [RoleSpec],
    pub optional: &'static [RoleSpec],
    pub constraints: &'static [Constraint],
}

impl RoleContract {
    /// Every role this chart kind reads, required first.
    pub fn roles(&self) -> impl Iterator<Item = &RoleSpec> + '_ {
        self.required.iter().chain(self.optional)
    }

    pub fn uses(&self, role: Role) -> bool {
        self.roles().any(|s| s.role == role)
    }
}

const NUMERIC: &[ColumnKind] = &[ColumnKind::Numeric];
const DISCRETE: &[ColumnKind] = &[ColumnKind::Categorical, ColumnKind::Numeric];
const CATEGORICAL: &[ColumnKind] = &[ColumnKind::Categorical];
const DATETIME: &[ColumnKind] = &[ColumnKind::Datetime];
const ANY: &[ColumnKind] = &[
    ColumnKind::Categorical,
    ColumnKind::Numeric,
    ColumnKind::Datetime,
    ColumnKind::Unknown,
];

const fn spec(role: Role, accepts: &'static [ColumnKind]) -> RoleSpec {
    RoleSpec { role, accepts }
}

// Bar charts need a non-empty count table; `DISCRETE` excludes all-absent
// columns, so a bound primary always has one.
static BAR: RoleContract = RoleContract {
    required: &[spec(Role::Primary, DISCRETE)],
    optional: &[],
    constraints: &[],
};

static PIE: RoleContract = RoleContract {
    required: &[spec(Role::Primary, DISCRETE)],
    optional: &[],
    constraints: &[Constraint::MaxDistinct(Role::Primary)],
};

static HISTOGRAM: RoleContract = RoleContract {
    required: &[spec(Role::Primary, NUMERIC)],
    optional: &[],
    constraints: &[],
};

static BOX: RoleContract = RoleContract {
    required: &[spec(Role::Primary, NUMERIC)],
    optional: &[],
    constraints: &[],
};

static KDE: RoleContract = RoleContract {
    required: &[spec(Role::Primary, NUMERIC)],
    optional: &[],
    constraints: &[],
};

static LINE: RoleContract = RoleContract {
    required: &[spec(Role::Primary, NUMERIC)],
    optional: &[spec(Role::X, DATETIME)],
    constraints: &[],
};

static SCATTER: RoleContract = RoleContract {
    required: &[spec(Role::X, NUMERIC), spec(Role::Y, NUMERIC)],
    optional: &[spec(Role::Category, ANY)],
    constraints: &[Constraint::DistinctRoles(&[Role::X, Role::Y])],
};

// The numeric-column count is checked before distinctness: with fewer than
// three numeric columns no distinct binding exists, and that is the more
// useful message.
static SCATTER_3D: RoleContract = RoleContract {
    required: &[
        spec(Role::X, NUMERIC),
        spec(Role::Y, NUMERIC),
        spec(Role::Z, NUMERIC),
    ],
    optional: &[spec(Role::Category, ANY)],
    constraints: &[
        Constraint::MinNumericColumns(3),
        Constraint::DistinctRoles(&[Role::X, Role::Y, Role::Z]),
    ],
};

static HEATMAP: RoleContract = RoleContract {
    required: &[],
    optional: &[],
    constraints: &[Constraint::MinNumericColumns(2)],
};

// A bound categorical and a bound numeric column already imply both kinds
// exist in the dataset.
static VIOLIN: RoleContract = RoleContract {
    required: &[
        spec(Role::Category, CATEGORICAL),
        spec(Role::Primary, NUMERIC),
    ],
    optional: &[],
    constraints: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_menu_labels() {
        assert_eq!("Bar Chart".parse::<ChartKind>(), Ok(ChartKind::Bar));
        assert_eq!("KDE Plot".parse::<ChartKind>(), Ok(ChartKind::Kde));
        assert_eq!("scatter-3d".parse::<ChartKind>(), Ok(ChartKind::Scatter3d));
        assert_eq!("heatmap".parse::<ChartKind>(), Ok(ChartKind::Heatmap));
        assert!("sunburst".parse::<ChartKind>().is_err());
    }

    #[test]
    fn parses_roles() {
        assert_eq!("X".parse::<Role>(), Ok(Role::X));
        assert_eq!(" category ".parse::<Role>(), Ok(Role::Category));
        assert!("colour".parse::<Role>().is_err());
    }

    #[test]
    fn no_chart_requires_the_group_role() {
        for kind in ChartKind::ALL {
            assert!(!kind.contract().uses(Role::Group), "{kind}");
        }
    }

    #[test]
    fn every_contract_lists_a_role_once() {
        for kind in ChartKind::ALL {
            let roles: Vec<Role> = kind.contract().roles().map(|s| s.role).collect();
            let mut dedup = roles.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(roles.len(), dedup.len(), "{kind}");
        }
    }
}
