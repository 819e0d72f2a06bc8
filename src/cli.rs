use std::path::PathBuf;

use clap::Parser;

use chartwise::chart::{ChartKind, ChartRequest, Role};

#[derive(Parser, Debug)]
#[command(
    name = "chartwise",
    version,
    about = "Classify a tabular file, filter it, and check which chart it can feed"
)]
pub struct Args {
    /// Input file (.csv, .json records, .parquet).
    pub file: PathBuf,

    #[arg(long, help = "Chart kind, e.g. bar, histogram, pie, scatter3d, heatmap")]
    pub chart: Option<ChartKind>,

    #[arg(long)]
    pub primary: Option<String>,
    #[arg(long)]
    pub x: Option<String>,
    #[arg(long)]
    pub y: Option<String>,
    #[arg(long)]
    pub z: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub group: Option<String>,

    #[arg(
        long = "filter",
        value_name = "CLAUSE",
        help = "Column filter, repeatable: col=a,b or col=lo..hi (either side optional)"
    )]
    pub filters: Vec<String>,

    #[arg(long = "time-axis", value_name = "COLUMN", help = "Read this column as datetimes")]
    pub time_axis: Option<String>,

    #[arg(long, value_name = "FILE", help = "Engine configuration (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Include column kinds and profiles")]
    pub schema: bool,

    #[arg(long, value_name = "N", help = "Include the first N rows of the filtered data")]
    pub preview: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

impl Args {
    /// The chart request described by the role flags, if a chart was asked for.
    pub fn chart_request(&self) -> Option<ChartRequest> {
        let kind = self.chart?;
        let roles = [
            (Role::Primary, &self.primary),
            (Role::X, &self.x),
            (Role::Y, &self.y),
            (Role::Z, &self.z),
            (Role::Category, &self.category),
            (Role::Group, &self.group),
        ];
        Some(
            roles
                .into_iter()
                .filter_map(|(role, col)| col.as_deref().map(|c| (role, c.trim())))
                .filter(|(_, col)| !col.is_empty())
                .fold(ChartRequest::new(kind), |req, (role, col)| req.bind(role, col)),
        )
    }
}
