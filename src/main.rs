mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use chartwise::chart::ResolvedChart;
use chartwise::config::EngineConfig;
use chartwise::data::filter::{parse_clause, FilterSpec};
use chartwise::data::model::{ColumnProfile, Preview};
use chartwise::error::RejectionReason;
use chartwise::state::Session;

use cli::Args;

#[derive(Serialize)]
struct Report<'a> {
    snapshot: u64,
    rows: usize,
    filters: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<ColumnProfile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<Preview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Outcome>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Chart(ResolvedChart),
    Rejected {
        message: String,
        #[serde(flatten)]
        reason: RejectionReason,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;

    let mut session = Session::new(config);
    session
        .load_file(&args.file)
        .with_context(|| format!("loading {}", args.file.display()))?;

    if let Some(column) = &args.time_axis {
        session.designate_time_axis(column)?;
    }

    if !args.filters.is_empty() {
        let base = session.base().cloned().context("no dataset loaded")?;
        let mut spec = FilterSpec::new();
        for clause in &args.filters {
            let entry = parse_clause(&base, clause, &session.config().datetime_formats)?;
            spec.set(entry.column, entry.predicate);
        }
        session.set_filters(spec)?;
    }

    let view = session.view().cloned().context("no dataset loaded")?;
    let result = args.chart_request().map(|request| {
        info!("resolving {}", request.kind);
        match session.resolve(&request) {
            Ok(chart) => Outcome::Chart(chart),
            Err(reason) => Outcome::Rejected {
                message: reason.to_string(),
                reason,
            },
        }
    });

    let report = Report {
        snapshot: session.snapshot(),
        rows: view.len(),
        filters: session.audit(),
        columns: args.schema.then(|| view.profiles()),
        preview: args.preview.map(|n| view.head(n)),
        result,
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
