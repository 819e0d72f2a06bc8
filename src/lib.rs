//! Tabular dataset engine: column classification, filtering with an audit
//! trail, and chart eligibility resolution against per-chart role contracts.

pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use chart::{ChartKind, ChartRequest, ChartRequestBuilder, Resolution, ResolvedChart, Role};
pub use config::EngineConfig;
pub use data::filter::{FilterSpec, Predicate};
pub use data::model::{ColumnKind, Dataset, Value};
pub use error::RejectionReason;
pub use state::Session;
