use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::chart::request::ChartRequest;
use crate::chart::resolver::{resolve_with, Resolution};
use crate::config::EngineConfig;
use crate::data::filter::{apply, FilterSpec};
use crate::data::loader::{load_dataset, load_file, FormatHint};
use crate::data::model::{Dataset, Value};
use crate::data::schema::coerce_datetime;
use crate::error::{CoercionError, FilterError, ParseError};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything one user session holds between interactions, independent of
/// rendering.
///
/// `base` is the dataset as loaded (plus any time-axis coercion); `view` is
/// `base` with the current filters applied. Both are immutable snapshots:
/// a change always builds a new one and bumps `snapshot`.
#[derive(Debug, Default)]
pub struct Session {
    base: Option<Arc<Dataset>>,
    view: Option<Arc<Dataset>>,
    filters: FilterSpec,
    audit: Vec<String>,
    snapshot: u64,
    config: EngineConfig,

    /// Status / error message for the host to show.
    pub status_message: Option<String>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loaded dataset before filtering.
    pub fn base(&self) -> Option<&Arc<Dataset>> {
        self.base.as_ref()
    }

    /// Current filtered snapshot (the one charts are resolved against).
    pub fn view(&self) -> Option<&Arc<Dataset>> {
        self.view.as_ref()
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    /// Human-readable descriptions of the filters that narrowed the view.
    pub fn audit(&self) -> &[String] {
        &self.audit
    }

    /// Incremented every time a new snapshot replaces the view.
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    // -- Loading --

    /// Parse uploaded bytes. On failure the previous dataset stays loaded.
    pub fn load_bytes(&mut self, bytes: &[u8], hint: FormatHint) -> Result<(), ParseError> {
        let result = load_dataset(bytes, hint, &self.config);
        self.ingest(result)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), ParseError> {
        let result = load_file(path, &self.config);
        self.ingest(result)
    }

    fn ingest(&mut self, result: Result<Dataset, ParseError>) -> Result<(), ParseError> {
        match result {
            Ok(dataset) => {
                self.set_dataset(dataset);
                Ok(())
            }
            Err(e) => {
                warn!("load failed: {e}");
                self.status_message = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Replace the dataset and reset all filters.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        info!(
            "session dataset: {} rows × {} columns",
            dataset.len(),
            dataset.columns().len()
        );
        let dataset = Arc::new(dataset);
        self.base = Some(Arc::clone(&dataset));
        self.view = Some(dataset);
        self.filters = FilterSpec::new();
        self.audit.clear();
        self.status_message = None;
        self.bump();
    }

    // -- Filtering --

    /// Replace the whole filter set. Invalid filters leave the session as it was.
    pub fn set_filters(&mut self, filters: FilterSpec) -> Result<(), FilterError> {
        let previous = std::mem::replace(&mut self.filters, filters);
        if let Err(e) = self.refilter() {
            self.filters = previous;
            self.status_message = Some(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_value(&mut self, column: &str, value: &Value) -> Result<(), FilterError> {
        self.edit_filters(|filters, base| filters.toggle_value(base, column, value))
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) -> Result<(), FilterError> {
        self.edit_filters(|filters, base| filters.select_all(base, column))
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) -> Result<(), FilterError> {
        self.edit_filters(|filters, _| {
            filters.select_none(column);
            Ok(())
        })
    }

    fn edit_filters(
        &mut self,
        edit: impl FnOnce(&mut FilterSpec, &Dataset) -> Result<(), FilterError>,
    ) -> Result<(), FilterError> {
        let Some(base) = self.base.clone() else {
            return Ok(());
        };
        let mut filters = self.filters.clone();
        edit(&mut filters, &base)?;
        self.set_filters(filters)
    }

    /// Recompute the view from `base` and the current filters.
    fn refilter(&mut self) -> Result<(), FilterError> {
        let Some(base) = &self.base else {
            return Ok(());
        };
        let filtered = apply(base, &self.filters)?;
        self.view = Some(Arc::new(filtered.dataset));
        self.audit = filtered.audit;
        self.bump();
        Ok(())
    }

    // -- Time axis --

    /// Convert `column` of the loaded dataset to datetime values and
    /// re-apply the current filters on top of it.
    pub fn designate_time_axis(&mut self, column: &str) -> Result<(), CoercionError> {
        let Some(base) = &self.base else {
            return Err(CoercionError::UnknownColumn {
                column: column.to_string(),
            });
        };
        let coerced = coerce_datetime(base, column, &self.config.datetime_formats)?;
        self.base = Some(Arc::new(coerced));
        if let Err(e) = self.refilter() {
            // Filters written against the old column no longer fit; drop them.
            warn!("clearing filters after time-axis change: {e}");
            self.filters = FilterSpec::new();
            self.view = self.base.clone();
            self.audit.clear();
            self.bump();
        }
        info!("column '{column}' designated as time axis");
        Ok(())
    }

    // -- Charts --

    /// Resolve a chart request against the current view. Without a loaded
    /// dataset this is the same as resolving against an empty one.
    pub fn resolve(&self, request: &ChartRequest) -> Resolution {
        match &self.view {
            Some(view) => resolve_with(view, request, &self.config),
            None => resolve_with(&Dataset::default(), request, &self.config),
        }
    }

    fn bump(&mut self) {
        self.snapshot += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::contract::{ChartKind, Role};
    use crate::data::filter::Predicate;
    use crate::data::model::ColumnKind;
    use crate::error::RejectionReason;

    const CSV: &str = "city,age,joined\nNY,25,2024-01-05\nNY,30,2024-02-01\nLA,35,2024-03-10\n";

    fn loaded() -> Session {
        let mut session = Session::default();
        session.load_bytes(CSV.as_bytes(), FormatHint::Csv).unwrap();
        session
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let mut session = loaded();
        let before = session.snapshot();
        assert!(session.load_bytes(b"not json", FormatHint::Json).is_err());
        assert_eq!(session.snapshot(), before);
        assert_eq!(session.view().unwrap().len(), 3);
        assert!(session.status_message.is_some());
    }

    #[test]
    fn filter_changes_bump_snapshot_and_audit() {
        let mut session = loaded();
        let before = session.snapshot();
        session.toggle_value("city", &Value::from("LA")).unwrap();
        assert_eq!(session.snapshot(), before + 1);
        assert_eq!(session.view().unwrap().len(), 2);
        assert_eq!(session.audit(), ["city is one of: NY"]);
        // The loaded dataset is untouched.
        assert_eq!(session.base().unwrap().len(), 3);

        session.select_all("city").unwrap();
        assert_eq!(session.view().unwrap().len(), 3);
        assert!(session.audit().is_empty());
    }

    #[test]
    fn invalid_filter_leaves_state_alone() {
        let mut session = loaded();
        let before = session.snapshot();
        let bad = FilterSpec::new().with("nope", Predicate::one_of(["x"]));
        assert!(session.set_filters(bad).is_err());
        assert!(session.filters().is_empty());
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn select_none_empties_the_view() {
        let mut session = loaded();
        session.select_none("city").unwrap();
        assert!(session.view().unwrap().is_empty());
        let out = session.resolve(&ChartRequest::new(ChartKind::Bar).bind(Role::Primary, "city"));
        assert_eq!(out, Err(RejectionReason::EmptyDataset));
    }

    #[test]
    fn time_axis_enables_line_x() {
        let mut session = loaded();
        session.toggle_value("city", &Value::from("LA")).unwrap();
        session.designate_time_axis("joined").unwrap();
        let view = session.view().unwrap();
        assert_eq!(view.column("joined").unwrap().kind(), ColumnKind::Datetime);
        assert_eq!(view.len(), 2);

        let request = ChartRequest::new(ChartKind::Line)
            .bind(Role::Primary, "age")
            .bind(Role::X, "joined");
        assert!(session.resolve(&request).is_ok());
    }

    #[test]
    fn resolving_without_data_is_empty() {
        let session = Session::default();
        let out = session.resolve(&ChartRequest::new(ChartKind::Heatmap));
        assert_eq!(out, Err(RejectionReason::EmptyDataset));
    }
}
