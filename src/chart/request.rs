use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use super::contract::{ChartKind, Role};
use super::resolver::{resolve_with, Resolution};
use crate::config::EngineConfig;
use crate::data::model::Dataset;
use crate::error::RejectionReason;

/// A chart kind plus whatever role → column-name bindings the user has
/// made so far. Created fresh per interaction; holds no column data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    bindings: BTreeMap<Role, String>,
}

impl ChartRequest {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `role` to `column`. A blank name leaves the role unbound.
    pub fn bind(mut self, role: Role, column: impl Into<String>) -> Self {
        let column = column.into();
        if column.trim().is_empty() {
            self.bindings.remove(&role);
        } else {
            self.bindings.insert(role, column);
        }
        self
    }

    pub fn unbind(&mut self, role: Role) -> Option<String> {
        self.bindings.remove(&role)
    }

    pub fn binding(&self, role: Role) -> Option<&str> {
        self.bindings.get(&role).map(String::as_str)
    }

    pub fn bindings(&self) -> &BTreeMap<Role, String> {
        &self.bindings
    }

    /// First required role of the chart kind that has no column yet.
    pub fn missing_required(&self) -> Option<Role> {
        self.kind
            .contract()
            .required
            .iter()
            .map(|spec| spec.role)
            .find(|role| !self.bindings.contains_key(role))
    }
}

/// Collects raw selections from the host (chart menu, per-role pickers) and
/// turns them into a resolved chart or a rejection.
///
/// Blank selections count as unbound; unbound roles are never filled in
/// with a guess.
#[derive(Debug, Clone)]
pub struct ChartRequestBuilder {
    request: ChartRequest,
}

impl ChartRequestBuilder {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            request: ChartRequest::new(kind),
        }
    }

    /// Start from a chart menu label such as "Scatter Plot".
    pub fn parse(kind: &str) -> Result<Self, String> {
        Ok(Self::new(kind.parse()?))
    }

    pub fn select(mut self, role: Role, column: Option<&str>) -> Self {
        let name = column.map(str::trim).unwrap_or_default();
        self.request = self.request.bind(role, name);
        self
    }

    /// Same as [`select`](Self::select) with the role given by name.
    pub fn select_named(self, role: &str, column: Option<&str>) -> Result<Self, String> {
        let role: Role = role.parse()?;
        Ok(self.select(role, column))
    }

    pub fn request(&self) -> &ChartRequest {
        &self.request
    }

    pub fn finish(self) -> ChartRequest {
        self.request
    }

    /// Resolve against `dataset`. A required role left unbound is reported
    /// before any column lookup or aggregate computation happens.
    pub fn build(self, dataset: &Dataset, config: &EngineConfig) -> Resolution {
        let request = self.finish();
        if !dataset.is_empty() {
            if let Some(role) = request.missing_required() {
                debug!("{}: required role {role} unbound", request.kind);
                return Err(RejectionReason::RoleUnbound {
                    chart: request.kind,
                    role,
                });
            }
        }
        resolve_with(dataset, &request, config)
    }
}
