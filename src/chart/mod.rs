/// Chart layer: role contracts, resolution, and renderer-facing data.
///
/// Architecture:
/// ```text
///   ChartRequest (kind + role → column name)
///        │
///        ▼
///   ┌──────────┐
///   │ contract  │  static role table per chart kind
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ resolver  │  bind roles, check constraints
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  counts, correlations, points → ResolvedChart
///   └───────────┘
/// ```

pub mod aggregate;
pub mod contract;
pub mod request;
pub mod resolver;

pub use contract::{ChartKind, Role};
pub use request::{ChartRequest, ChartRequestBuilder};
pub use resolver::{resolve, resolve_with, BoundColumn, Resolution, ResolvedChart};
