/// Data layer: core types, loading, classification and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse bytes → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  assign column kinds (numeric, categorical, …)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply column predicates → new Dataset + audit trail
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;
