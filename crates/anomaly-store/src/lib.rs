//! Read-only anomaly storage and the bounding-box query contract.
//!
//! - `store`: the [`AnomalyStore`] seam and its error type.
//! - `grid`: in-memory store backed by a uniform-grid spatial index.
//! - `loader`: GeoJSON document loading for the memory store.
//! - `query`: parameter validation and the [`BoundingBoxQueryService`].

pub use grid::{DEFAULT_CELL_DEGREES, MemoryStore};
pub use loader::{load_geojson, parse_geojson};
pub use query::{BoundingBoxQueryService, BoundsParams, MISSING_PARAMETERS, QueryError, parse_bounds};
pub use store::{AnomalyStore, StoreError};

mod grid;
mod loader;
mod query;
mod store;
