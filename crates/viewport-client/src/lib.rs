//! Client half of the viewport pipeline.
//!
//! The module is split into focused submodules:
//! - `debounce`: trailing-edge gate over viewport-change events.
//! - `fetch`: HTTP client for the bounding-box endpoint.
//! - `marker`: render-ready marker records and popup content.
//! - `surface`: the render surface seam plus an in-memory implementation.
//! - `reconcile`: full-replacement marker reconciliation and stats.
//! - `session`: the single-threaded session state machine.
//! - `driver`: tokio task that executes session commands.

pub use debounce::{Arm, DEFAULT_DEBOUNCE, DebounceState, Debouncer, TimerToken};
pub use driver::{SessionHandle, spawn_session};
pub use fetch::{AnomalyFetchClient, AnomalySource, DEFAULT_TIMEOUT, FetchError, FetchErrorKind};
pub use marker::{Marker, MarkerKey, build_marker, popup_html};
pub use reconcile::{MarkerReconciler, ReconcileReport};
pub use session::{RequestId, SessionCommand, SessionEvent, ViewportSession};
pub use surface::{MemorySurface, RenderSurface};

mod debounce;
mod driver;
mod fetch;
mod marker;
mod reconcile;
mod session;
mod surface;
