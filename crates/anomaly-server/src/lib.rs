//! HTTP surface for the anomaly data service.
//!
//! - `handlers`: route table, JSON error mapping, CORS headers.
//! - `server`: dedicated-thread Actix runtime with graceful shutdown.

pub use handlers::{ServerState, configure_routes, cors_headers};
pub use server::{AnomalyServer, ServerOptions, spawn_anomaly_server};

mod handlers;
mod server;
