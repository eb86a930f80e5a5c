//! Dedicated-thread Actix runtime hosting the data service.
//!
//! The server owns its own `actix_web::rt::System` so callers stay free of
//! Actix runtime concerns. Shutdown is signalled over a oneshot channel and
//! the thread is joined afterwards.

use std::{io, net::SocketAddr, sync::mpsc, thread};

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result, anyhow};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::handlers::{ServerState, configure_routes, cors_headers};

#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub bind: SocketAddr,
    pub workers: usize,
}

/// Handle for the data service thread.
pub struct AnomalyServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl AnomalyServer {
    /// Address the listener actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the server to stop and block until the thread exits.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("Anomaly server on {} stopped", self.local_addr);
    }
}

impl Drop for AnomalyServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn the data service thread and wait until its listener is bound.
pub fn spawn_anomaly_server(state: ServerState, options: ServerOptions) -> Result<AnomalyServer> {
    let data = web::Data::new(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = mpsc::channel::<io::Result<SocketAddr>>();
    let ServerOptions { bind, workers } = options;

    let handle = thread::Builder::new()
        .name("anomaly-http-server".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = match HttpServer::new(move || {
                    App::new()
                        .app_data(data.clone())
                        .wrap(cors_headers())
                        .configure(configure_routes)
                })
                .workers(workers.max(1))
                .disable_signals()
                .bind(bind)
                {
                    Ok(server) => server,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };

                let local_addr = server.addrs().first().copied();
                let server = server.run();
                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                let _ = ready_tx.send(
                    local_addr.ok_or_else(|| io::Error::other("listener reported no address")),
                );
                server.await
            }) {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn anomaly server thread")?;

    let bound = ready_rx
        .recv()
        .map_err(|_| anyhow!("anomaly server thread exited before binding"))
        .and_then(|result| result.with_context(|| format!("failed to bind {bind}")));
    let local_addr = match bound {
        Ok(addr) => addr,
        Err(err) => {
            let _ = handle.join();
            return Err(err);
        }
    };

    info!("Anomaly server listening on http://{local_addr} with {workers} workers");
    Ok(AnomalyServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
        local_addr,
    })
}
