use std::{error::Error, time::Instant};

use actix_web::{
    HttpRequest, HttpResponse,
    error::{InternalError, QueryPayloadError},
    http::header,
    middleware::DefaultHeaders,
    web,
};
use anomaly_store::{BoundingBoxQueryService, BoundsParams, QueryError};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::{Instrument, debug, error};

/// Shared state backing HTTP handlers.
pub struct ServerState {
    pub(crate) queries: BoundingBoxQueryService,
    pub(crate) metrics: Option<PrometheusHandle>,
}

impl ServerState {
    pub fn new(queries: BoundingBoxQueryService, metrics: Option<PrometheusHandle>) -> Self {
        Self { queries, metrics }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    anomalies: usize,
}

/// Register the data service routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_rejected))
        .route("/api/anomalies", web::get().to(anomalies_handler))
        .route("/healthz", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Permissive CORS headers; the map front-end is served from another origin.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_METHODS, "GET"))
        .add((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
}

/// Return every anomaly inside the requested bounding box.
async fn anomalies_handler(
    query: web::Query<BoundsParams>,
    state: web::Data<ServerState>,
) -> HttpResponse {
    let params = query.into_inner();
    let span = tracing::info_span!(
        "anomalies.query",
        min_lng = ?params.min_lng,
        min_lat = ?params.min_lat,
        max_lng = ?params.max_lng,
        max_lat = ?params.max_lat,
    );
    let started = Instant::now();
    let queries = state.queries.clone();
    let outcome = web::block(move || queries.find_within(&params))
        .instrument(span.clone())
        .await;
    metrics::histogram!("anomaly_http_request_seconds").record(started.elapsed().as_secs_f64());

    let _entered = span.enter();
    match outcome {
        Ok(Ok(anomalies)) => {
            debug!("Returning {} anomalies", anomalies.len());
            HttpResponse::Ok().json(anomalies)
        }
        Ok(Err(err)) if err.is_bad_request() => {
            debug!("Rejected bounding box query: {err}");
            HttpResponse::BadRequest().json(ErrorBody {
                error: err.to_string(),
                details: None,
            })
        }
        Ok(Err(err)) => {
            let details = error_chain(&err);
            error!("Anomaly query failed: {details}");
            server_error(details)
        }
        Err(err) => {
            error!("Anomaly query worker failed: {err}");
            server_error(err.to_string())
        }
    }
}

/// Query strings the extractor cannot decode get the same `{error}` body as
/// other bad requests.
fn query_rejected(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("Rejected bounding box query string: {err}");
    let response = HttpResponse::BadRequest().json(ErrorBody {
        error: err.to_string(),
        details: None,
    });
    InternalError::from_response(err, response).into()
}

async fn health_handler(state: web::Data<ServerState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthBody {
        status: "ok",
        anomalies: state.queries.document_count(),
    })
}

/// Prometheus exposition when a recorder is installed.
async fn metrics_handler(state: web::Data<ServerState>) -> HttpResponse {
    match state.metrics.as_ref() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NoContent().finish(),
    }
}

fn server_error(details: String) -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(ErrorBody {
        error: "Server error".to_string(),
        details: Some(details),
    })
}

/// Flatten an error and its sources into one line for logs and response bodies.
fn error_chain(err: &QueryError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
