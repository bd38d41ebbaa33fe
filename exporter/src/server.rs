//! HTTP endpoint: `/metrics` and `/debug/geoip`.

use crate::error::ApiError;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use portwatch_enrich::{CacheStats, CachedEntry};
use portwatch_scanner::ExporterContext;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Body of `/debug/geoip`.
#[derive(Debug, Serialize)]
pub struct GeoipDebug {
    /// Cache size by validity
    pub stats: CacheStats,
    /// Every cached record keyed by IP
    pub cached_data: BTreeMap<String, CachedEntry>,
}

/// Build the HTTP router.
pub fn router(context: ExporterContext) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/debug/geoip", get(geoip_debug_handler))
        .with_state(context)
}

/// Serve until the token is cancelled.
pub async fn serve(
    listener: TcpListener,
    context: ExporterContext,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Metrics endpoint listening on http://{}/metrics", addr);
    }

    axum::serve(listener, router(context))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn metrics_handler(State(context): State<ExporterContext>) -> Response {
    (
        [(header::CONTENT_TYPE, portwatch_metrics::CONTENT_TYPE)],
        context.metrics.render(),
    )
        .into_response()
}

async fn geoip_debug_handler(
    State(context): State<ExporterContext>,
) -> Result<Json<GeoipDebug>, ApiError> {
    let cache = context.cache.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "ENRICHMENT_DISABLED",
            "Enrichment is disabled",
        )
    })?;

    let cached_data = cache
        .entries()
        .into_iter()
        .map(|entry| (entry.record.ip.clone(), entry))
        .collect();

    Ok(Json(GeoipDebug {
        stats: cache.stats(),
        cached_data,
    }))
}
