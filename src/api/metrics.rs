//! Prometheus metrics endpoint
//!
//! Serves the lifecycle, scheduler and storage instruments in the
//! Prometheus text format.

use axum::{
    Router,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::metrics::REGISTRY;

/// GET /metrics
async fn metrics_handler() -> Result<Response, AppError> {
    let encoder = TextEncoder::new();
    let metrics_text = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode metrics: {e}")))?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type())], metrics_text).into_response())
}

/// Create metrics router
///
/// Mounted at the root, outside `/api/v1`, so scrapers need no actor headers.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(metrics_handler))
}
