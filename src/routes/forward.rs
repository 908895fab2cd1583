// src/routes/forward.rs
//! `POST /forward`: one pass of the forwarding pipeline.
//!
//! Reads the most recent rows from the store, rebuilds complete readings and
//! publishes them to the message bus. A zero `limit` is rejected with `400`,
//! a store failure fails the pass with `500`, a bus failure with `502`.

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::post, Json,
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::SensorReading;
use crate::publisher::BusPublisher;
use crate::reconstruct::{reconstruct_batch, BatchStats};
use crate::{store, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/forward", post(handler))
}

/// Query parameters for a forward pass
#[derive(Debug, Deserialize)]
pub struct ForwardQuery {
    /// Rows to read; defaults to `QUERY_LIMIT`, must be positive
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ForwardResponse {
    batch_id: Option<Uuid>,
    published: usize,
    stats: BatchStats,
    readings: Vec<SensorReading>,
}

async fn handler(
    Query(params): Query<ForwardQuery>,
    State((pool, config)): State<(PgPool, Config)>,
) -> impl IntoResponse {
    // ---
    let limit = params.limit.unwrap_or(config.query_limit);
    if limit == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json("limit must be greater than 0"),
        )
            .into_response();
    }
    info!("POST /forward - Starting pipeline, limit {}", limit);

    // Step 1: Query the store
    debug!("POST /forward - Step 1");

    let rows = match store::fetch_recent_rows(&pool, limit).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Fatal error fetching rows: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to query time-series store"),
            )
                .into_response();
        }
    };

    // Step 2: Rebuild readings
    debug!("POST /forward - Step 2");

    let batch = reconstruct_batch(&rows);
    for reading in &batch.readings {
        debug!(?reading, "Parsed record");
    }

    // Step 3: Publish
    debug!("POST /forward - Step 3");

    let publisher = BusPublisher::new(config.bus_url.as_str());
    let outcome = match publisher.publish(&batch.readings).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Failed to publish readings: {:#}", e);
            return (StatusCode::BAD_GATEWAY, Json("Failed to publish readings")).into_response();
        }
    };

    info!(
        "Pipeline complete, published {} of {} rows as readings",
        outcome.sent, batch.stats.rows_seen
    );

    let body = ForwardResponse {
        batch_id: outcome.batch_id,
        published: outcome.sent,
        stats: batch.stats,
        readings: batch.readings,
    };
    (StatusCode::OK, Json(body)).into_response()
}
