// src/routes/reconstruct.rs
//! `POST /reconstruct`: rebuild readings from a query result supplied in the
//! request body. Pure; the store is never touched.

use axum::{routing::post, Json, Router};
use tracing::info;

use crate::models::QueryResult;
use crate::reconstruct::{reconstruct_batch, Reconstruction};

// ---

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/reconstruct", post(handler))
}

async fn handler(Json(result): Json<QueryResult>) -> Json<Reconstruction> {
    // ---
    info!("POST /reconstruct - {} rows", result.rows.len());
    Json(reconstruct_batch(&result.rows))
}
