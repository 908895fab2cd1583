//! Routes gateway: the only place that knows every endpoint.

use axum::Router;
use sqlx::PgPool;

use crate::Config;

mod forward;
mod health;
mod reconstruct;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(forward::router())
        .merge(reconstruct::router())
        .merge(health::router())
        .with_state((pool, config))
}
