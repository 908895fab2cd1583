//! Database schema management for `trafficflow-forwarder`.
//!
//! The store keeps one measure per row, the layout time-series engines use
//! for single-measure records. Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the `traffic_data` table and its index (idempotent).
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS traffic_data (
            id                   BIGSERIAL PRIMARY KEY,
            time                 TIMESTAMPTZ      NOT NULL,
            location             TEXT,
            measure_name         TEXT             NOT NULL,
            measure_value_double DOUBLE PRECISION,
            measure_value_bigint BIGINT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Forward passes always read newest-first
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_traffic_data_time
            ON traffic_data (time DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
