//! Time-series store access.
//!
//! Reads come back as textual scalar cells, the same shape a time-series
//! query engine returns, so the reconstructor never sees column types.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::models::{QueryRow, Scalar, TrafficSample};

// ---

type CellTuple = (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Fetch the `limit` most recent measure rows, newest first.
///
/// Each row is `[time, location, measure_name, measure_value_double,
/// measure_value_bigint]`; SQL `NULL` becomes an absent cell.
pub async fn fetch_recent_rows(pool: &PgPool, limit: u32) -> Result<Vec<QueryRow>> {
    // ---
    let rows: Vec<CellTuple> = sqlx::query_as(
        r#"
        SELECT
            to_char(time AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS.US') AS time,
            location,
            measure_name,
            measure_value_double::TEXT AS measure_value_double,
            measure_value_bigint::TEXT AS measure_value_bigint
        FROM traffic_data
        ORDER BY time DESC
        LIMIT $1
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await
    .context("time-series query failed")?;

    debug!("Fetched {} rows from traffic_data", rows.len());

    Ok(rows.into_iter().map(to_query_row).collect())
}

/// Store one sample as two measure rows sharing `time` and `location`.
pub async fn insert_sample(pool: &PgPool, sample: &TrafficSample) -> Result<()> {
    // ---
    let time = DateTime::<Utc>::from_timestamp(sample.timestamp, 0)
        .with_context(|| format!("timestamp {} out of range", sample.timestamp))?;

    let vehicle_count =
        i64::try_from(sample.vehicle_count).context("vehicle_count does not fit BIGINT")?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO traffic_data (time, location, measure_name, measure_value_bigint)
        VALUES ($1, $2, 'vehicle_count', $3)
        "#,
    )
    .bind(time)
    .bind(&sample.location)
    .bind(vehicle_count)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO traffic_data (time, location, measure_name, measure_value_double)
        VALUES ($1, $2, 'average_speed', $3)
        "#,
    )
    .bind(time)
    .bind(&sample.location)
    .bind(sample.average_speed)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

fn to_query_row(cells: CellTuple) -> QueryRow {
    // ---
    let (time, location, measure_name, val_double, val_bigint) = cells;
    QueryRow::new(
        [time, location, measure_name, val_double, val_bigint]
            .into_iter()
            .map(|c| c.map(Scalar::from))
            .collect(),
    )
}
