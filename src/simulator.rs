//! Synthetic traffic sensor.
//!
//! Produces one random observation per tick and writes it to the store,
//! standing in for roadside sensors during development.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::models::TrafficSample;
use crate::store;

// ---

/// Intersections the simulator reports for.
pub const INTERSECTIONS: [&str; 10] = [
    "Intersection_1",
    "Intersection_2",
    "Intersection_3",
    "Intersection_4",
    "Intersection_5",
    "Intersection_6",
    "Intersection_7",
    "Intersection_8",
    "Intersection_9",
    "Intersection_10",
];

/// e.g. `April 21, 2021, 10:28:00 PM`
const HUMAN_FORMAT: &str = "%B %d, %Y, %I:%M:%S %p";

/// Generate one sample stamped with `now` (truncated to whole seconds).
///
/// `human_readable_timestamp` is rendered in UTC, not the host's local zone,
/// so samples read the same wherever the simulator runs.
pub fn generate_sample<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> TrafficSample {
    // ---
    let location = INTERSECTIONS
        .choose(rng)
        .copied()
        .unwrap_or(INTERSECTIONS[0]);

    let speed: f64 = rng.gen_range(20.0..80.0);

    TrafficSample {
        location: location.to_string(),
        timestamp: now.timestamp(),
        human_readable_timestamp: now.format(HUMAN_FORMAT).to_string(),
        vehicle_count: rng.gen_range(10..=120),
        average_speed: (speed * 100.0).round() / 100.0,
    }
}

/// Generate and store a sample every `interval`, forever.
///
/// Store failures are logged and the loop keeps going.
pub async fn run(pool: PgPool, interval: Duration) {
    // ---
    info!("Simulator started, interval {:?}", interval);

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        // ThreadRng is not Send, keep it out of the await below
        let sample = generate_sample(&mut rand::thread_rng(), Utc::now());

        match store::insert_sample(&pool, &sample).await {
            Ok(()) => debug!(
                location = %sample.location,
                vehicle_count = sample.vehicle_count,
                average_speed = sample.average_speed,
                "Stored sample at {}",
                sample.human_readable_timestamp
            ),
            Err(e) => error!("Failed to store simulated sample: {:#}", e),
        }
    }
}
