//! Traffic sensor forwarding pipeline.
//!
//! Rebuilds complete per-timestamp readings from measure-per-row time-series
//! query results and forwards them to a message bus. Modules follow the
//! Explicit Module Boundary Pattern (EMBP): `routes` is the HTTP gateway,
//! `reconstruct` holds the row folding logic, and the I/O edges live in
//! `store` and `publisher`.

pub mod config;
pub mod models;
pub mod publisher;
pub mod reconstruct;
pub mod routes;
pub mod schema;
pub mod simulator;
pub mod store;

pub use config::Config;
pub use models::{QueryResult, QueryRow, Scalar, SensorReading, TrafficSample};
pub use reconstruct::{reconstruct, reconstruct_batch};
