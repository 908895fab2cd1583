//! Data models for the traffic sensor pipeline.

use serde::{Deserialize, Serialize};

// ---

/// One scalar value as returned by a time-series query engine.
///
/// Query engines hand every scalar back as a string token, but JSON callers
/// occasionally send bare numbers or booleans. All variants render to the
/// same textual token through [`Scalar::to_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    // ---
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// A single row of a query result: `[time, location, measure_name,
/// measure_value_double, measure_value_bigint]`. `None` is an absent cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRow {
    // ---
    pub cells: Vec<Option<Scalar>>,
}

impl QueryRow {
    // ---
    pub fn new(cells: Vec<Option<Scalar>>) -> Self {
        Self { cells }
    }

    /// Textual value of cell `idx`, or `None` when the cell is absent or
    /// out of range.
    pub fn text(&self, idx: usize) -> Option<String> {
        self.cells.get(idx).and_then(|c| c.as_ref()).map(Scalar::to_text)
    }

    /// Raw row content for diagnostics.
    pub fn raw(&self) -> String {
        serde_json::to_string(&self.cells).unwrap_or_else(|_| format!("{:?}", self.cells))
    }
}

/// Result set of one time-series query invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    // ---
    #[serde(default)]
    pub rows: Vec<QueryRow>,
}

/// A complete, merged reading for one timestamp, ready to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub time: String,
    pub location: String,
    pub vehicle_count: u64,
    pub average_speed: f64,
}

/// One synthetic observation produced by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    // ---
    pub location: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub human_readable_timestamp: String,
    pub vehicle_count: u64,
    pub average_speed: f64,
}
