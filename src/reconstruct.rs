//! Row reconstruction: folds measure-per-row query results into complete
//! per-timestamp sensor readings.
//!
//! The store keeps one measure per row, so a reading for a timestamp only
//! exists once both its `vehicle_count` and `average_speed` rows have been
//! seen. Rows are folded into an insertion-ordered accumulator keyed by the
//! raw `time` token; incomplete entries are dropped at the end of the batch.
//!
//! A bad row never aborts the batch. Short rows and rows missing `time` or
//! `measure_name` are skipped with a warning, faults while applying a row are
//! logged as errors, and unknown measures are ignored silently.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::{QueryRow, SensorReading};

// ---

/// Number of cells a row must carry.
pub const ROW_WIDTH: usize = 5;

const LOCATION_PREFIX: &str = "Intersection_";
const UNKNOWN_LOCATION: &str = "Unknown";

const VEHICLE_COUNT: &str = "vehicle_count";
const AVERAGE_SPEED: &str = "average_speed";

/// Why a single row contributed nothing.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    // ---
    #[error("row has {0} cells, expected at least {}", ROW_WIDTH)]
    ShortRow(usize),

    #[error("row is missing required field `{0}`")]
    MissingRequiredField(&'static str),

    #[error("failed to apply measure `{measure}`: {reason}")]
    RowProcessingFault { measure: String, reason: String },
}

/// Per-batch counters, for logging only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    // ---
    pub rows_seen: usize,
    pub short_rows: usize,
    pub missing_fields: usize,
    pub faulted_rows: usize,
    pub incomplete_dropped: usize,
    pub readings: usize,
}

/// Output of one reconstruction pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconstruction {
    // ---
    pub readings: Vec<SensorReading>,
    pub stats: BatchStats,
}

/// Rebuild complete readings from a batch of query rows.
pub fn reconstruct(rows: &[QueryRow]) -> Vec<SensorReading> {
    reconstruct_batch(rows).readings
}

/// Same as [`reconstruct`], also returning the batch counters.
pub fn reconstruct_batch(rows: &[QueryRow]) -> Reconstruction {
    // ---
    let mut acc = Accumulator::default();
    let mut stats = BatchStats {
        rows_seen: rows.len(),
        ..BatchStats::default()
    };

    for (i, row) in rows.iter().enumerate() {
        match acc.apply(row) {
            Ok(()) => {}
            Err(e @ RowError::ShortRow(_)) => {
                stats.short_rows += 1;
                warn!(row = i, raw = %row.raw(), "Skipping row: {}", e);
            }
            Err(e @ RowError::MissingRequiredField(_)) => {
                stats.missing_fields += 1;
                warn!(row = i, raw = %row.raw(), "Skipping row: {}", e);
            }
            Err(e @ RowError::RowProcessingFault { .. }) => {
                stats.faulted_rows += 1;
                error!(row = i, raw = %row.raw(), "Failed to parse row: {}", e);
            }
        }
    }

    let total = acc.entries.len();
    let readings: Vec<SensorReading> = acc
        .entries
        .into_iter()
        .filter_map(ReadingBuilder::build)
        .collect();

    stats.incomplete_dropped = total - readings.len();
    stats.readings = readings.len();
    debug!(?stats, "Reconstruction complete");

    Reconstruction { readings, stats }
}

/// Normalize a raw location cell to `Intersection_<id>`.
///
/// Anything from the first `" ("` on is dropped, then only the segment after
/// the last `Intersection_` is kept and re-prefixed once. Returns `None` when
/// nothing is left after stripping.
pub fn normalize_location(raw: &str) -> Option<String> {
    // ---
    let cleaned = match raw.find(" (") {
        Some(pos) => &raw[..pos],
        None => raw,
    };

    if cleaned.is_empty() {
        return None;
    }

    let id = cleaned.rsplit(LOCATION_PREFIX).next().unwrap_or(cleaned);
    Some(format!("{LOCATION_PREFIX}{id}"))
}

// ---

#[derive(Debug, Default)]
struct ReadingBuilder {
    time: String,
    location: String,
    vehicle_count: Option<u64>,
    average_speed: Option<f64>,
}

impl ReadingBuilder {
    // ---
    fn build(self) -> Option<SensorReading> {
        Some(SensorReading {
            time: self.time,
            location: self.location,
            vehicle_count: self.vehicle_count?,
            average_speed: self.average_speed?,
        })
    }
}

/// Insertion-ordered map from `time` token to its builder.
#[derive(Debug, Default)]
struct Accumulator {
    index: HashMap<String, usize>,
    entries: Vec<ReadingBuilder>,
}

impl Accumulator {
    // ---
    fn entry(&mut self, time: &str) -> &mut ReadingBuilder {
        let idx = match self.index.get(time) {
            Some(&idx) => idx,
            None => {
                self.entries.push(ReadingBuilder::default());
                let idx = self.entries.len() - 1;
                self.index.insert(time.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    fn apply(&mut self, row: &QueryRow) -> Result<(), RowError> {
        // ---
        if row.cells.len() < ROW_WIDTH {
            return Err(RowError::ShortRow(row.cells.len()));
        }

        let time = present(row.text(0));
        let location = row.text(1);
        let measure_name = present(row.text(2));
        let val_double = row.text(3);
        let val_bigint = row.text(4);

        let time = time.ok_or(RowError::MissingRequiredField("time"))?;
        let measure_name = measure_name.ok_or(RowError::MissingRequiredField("measure_name"))?;

        let location = location
            .as_deref()
            .and_then(normalize_location)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        // Location and time are last-write-wins for a timestamp
        let record = self.entry(&time);
        record.time = time;
        record.location = location;

        match (measure_name.as_str(), val_bigint, val_double) {
            (VEHICLE_COUNT, Some(v), _) => {
                let count = v.trim().parse::<u64>().map_err(|e| fault(&measure_name, &v, e))?;
                record.vehicle_count = Some(count);
            }
            (AVERAGE_SPEED, _, Some(v)) => {
                let speed = v.trim().parse::<f64>().map_err(|e| fault(&measure_name, &v, e))?;
                // NaN and infinities have no JSON representation
                if !speed.is_finite() {
                    return Err(fault(&measure_name, &v, "not a finite number"));
                }
                record.average_speed = Some(speed);
            }
            _ => {}
        }

        Ok(())
    }
}

/// Empty tokens count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn fault(measure: &str, value: &str, e: impl std::fmt::Display) -> RowError {
    RowError::RowProcessingFault {
        measure: measure.to_string(),
        reason: format!("invalid value {value:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Scalar;

    fn row(cells: &[Option<&str>]) -> QueryRow {
        // ---
        QueryRow::new(cells.iter().map(|c| c.map(Scalar::from)).collect())
    }

    fn count_row(time: &str, location: Option<&str>, count: &str) -> QueryRow {
        row(&[Some(time), location, Some("vehicle_count"), None, Some(count)])
    }

    fn speed_row(time: &str, location: Option<&str>, speed: &str) -> QueryRow {
        row(&[Some(time), location, Some("average_speed"), Some(speed), None])
    }

    #[test]
    fn test_merge_by_time() {
        // ---
        let rows = vec![
            count_row("T1", Some("Intersection_5"), "42"),
            speed_row("T1", Some("Intersection_5"), "55.5"),
        ];

        let readings = reconstruct(&rows);

        assert_eq!(
            readings,
            vec![SensorReading {
                time: "T1".to_string(),
                location: "Intersection_5".to_string(),
                vehicle_count: 42,
                average_speed: 55.5,
            }]
        );
    }

    #[test]
    fn test_orphan_timestamp_dropped() {
        // ---
        let rows = vec![
            count_row("T1", Some("Intersection_1"), "10"),
            count_row("T2", Some("Intersection_2"), "20"),
            speed_row("T2", Some("Intersection_2"), "30.0"),
        ];

        let out = reconstruct_batch(&rows);

        assert_eq!(out.readings.len(), 1);
        assert_eq!(out.readings[0].time, "T2");
        assert_eq!(out.stats.incomplete_dropped, 1);
    }

    #[test]
    fn test_every_emitted_reading_is_complete() {
        // ---
        let rows = vec![
            speed_row("T3", Some("Intersection_3"), "41.2"),
            count_row("T1", Some("Intersection_1"), "11"),
            speed_row("T1", Some("Intersection_1"), "60.25"),
            row(&[Some("T4"), Some("Intersection_4"), Some("occupancy"), Some("0.4"), None]),
            count_row("T5", None, "7"),
        ];

        let readings = reconstruct(&rows);

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].vehicle_count, 11);
        assert_eq!(readings[0].average_speed, 60.25);
    }

    #[test]
    fn test_short_row_skipped() {
        // ---
        let rows = vec![
            row(&[Some("T1"), Some("Intersection_1"), Some("vehicle_count")]),
            count_row("T2", Some("Intersection_2"), "5"),
            speed_row("T2", Some("Intersection_2"), "25.0"),
        ];

        let out = reconstruct_batch(&rows);

        assert_eq!(out.stats.short_rows, 1);
        assert_eq!(out.readings.len(), 1);
        assert_eq!(out.readings[0].time, "T2");
    }

    #[test]
    fn test_missing_required_fields() {
        // ---
        let rows = vec![
            row(&[None, Some("Intersection_1"), Some("vehicle_count"), None, Some("1")]),
            row(&[Some("T1"), Some("Intersection_1"), None, None, Some("1")]),
            row(&[Some(""), Some("Intersection_1"), Some("vehicle_count"), None, Some("1")]),
        ];

        let mut acc = Accumulator::default();
        assert_eq!(acc.apply(&rows[0]), Err(RowError::MissingRequiredField("time")));
        assert_eq!(
            acc.apply(&rows[1]),
            Err(RowError::MissingRequiredField("measure_name"))
        );
        assert_eq!(acc.apply(&rows[2]), Err(RowError::MissingRequiredField("time")));

        let out = reconstruct_batch(&rows);
        assert_eq!(out.stats.missing_fields, 3);
        assert!(out.readings.is_empty());
    }

    #[test]
    fn test_missing_location_defaults_to_unknown() {
        // ---
        let rows = vec![count_row("T1", None, "9"), speed_row("T1", None, "33.3")];

        let readings = reconstruct(&rows);

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].location, "Unknown");
    }

    #[test]
    fn test_location_is_last_write_wins() {
        // ---
        let rows = vec![
            count_row("T1", Some("Intersection_1"), "9"),
            speed_row("T1", Some("Intersection_2"), "33.3"),
        ];

        let readings = reconstruct(&rows);
        assert_eq!(readings[0].location, "Intersection_2");
    }

    #[test]
    fn test_measure_without_value_contributes_nothing() {
        // ---
        let rows = vec![
            // bigint cell absent for vehicle_count
            row(&[Some("T1"), Some("Intersection_1"), Some("vehicle_count"), Some("4.0"), None]),
            speed_row("T1", Some("Intersection_1"), "40.0"),
        ];

        let out = reconstruct_batch(&rows);

        assert!(out.readings.is_empty());
        assert_eq!(out.stats.faulted_rows, 0);
        assert_eq!(out.stats.incomplete_dropped, 1);
    }

    #[test]
    fn test_bad_value_faults_only_that_row() {
        // ---
        let rows = vec![
            count_row("T1", Some("Intersection_1"), "many"),
            speed_row("T1", Some("Intersection_1"), "40.0"),
            count_row("T2", Some("Intersection_2"), "12"),
            speed_row("T2", Some("Intersection_2"), "fast"),
            count_row("T3", Some("Intersection_3"), " 3 "),
            speed_row("T3", Some("Intersection_3"), "30.5"),
        ];

        let out = reconstruct_batch(&rows);

        assert_eq!(out.stats.faulted_rows, 2);
        assert_eq!(out.readings.len(), 1);
        assert_eq!(out.readings[0].time, "T3");
        assert_eq!(out.readings[0].vehicle_count, 3);
    }

    #[test]
    fn test_negative_count_is_a_fault() {
        // ---
        let mut acc = Accumulator::default();
        let err = acc.apply(&count_row("T1", None, "-4")).unwrap_err();
        assert!(matches!(err, RowError::RowProcessingFault { .. }));
    }

    #[test]
    fn test_non_finite_speed_is_a_fault() {
        // ---
        for bad in ["NaN", "nan", "inf", "-Infinity"] {
            let mut acc = Accumulator::default();
            let err = acc.apply(&speed_row("T1", None, bad)).unwrap_err();
            assert!(matches!(err, RowError::RowProcessingFault { .. }), "{bad:?}");
        }

        let rows = vec![
            count_row("T1", Some("Intersection_1"), "5"),
            speed_row("T1", Some("Intersection_1"), "NaN"),
        ];

        let out = reconstruct_batch(&rows);
        assert!(out.readings.is_empty());
        assert_eq!(out.stats.faulted_rows, 1);
        assert_eq!(out.stats.incomplete_dropped, 1);
    }

    #[test]
    fn test_emission_follows_first_seen_order() {
        // ---
        let rows = vec![
            count_row("T9", Some("Intersection_9"), "1"),
            count_row("T2", Some("Intersection_2"), "2"),
            speed_row("T2", Some("Intersection_2"), "20.0"),
            count_row("T5", Some("Intersection_5"), "5"),
            speed_row("T9", Some("Intersection_9"), "90.0"),
            speed_row("T5", Some("Intersection_5"), "50.0"),
        ];

        let times: Vec<String> = reconstruct(&rows).into_iter().map(|r| r.time).collect();
        assert_eq!(times, vec!["T9", "T2", "T5"]);
    }

    #[test]
    fn test_empty_batch() {
        // ---
        let out = reconstruct_batch(&[]);
        assert!(out.readings.is_empty());
        assert_eq!(out.stats, BatchStats::default());
    }

    #[test]
    fn test_normalize_location() {
        // ---
        assert_eq!(
            normalize_location("Intersection_Intersection_7").as_deref(),
            Some("Intersection_7")
        );
        assert_eq!(
            normalize_location("Intersection_2 (type: VARCHAR)").as_deref(),
            Some("Intersection_2")
        );
        assert_eq!(
            normalize_location("Intersection_3 (type: BIGINT)").as_deref(),
            Some("Intersection_3")
        );
        assert_eq!(normalize_location("4").as_deref(), Some("Intersection_4"));
        assert_eq!(
            normalize_location("north_Intersection_8").as_deref(),
            Some("Intersection_8")
        );
        assert_eq!(normalize_location(""), None);
        assert_eq!(normalize_location(" (type: VARCHAR)"), None);
    }

    #[test]
    fn test_normalize_location_idempotent() {
        // ---
        for raw in ["Intersection_1", "Intersection_10", "Intersection_Intersection_7", "12"] {
            let once = normalize_location(raw).unwrap();
            let twice = normalize_location(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }
}
