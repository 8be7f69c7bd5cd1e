// ── Time-series aligner ──
//
// Turns a flat list of per-sensor readings into one row per distinct
// timestamp with a column for every requested sensor. Missing cells are
// `None`, never absent.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexMap;

use crate::model::{AlignedEntry, ReadingPoint};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Canonical textual form: the first space becomes `T`, so
/// `"2024-01-01 10:00:00"` and `"2024-01-01T10:00:00"` compare equal.
pub fn normalize_timestamp(raw: &str) -> String {
    raw.trim().replacen(' ', "T", 1)
}

/// Chronological sort key for a normalized timestamp. Offsets are folded
/// to UTC; naive stamps are taken as-is.
fn instant(normalized: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(normalized) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(normalized, fmt).ok())
}

/// Align `readings` onto `sensors`.
///
/// Rows are the distinct normalized timestamps in ascending order
/// (chronological when parseable; unparseable stamps sort first, ties
/// break textually). Each row has one entry per sensor in `sensors`, in
/// that order. When several readings share a (sensor, timestamp) pair the
/// first one in input order wins.
pub fn align(readings: &[ReadingPoint], sensors: &[String]) -> Vec<AlignedEntry> {
    let mut rows: HashMap<String, Row<'_>> = HashMap::new();

    for r in readings {
        let row = rows
            .entry(normalize_timestamp(&r.timestamp))
            .or_insert_with_key(|ts| Row {
                at: instant(ts),
                cells: HashMap::new(),
            });
        row.cells.entry(r.sensor_name.as_str()).or_insert(r.value);
    }

    let mut ordered: Vec<(String, Row<'_>)> = rows.into_iter().collect();
    ordered.sort_by(|(a_ts, a), (b_ts, b)| a.at.cmp(&b.at).then_with(|| a_ts.cmp(b_ts)));

    ordered
        .into_iter()
        .map(|(timestamp, row)| {
            let values: IndexMap<String, Option<f64>> = sensors
                .iter()
                .map(|sensor| (sensor.clone(), row.cells.get(sensor.as_str()).copied()))
                .collect();
            AlignedEntry { timestamp, values }
        })
        .collect()
}

struct Row<'a> {
    at: Option<NaiveDateTime>,
    cells: HashMap<&'a str, f64>,
}
