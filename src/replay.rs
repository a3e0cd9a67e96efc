//! Feeding recorded position traces through a guidance session

use std::io::Read;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use geo::coord;
use gravewalk_core::{FeatureId, GuidanceState, Guide};
use serde::Deserialize;

/// One row of a `timestamp,lon,lat` trace
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceRow {
    pub timestamp: DateTime<Utc>,
    pub lon: f64,
    pub lat: f64,
}

pub fn read_trace(reader: impl Read) -> Result<Vec<TraceRow>> {
    let mut rows = Vec::new();
    for (idx, row) in csv::Reader::from_reader(reader).deserialize::<TraceRow>().enumerate() {
        // Header is line 1
        rows.push(row.with_context(|| format!("trace line {}", idx + 2))?);
    }
    Ok(rows)
}

/// Routes to `destination` from the first sample and tracks the rest
///
/// Returns every state the session published, in order. A failed start is
/// part of the result rather than an error, the same way a visitor would see it.
pub fn replay(guide: &Guide, destination: FeatureId, trace: &[TraceRow]) -> Vec<GuidanceState> {
    let mut session = guide.session();
    let mut changes = session.subscribe();
    let mut published = Vec::new();

    for (idx, row) in trace.iter().enumerate() {
        let position = coord! { x: row.lon, y: row.lat };
        let outcome = session.submit_position(position, row.timestamp);
        tracing::debug!("{}: {outcome:?}", row.timestamp);
        if idx == 0
            && let Err(err) = session.start_routing(destination)
        {
            tracing::warn!("Could not start routing: {err}");
        }
        if changes.has_changed().unwrap_or(false) {
            published.push(changes.borrow_and_update().clone());
        }
    }

    tracing::info!(
        "Replayed {} samples, {} re-plans",
        trace.len(),
        session.replan_count()
    );
    published
}
