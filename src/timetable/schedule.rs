//! Decoding and validation of the schedule document.
//!
//! The document is JSON with a top-level `events` list. Every item
//! must carry RFC 3339 start and end timestamps; one malformed item
//! rejects the whole batch, so a stale schedule keeps serving instead
//! of a half-applied one.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ScrapeError;

#[derive(Debug, Default, Deserialize)]
struct WireSchedule {
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct WireEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
}

/// One validated schedule entry, timestamps normalized to UTC.
///
/// An end before the start is allowed; the derived duration clamps to
/// zero instead of going negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleItem {
    pub id: String,
    pub name: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduleItem {
    /// Event length in seconds, clamped to be non-negative.
    pub fn duration_seconds(&self) -> f64 {
        let millis = self.end.timestamp_millis() - self.start.timestamp_millis();
        (millis as f64 / 1_000.0).max(0.0)
    }

    /// Whether `now` falls inside the closed interval `[start, end]`.
    /// Instants exactly on either boundary count as active.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now <= self.end
    }
}

/// Decode a schedule document, all-or-nothing.
pub fn decode_schedule(bytes: &[u8]) -> Result<Vec<ScheduleItem>, ScrapeError> {
    let schedule: WireSchedule = serde_json::from_slice(bytes)
        .map_err(|err| ScrapeError::Malformed(format!("schedule document: {err}")))?;

    schedule
        .events
        .into_iter()
        .map(|event| {
            if event.start.is_empty() || event.end.is_empty() {
                return Err(ScrapeError::Malformed(format!(
                    "event {:?}: start and end must be provided in RFC 3339 format",
                    event.id
                )));
            }
            let start = parse_timestamp(&event.start)
                .map_err(|err| ScrapeError::Malformed(format!("event {:?}: start: {err}", event.id)))?;
            let end = parse_timestamp(&event.end)
                .map_err(|err| ScrapeError::Malformed(format!("event {:?}: end: {err}", event.id)))?;
            Ok(ScheduleItem {
                id: event.id,
                name: event.name,
                location: event.location,
                start,
                end,
            })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> chrono::ParseResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}
