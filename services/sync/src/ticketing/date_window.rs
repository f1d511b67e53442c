use chrono::{DateTime, SecondsFormat, Utc};

use hubwatch_common::error::{HubwatchError, HubwatchResult};

/// Window start used when no prior run has ever completed.
pub const DEFAULT_START_DATE: &str = "2016-05-01T00:00:00Z";

/// The `[start, end)` interval one run covers. Immutable once constructed;
/// one instance per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> HubwatchResult<Self> {
        if start > end {
            return Err(HubwatchError::Internal(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Start date formatted for the Hub notification API.
    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// End date formatted for the Hub notification API.
    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Compute the window for a run from the stored last-run end date.
///
/// Absent ⇒ start at the fixed default epoch. Present ⇒ start exactly where
/// the previous run ended (no gap, no overlap). Malformed ⇒ fatal
/// configuration error; the run must not proceed on a guessed window.
pub fn resolve_window(stored: Option<&str>, now: DateTime<Utc>) -> HubwatchResult<DateRange> {
    let start = match stored {
        None => DEFAULT_START_DATE
            .parse::<DateTime<Utc>>()
            .expect("default start date parses"),
        Some(raw) => raw.parse::<DateTime<Utc>>().map_err(|e| {
            HubwatchError::Config(format!("stored last run date {raw:?} is malformed: {e}"))
        })?,
    };
    DateRange::new(start, now)
}
