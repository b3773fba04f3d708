//! Display-ready calendar entries.
//!
//! The combined view hands the UI flat entries with a resolved color per
//! source, so the frontend needs no knowledge of normalization or merge.

use chrono::NaiveDateTime;
use serde::Serialize;

use trichosync_core::{EventSource, NormalizedEvent};

/// One entry of the combined calendar view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    /// Stable identifier of the underlying event.
    pub uid: String,
    /// Start instant, local wall clock.
    pub start: NaiveDateTime,
    /// End instant, local wall clock.
    pub end: NaiveDateTime,
    /// Entry title.
    pub title: String,
    /// Entry description, if any.
    pub description: Option<String>,
    /// Origin of the entry.
    pub source: EventSource,
    /// Display color, derived from the source.
    pub color: &'static str,
}

impl From<&NormalizedEvent> for CalendarEntry {
    fn from(event: &NormalizedEvent) -> Self {
        Self {
            uid: event.uid.clone(),
            start: event.start,
            end: event.end,
            title: event.title.clone(),
            description: event.description.clone(),
            source: event.source,
            color: event.source.color_hint(),
        }
    }
}
