//! The merge engine: one combined event stream from two sources.
//!
//! Pure functions only; fetching is the caller's job. Local visits are
//! normalized, remote events already pushed from this system are
//! suppressed so a visit never shows up twice, the window filter is
//! applied on the normalized start instant, and the result is sorted
//! deterministically.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tracing::debug;

use trichosync_core::{
    normalize_appointment, Appointment, ClinicConfig, EventSource, NormalizedEvent, VisitWindow,
};
use trichosync_providers::RemoteEvent;

/// Merges local visits and remote events into one sorted stream.
///
/// `mappings` is the visit-UID-to-remote-identifier map recorded by the
/// sync engine. A remote event carrying a mapped identifier is an echo of
/// a local visit and is dropped, but only when that visit is itself part
/// of the combined locals; an echo whose local row is absent (deleted, or
/// outside the handed-over set) stays visible rather than vanishing from
/// both sides. The window filter applies to the normalized start instant,
/// so a date-only visit is windowed at its resolved 10:00 slot, not at
/// midnight.
///
/// Ordering is total: by start instant, then local before remote, then
/// UID. Two runs over the same input produce the same sequence.
pub fn combine_events(
    appointments: &[Appointment],
    remote_events: &[RemoteEvent],
    mappings: &HashMap<String, String>,
    window: &VisitWindow,
    config: &ClinicConfig,
    now: NaiveDateTime,
) -> Vec<NormalizedEvent> {
    let mut combined: Vec<NormalizedEvent> = Vec::new();

    for appointment in appointments {
        let event = normalize_appointment(appointment, config, now);
        if window.contains(event.start) {
            combined.push(event);
        }
    }

    // Echoes are suppressed only for visits actually present above
    let included_uids: HashSet<&str> = combined.iter().map(|e| e.uid.as_str()).collect();
    let echo_ids: HashSet<&str> = mappings
        .iter()
        .filter(|(uid, _)| included_uids.contains(uid.as_str()))
        .map(|(_, remote_id)| remote_id.as_str())
        .collect();

    let mut suppressed = 0usize;
    for remote in remote_events {
        if echo_ids.contains(remote.id.as_str()) {
            suppressed += 1;
            continue;
        }
        if !window.contains(remote.start) {
            continue;
        }
        combined.push(remote_to_event(remote));
    }

    if suppressed > 0 {
        debug!(suppressed, "dropped remote echoes of pushed visits");
    }

    combined.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.source.priority().cmp(&b.source.priority()))
            .then_with(|| a.uid.cmp(&b.uid))
    });
    combined
}

/// Converts a remote event into the canonical form.
fn remote_to_event(remote: &RemoteEvent) -> NormalizedEvent {
    let mut event = NormalizedEvent::new(
        remote.id.clone(),
        EventSource::Remote,
        remote.start,
        remote.end,
        remote.title.clone(),
    );
    if let Some(ref description) = remote.description {
        event = event.with_description(description.clone());
    }
    event
}
