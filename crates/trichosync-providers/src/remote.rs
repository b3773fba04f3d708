//! The remote calendar contract.
//!
//! [`RemoteCalendar`] is the capability interface the merge engine and sync
//! orchestrator depend on. Implementations own the credential lifecycle:
//! they refresh expired tokens on request and report connection state
//! without ever exposing raw tokens.

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use trichosync_core::{NormalizedEvent, VisitWindow};

use crate::credential::ConnectionState;
use crate::error::RemoteResult;

/// An event owned by the remote calendar service.
///
/// Cached only transiently for merge and display; the remote service is
/// the source of truth. Instants are local wall clock, resolved from the
/// service's zoned timestamps at the parse boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// Opaque identifier minted by the remote service.
    pub id: String,
    /// Start instant, local wall clock.
    pub start: NaiveDateTime,
    /// End instant, local wall clock.
    pub end: NaiveDateTime,
    /// Event title.
    pub title: String,
    /// Event description, if any.
    pub description: Option<String>,
}

impl RemoteEvent {
    /// Creates a remote event with the required fields.
    pub fn new(
        id: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            title: title.into(),
            description: None,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe, so the orchestrator can hold
/// an `Arc<dyn RemoteCalendar>` and tests can substitute fakes.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability interface for the remote calendar service.
///
/// # Failure modes
///
/// - `list_events` / `create_event` / `update_event` fail with
///   `Unauthenticated` when the credential is absent or expired and with
///   `Unavailable` on transient network or service failure; `create_event`
///   additionally fails with `Conflict` when the service reports a
///   duplicate (the error carries the existing identifier when known).
/// - `refresh_credential` fails with `ReauthorizationRequired` when the
///   refresh token itself is invalid or expired.
pub trait RemoteCalendar: Send + Sync {
    /// Lists events whose start instant falls inside the window.
    fn list_events(&self, window: &VisitWindow) -> BoxFuture<'_, RemoteResult<Vec<RemoteEvent>>>;

    /// Creates an event and returns the identifier minted by the service.
    fn create_event(&self, event: &NormalizedEvent) -> BoxFuture<'_, RemoteResult<String>>;

    /// Updates an existing event in place.
    fn update_event(
        &self,
        remote_id: &str,
        event: &NormalizedEvent,
    ) -> BoxFuture<'_, RemoteResult<()>>;

    /// Refreshes the stored credential.
    ///
    /// Implementations serialize refreshes: concurrent callers observing
    /// an expired credential wait for the in-flight refresh instead of
    /// issuing redundant ones.
    fn refresh_credential(&self) -> BoxFuture<'_, RemoteResult<()>>;

    /// The current connection state, derived from the stored credential.
    fn connection_state(&self) -> ConnectionState;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn remote_event_builder() {
        let event = RemoteEvent::new("gcal-1", dt(2025, 3, 10, 12), dt(2025, 3, 10, 13), "Lunch")
            .with_description("team lunch");
        assert_eq!(event.id, "gcal-1");
        assert_eq!(event.description.as_deref(), Some("team lunch"));
    }

    #[test]
    fn remote_event_serde_roundtrip() {
        let event = RemoteEvent::new("gcal-1", dt(2025, 3, 10, 12), dt(2025, 3, 10, 13), "Lunch");
        let json = serde_json::to_string(&event).unwrap();
        let parsed: RemoteEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
