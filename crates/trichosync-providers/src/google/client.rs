//! Low-level Google Calendar API client.
//!
//! Thin HTTP layer over the Calendar API v3: request building, status code
//! mapping into [`RemoteError`], and response parsing into [`RemoteEvent`].

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use trichosync_core::{NormalizedEvent, VisitWindow};

use crate::error::{RemoteError, RemoteResult};
use crate::remote::RemoteEvent;

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client bound to one access token.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Creates a client with the given access token.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
        })
    }

    /// Updates the access token (after refresh).
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    /// Lists events from a calendar, following pagination.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        window: &VisitWindow,
    ) -> RemoteResult<Vec<RemoteEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let result = self
                .list_events_page(calendar_id, window, page_token.as_deref())
                .await?;

            for item in result.items {
                if let Some(event) = convert_event(item) {
                    all_events.push(event);
                }
            }

            match result.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            count = all_events.len(),
            calendar = calendar_id,
            "fetched remote events"
        );
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        window: &VisitWindow,
        page_token: Option<&str>,
    ) -> RemoteResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let (time_min, time_max) = fetch_bounds(window);
        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min),
                ("timeMax", time_max),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token.to_string())]);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::unavailable(format!("failed to read response: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::invalid_response(format!("failed to parse response: {e}")))
    }

    /// Creates an event and returns the identifier minted by the service.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NormalizedEvent,
        timezone: &str,
    ) -> RemoteResult<String> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&ApiEventBody::from_event(event, timezone))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let created: ApiEvent = response
            .json()
            .await
            .map_err(|e| RemoteError::invalid_response(format!("failed to parse response: {e}")))?;

        created
            .id
            .ok_or_else(|| RemoteError::invalid_response("created event has no identifier"))
    }

    /// Updates an existing event in place.
    pub async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &NormalizedEvent,
        timezone: &str,
    ) -> RemoteResult<()> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );

        let response = self
            .http_client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(&ApiEventBody::from_event(event, timezone))
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

/// Maps reqwest transport failures onto the transient error code.
fn map_transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::unavailable("request timeout")
    } else if e.is_connect() {
        RemoteError::unavailable(format!("connection failed: {e}"))
    } else {
        RemoteError::unavailable(format!("request failed: {e}"))
    }
}

/// Maps non-success HTTP statuses onto the error taxonomy.
async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(RemoteError::unauthenticated(
            "access token expired or invalid",
        ));
    }

    if status == reqwest::StatusCode::CONFLICT {
        let body = response.text().await.unwrap_or_default();
        let mut err = RemoteError::conflict(format!("duplicate event reported: {body}"));
        if let Some(id) = extract_conflicting_id(&body) {
            err = err.with_existing_id(id);
        }
        return Err(err);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::unavailable(format!(
            "service error ({status}): {body}"
        )));
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::invalid_response(format!(
        "unexpected API response ({status}): {body}"
    )))
}

/// Pulls a conflicting event id out of a 409 body, when the service
/// includes one.
fn extract_conflicting_id(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed
        .pointer("/error/errors/0/location")
        .or_else(|| parsed.pointer("/id"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

/// Query-string bounds for an event fetch.
///
/// The window holds local wall-clock instants but the API wants zoned
/// timestamps, so the bounds go out padded by a day on each side with a Z
/// suffix. The padding absorbs any offset between the clinic timezone and
/// UTC; the merge engine re-filters to the exact window after parsing.
fn fetch_bounds(window: &VisitWindow) -> (String, String) {
    let pad = chrono::Duration::days(1);
    (
        format_api_instant(window.start - pad),
        format_api_instant(window.end + pad),
    )
}

fn format_api_instant(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Converts an API event into a [`RemoteEvent`].
///
/// Cancelled events and events without parseable times are skipped.
fn convert_event(event: ApiEvent) -> Option<RemoteEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    let start = parse_api_time(&event.start, &id)?;
    let end = parse_api_time(&event.end, &id)?;
    let title = event.summary.unwrap_or_else(|| "Bez tytułu".to_string());

    let mut remote = RemoteEvent::new(id, start, end, title);
    if let Some(description) = event.description {
        remote = remote.with_description(description);
    }
    Some(remote)
}

/// Resolves an API timestamp to local wall clock at the parse boundary.
///
/// Zoned timestamps keep the wall clock of their own offset (the calendar
/// is configured in the clinic timezone); all-day dates resolve to
/// midnight.
fn parse_api_time(time: &ApiEventTime, event_id: &str) -> Option<NaiveDateTime> {
    if let Some(ref dt) = time.date_time {
        return match DateTime::parse_from_rfc3339(dt) {
            Ok(parsed) => Some(parsed.naive_local()),
            Err(e) => {
                warn!(event = event_id, error = %e, "failed to parse event datetime");
                None
            }
        };
    }
    if let Some(ref date) = time.date {
        return match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(parsed) => parsed.and_hms_opt(0, 0, 0),
            Err(e) => {
                warn!(event = event_id, error = %e, "failed to parse event date");
                None
            }
        };
    }
    warn!(event = event_id, "event has no start/end time");
    None
}

/// Event list response from the API.
#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// An event as returned by the API.
#[derive(Debug, Deserialize)]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
}

/// Start/end time of an API event: either a zoned datetime or a bare date.
#[derive(Debug, Default, Deserialize)]
struct ApiEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

/// Outgoing event body for insert/patch.
#[derive(Debug, Serialize)]
struct ApiEventBody {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: ApiEventBodyTime,
    end: ApiEventBodyTime,
}

#[derive(Debug, Serialize)]
struct ApiEventBodyTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

impl ApiEventBody {
    fn from_event(event: &NormalizedEvent, timezone: &str) -> Self {
        Self {
            summary: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start: ApiEventBodyTime {
                date_time: event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                time_zone: timezone.to_string(),
            },
            end: ApiEventBodyTime {
                date_time: event.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                time_zone: timezone.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trichosync_core::EventSource;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn converts_zoned_datetime_to_wall_clock() {
        let event = ApiEvent {
            id: Some("gcal-1".to_string()),
            status: Some("confirmed".to_string()),
            summary: Some("Kontrola".to_string()),
            description: None,
            start: ApiEventTime {
                date_time: Some("2025-03-10T12:00:00+01:00".to_string()),
                date: None,
            },
            end: ApiEventTime {
                date_time: Some("2025-03-10T13:00:00+01:00".to_string()),
                date: None,
            },
        };

        let remote = convert_event(event).unwrap();
        // Wall clock of the event's own offset, not UTC
        assert_eq!(remote.start, dt(2025, 3, 10, 12));
        assert_eq!(remote.end, dt(2025, 3, 10, 13));
    }

    #[test]
    fn converts_all_day_to_midnight() {
        let event = ApiEvent {
            id: Some("gcal-2".to_string()),
            status: None,
            summary: None,
            description: None,
            start: ApiEventTime {
                date_time: None,
                date: Some("2025-03-10".to_string()),
            },
            end: ApiEventTime {
                date_time: None,
                date: Some("2025-03-11".to_string()),
            },
        };

        let remote = convert_event(event).unwrap();
        assert_eq!(remote.start, dt(2025, 3, 10, 0));
        assert_eq!(remote.title, "Bez tytułu");
    }

    #[test]
    fn skips_cancelled_and_timeless_events() {
        let cancelled = ApiEvent {
            id: Some("gcal-3".to_string()),
            status: Some("cancelled".to_string()),
            summary: None,
            description: None,
            start: ApiEventTime::default(),
            end: ApiEventTime::default(),
        };
        assert!(convert_event(cancelled).is_none());

        let timeless = ApiEvent {
            id: Some("gcal-4".to_string()),
            status: None,
            summary: Some("floating".to_string()),
            description: None,
            start: ApiEventTime::default(),
            end: ApiEventTime::default(),
        };
        assert!(convert_event(timeless).is_none());
    }

    #[test]
    fn event_body_carries_timezone() {
        let event = NormalizedEvent::new(
            "visit-42-92060207477@trichosync.local",
            EventSource::Local,
            dt(2025, 3, 10, 10),
            dt(2025, 3, 10, 11),
            "Wizyta: Jane Doe",
        )
        .with_location("Gabinet trychologa");

        let body = ApiEventBody::from_event(&event, "Europe/Warsaw");
        assert_eq!(body.start.date_time, "2025-03-10T10:00:00");
        assert_eq!(body.start.time_zone, "Europe/Warsaw");
        assert_eq!(body.summary, "Wizyta: Jane Doe");
        assert_eq!(body.location.as_deref(), Some("Gabinet trychologa"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["start"]["dateTime"], "2025-03-10T10:00:00");
        assert_eq!(json["start"]["timeZone"], "Europe/Warsaw");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn fetch_bounds_pad_the_window_on_both_sides() {
        let window = VisitWindow::from_dates(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 16).unwrap(),
        );
        let (time_min, time_max) = fetch_bounds(&window);
        // A day of padding on each side covers any clinic-to-UTC offset,
        // so events near the window edges are always listed
        assert_eq!(time_min, "2025-03-09T00:00:00Z");
        assert_eq!(time_max, "2025-03-17T23:59:59Z");
    }

    #[test]
    fn conflicting_id_extraction() {
        assert_eq!(
            extract_conflicting_id(r#"{"id": "existing-9"}"#),
            Some("existing-9".to_string())
        );
        assert_eq!(extract_conflicting_id("not json"), None);
        assert_eq!(extract_conflicting_id("{}"), None);
    }
}
