//! Event types for the clinic calendar.
//!
//! This module provides:
//! - [`Appointment`]: a visit tuple as handed over by the record store
//! - [`NormalizedEvent`]: the canonical event used for merge, export and sync
//! - [`EventSource`]: origin tag with a fixed display color per source
//! - [`ClinicConfig`]: the fixed labels and defaults of the clinic calendar

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::identity::visit_uid;
use crate::time::normalize_schedule_with;

/// Where an event in the combined view originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// A clinic-created visit from the local record store.
    Local,
    /// An event owned by the remote calendar service.
    Remote,
}

impl EventSource {
    /// Fixed display color for this source.
    ///
    /// Derived solely from the source, never from event content.
    pub fn color_hint(&self) -> &'static str {
        match self {
            Self::Local => "#28a745",
            Self::Remote => "#4285f4",
        }
    }

    /// Merge tie-break priority; lower sorts first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Local => 0,
            Self::Remote => 1,
        }
    }
}

/// Status of a calendar event.
///
/// Clinic-originated events are always confirmed; the variant exists so the
/// export format has an explicit value rather than a hardcoded string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Confirmed,
}

impl EventStatus {
    /// The iCal STATUS property value.
    pub fn as_ical(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
        }
    }
}

/// Fixed labels and defaults of the clinic calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicConfig {
    /// Calendar display name (X-WR-CALNAME).
    pub calendar_name: String,
    /// IANA timezone the clinic operates in (X-WR-TIMEZONE).
    pub timezone: String,
    /// Fixed location attached to every visit.
    pub location: String,
    /// Hour of day assigned to visits without a time component.
    pub default_visit_hour: u32,
    /// Visit slot length in minutes.
    pub visit_duration_minutes: i64,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            calendar_name: "Wizyty Trychologa".to_string(),
            timezone: "Europe/Warsaw".to_string(),
            location: "Gabinet trychologa".to_string(),
            default_visit_hour: 10,
            visit_duration_minutes: 60,
        }
    }
}

/// A visit as handed over by the patient-record store.
///
/// Read-only from this crate's perspective; the record store owns creation
/// and deletion. The scheduled instant stays raw here and is resolved once
/// by [`normalize_appointment`]. Optional contact fields are explicit
/// members, not absent keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Unique visit identifier.
    pub id: String,
    /// Stable patient reference (PESEL).
    pub patient_ref: String,
    /// Patient display name.
    pub patient_name: String,
    /// Raw scheduled instant as stored: date, optionally with time.
    pub scheduled: String,
    /// Patient phone number, if recorded.
    pub phone: Option<String>,
    /// Patient email, if recorded.
    pub email: Option<String>,
    /// Procedure names planned for the visit.
    pub procedures: Vec<String>,
    /// Free-text visit notes.
    pub notes: Option<String>,
}

impl Appointment {
    /// Creates an appointment with the required fields.
    pub fn new(
        id: impl Into<String>,
        patient_ref: impl Into<String>,
        patient_name: impl Into<String>,
        scheduled: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            patient_ref: patient_ref.into(),
            patient_name: patient_name.into(),
            scheduled: scheduled.into(),
            phone: None,
            email: None,
            procedures: Vec::new(),
            notes: None,
        }
    }

    /// Builder method to set the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Builder method to set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Builder method to set the procedure list.
    pub fn with_procedures(mut self, procedures: Vec<String>) -> Self {
        self.procedures = procedures;
        self
    }

    /// Builder method to set the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// The stable identity of this appointment.
    ///
    /// Depends only on identity-bearing fields, so edits to notes or
    /// procedures never change it.
    pub fn uid(&self) -> String {
        visit_uid(&self.id, &self.patient_ref)
    }
}

/// The canonical calendar event used for merge, export and sync.
///
/// Invariant: `end > start`; both are local wall clock in the clinic
/// timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Stable identifier: the clinic UID for local events, the opaque
    /// remote identifier for remote ones.
    pub uid: String,
    /// Origin of the event.
    pub source: EventSource,
    /// Start instant, local wall clock.
    pub start: NaiveDateTime,
    /// End instant, local wall clock.
    pub end: NaiveDateTime,
    /// Event title.
    pub title: String,
    /// Assembled description, if any.
    pub description: Option<String>,
    /// Location, if any.
    pub location: Option<String>,
    /// Event status.
    pub status: EventStatus,
    /// Whether schedule normalization had to apply the fallback slot.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub used_fallback: bool,
}

impl NormalizedEvent {
    /// Creates an event with the required fields.
    pub fn new(
        uid: impl Into<String>,
        source: EventSource,
        start: NaiveDateTime,
        end: NaiveDateTime,
        title: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            source,
            start,
            end,
            title: title.into(),
            description: None,
            location: None,
            status: EventStatus::Confirmed,
            used_fallback: false,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Duration of the event in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Normalizes a local appointment into a [`NormalizedEvent`].
///
/// The schedule string is resolved here, once; malformed schedules fall
/// back to today's default slot and mark the event with `used_fallback`.
/// The description carries only the fields the record actually has.
pub fn normalize_appointment(
    appointment: &Appointment,
    config: &ClinicConfig,
    now: NaiveDateTime,
) -> NormalizedEvent {
    let schedule = normalize_schedule_with(
        &appointment.scheduled,
        now,
        config.default_visit_hour,
        chrono::Duration::minutes(config.visit_duration_minutes),
    );

    let title = format!("Wizyta: {}", appointment.patient_name);

    let mut event = NormalizedEvent::new(
        appointment.uid(),
        EventSource::Local,
        schedule.start,
        schedule.end,
        title,
    )
    .with_description(assemble_description(appointment))
    .with_location(config.location.clone());
    event.used_fallback = schedule.fallback;
    event
}

/// Assembles the visit description from the fields that are present.
fn assemble_description(appointment: &Appointment) -> String {
    let mut lines = vec![
        format!("Pacjent: {}", appointment.patient_name),
        format!("PESEL: {}", appointment.patient_ref),
    ];
    if let Some(ref phone) = appointment.phone {
        lines.push(format!("Telefon: {phone}"));
    }
    if let Some(ref email) = appointment.email {
        lines.push(format!("Email: {email}"));
    }
    if !appointment.procedures.is_empty() {
        lines.push(format!("Zabiegi: {}", appointment.procedures.join(", ")));
    }
    if let Some(ref notes) = appointment.notes {
        lines.push(format!("Uwagi: {notes}"));
    }
    lines.join("\n")
}
