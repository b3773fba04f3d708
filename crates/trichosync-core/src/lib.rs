//! Core types: schedule normalization, event identity, iCal export.
//!
//! This crate holds the pure leaves of the clinic calendar subsystem:
//!
//! - [`time`] — schedule string parsing and the 10:00/1-hour defaults
//! - [`pesel`] — birth-date extraction from PESEL identifiers
//! - [`identity`] — stable, content-based visit UIDs
//! - [`event`] — [`Appointment`], [`NormalizedEvent`] and normalization
//! - [`ical`] — VCALENDAR rendering (serialization only, no I/O)
//! - [`tracing`] — shared tracing/logging setup

pub mod event;
pub mod ical;
pub mod identity;
pub mod pesel;
pub mod time;
pub mod tracing;

pub use event::{
    normalize_appointment, Appointment, ClinicConfig, EventSource, EventStatus, NormalizedEvent,
};
pub use ical::{escape_text, extract_uids, format_instant, render_calendar};
pub use identity::{is_clinic_uid, parse_visit_uid, visit_uid, UID_NAMESPACE};
pub use pesel::birth_date_from_pesel;
pub use time::{
    normalize_schedule, normalize_schedule_with, NormalizedSchedule, ScheduleInput, VisitWindow,
    DEFAULT_VISIT_HOUR,
};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
