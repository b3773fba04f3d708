//! iCal (RFC 5545) rendering of the visit calendar.
//!
//! Serialization only: [`render_calendar`] turns an ordered event sequence
//! into a complete VCALENDAR document and performs no I/O. Writing the
//! returned text to a file or HTTP response is the caller's concern.
//!
//! Timestamps are emitted as compact local wall-clock values with no zone
//! suffix; the calendar-level `X-WR-TIMEZONE` header names the fixed clinic
//! timezone (all-local-time policy).

use chrono::NaiveDateTime;

use crate::event::{ClinicConfig, NormalizedEvent};

/// Product identifier emitted in the calendar header.
const PRODID: &str = "-//Aplikacja Trychologa//Kalendarz Wizyt//PL";

/// Fixed category tag attached to every visit event.
const CATEGORIES: &str = "Medycyna,Wizyta";

/// Protocol-mandated line terminator, regardless of host platform.
const CRLF: &str = "\r\n";

/// Renders an ordered event sequence into a VCALENDAR document.
///
/// Pure function: the same input always yields byte-identical output.
pub fn render_calendar(events: &[NormalizedEvent], config: &ClinicConfig) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(&config.calendar_name)),
        format!("X-WR-TIMEZONE:{}", config.timezone),
    ];

    for event in events {
        push_vevent(&mut lines, event);
    }

    lines.push("END:VCALENDAR".to_string());
    lines.join(CRLF)
}

fn push_vevent(lines: &mut Vec<String>, event: &NormalizedEvent) {
    lines.push("BEGIN:VEVENT".to_string());
    lines.push(format!("UID:{}", event.uid));
    lines.push(format!("DTSTART:{}", format_instant(event.start)));
    lines.push(format!("DTEND:{}", format_instant(event.end)));
    lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
    if let Some(ref description) = event.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(ref location) = event.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    lines.push(format!("STATUS:{}", event.status.as_ical()));
    lines.push(format!("CATEGORIES:{CATEGORIES}"));
    lines.push("END:VEVENT".to_string());
}

/// Formats a local instant as a compact iCal timestamp (no zone suffix).
pub fn format_instant(instant: NaiveDateTime) -> String {
    instant.format("%Y%m%dT%H%M%S").to_string()
}

/// Escapes free text for use in an iCal property value.
///
/// Backslash, semicolon and comma get a backslash prefix; embedded newlines
/// become the two-character literal `\n`; carriage returns are dropped.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}

/// Extracts the UID of every VEVENT in a rendered document.
///
/// Companion to [`render_calendar`] for verifying that an export carries
/// exactly the intended identities.
pub fn extract_uids(document: &str) -> Vec<String> {
    document
        .lines()
        .filter_map(|line| line.strip_prefix("UID:"))
        .map(|uid| uid.trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Appointment, EventSource, normalize_appointment};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn sample_event(uid: &str, day: u32) -> NormalizedEvent {
        NormalizedEvent::new(
            uid,
            EventSource::Local,
            dt(2025, 3, day, 10, 0, 0),
            dt(2025, 3, day, 11, 0, 0),
            "Wizyta: Jane Doe",
        )
        .with_description("Pacjent: Jane Doe\nPESEL: 92060207477")
        .with_location("Gabinet trychologa")
    }

    #[test]
    fn renders_complete_document() {
        let config = ClinicConfig::default();
        let document = render_calendar(&[sample_event("visit-42-92060207477@trichosync.local", 10)], &config);

        assert!(document.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(document.ends_with("END:VCALENDAR"));
        assert!(document.contains("VERSION:2.0"));
        assert!(document.contains("CALSCALE:GREGORIAN"));
        assert!(document.contains("X-WR-CALNAME:Wizyty Trychologa"));
        assert!(document.contains("X-WR-TIMEZONE:Europe/Warsaw"));
        assert!(document.contains("UID:visit-42-92060207477@trichosync.local"));
        assert!(document.contains("DTSTART:20250310T100000"));
        assert!(document.contains("DTEND:20250310T110000"));
        assert!(document.contains("SUMMARY:Wizyta: Jane Doe"));
        assert!(document.contains("DESCRIPTION:Pacjent: Jane Doe\\nPESEL: 92060207477"));
        assert!(document.contains("LOCATION:Gabinet trychologa"));
        assert!(document.contains("STATUS:CONFIRMED"));
        assert!(document.contains("CATEGORIES:Medycyna,Wizyta"));
    }

    #[test]
    fn uses_crlf_terminators_only() {
        let document = render_calendar(&[sample_event("u1", 10)], &ClinicConfig::default());
        // No bare LF anywhere: every newline is part of a CRLF pair.
        assert_eq!(
            document.matches('\n').count(),
            document.matches("\r\n").count()
        );
    }

    #[test]
    fn empty_input_still_yields_valid_envelope() {
        let document = render_calendar(&[], &ClinicConfig::default());
        assert!(document.starts_with("BEGIN:VCALENDAR"));
        assert!(document.ends_with("END:VCALENDAR"));
        assert!(!document.contains("BEGIN:VEVENT"));
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_text("a;b,c\\d"), "a\\;b\\,c\\\\d");
        assert_eq!(escape_text("line one\nline two"), "line one\\nline two");
        assert_eq!(escape_text("crlf\r\nhere"), "crlf\\nhere");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn uid_roundtrip_recovers_input_identities() {
        let now = dt(2025, 1, 1, 8, 0, 0);
        let config = ClinicConfig::default();
        let appointments = vec![
            Appointment::new("42", "92060207477", "Jane Doe", "2025-03-10"),
            Appointment::new("43", "85010112345", "Adam Nowak", "2025-03-11 14:00:00"),
            Appointment::new("44", "92060207477", "Jane Doe", "2025-03-12"),
        ];

        let events: Vec<NormalizedEvent> = appointments
            .iter()
            .map(|a| normalize_appointment(a, &config, now))
            .collect();
        let document = render_calendar(&events, &config);

        let rendered: BTreeSet<String> = extract_uids(&document).into_iter().collect();
        let expected: BTreeSet<String> = appointments.iter().map(|a| a.uid()).collect();
        assert_eq!(rendered, expected);

        // Formatting is idempotent given the same input.
        assert_eq!(document, render_calendar(&events, &config));
    }
}
