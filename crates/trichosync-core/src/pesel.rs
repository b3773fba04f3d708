//! Birth-date extraction from PESEL identifiers.
//!
//! A PESEL is an 11-digit national identifier whose first six digits encode
//! the birth date: digits 0-1 are the year within the century, 2-3 the month
//! with a century offset, 4-5 the day. The month offset selects the century:
//!
//! | month field | century | offset |
//! |-------------|---------|--------|
//! | 01-12       | 1900s   | 0      |
//! | 21-32       | 2000s   | 20     |
//! | 41-52       | 2100s   | 40     |
//! | 61-72       | 1800s   | 60     |
//! | 81-92       | 1700s   | 80     |

use chrono::NaiveDate;

/// Extracts the birth date from a PESEL identifier.
///
/// Pure and total: malformed input (wrong length, non-digits, month field
/// outside every century band, day out of range for the resolved month)
/// yields `None`, never a panic or error.
pub fn birth_date_from_pesel(pesel: &str) -> Option<NaiveDate> {
    let pesel = pesel.trim();
    if pesel.len() != 11 || !pesel.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year_in_century: i32 = pesel[0..2].parse().ok()?;
    let month_field: u32 = pesel[2..4].parse().ok()?;
    let day: u32 = pesel[4..6].parse().ok()?;

    let (century, offset) = match month_field {
        1..=12 => (1900, 0),
        21..=32 => (2000, 20),
        41..=52 => (2100, 40),
        61..=72 => (1800, 60),
        81..=92 => (1700, 80),
        _ => return None,
    };

    let month = month_field - offset;
    NaiveDate::from_ymd_opt(century + year_in_century, month, day)
}
