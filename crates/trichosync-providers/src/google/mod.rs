//! Google Calendar backend.
//!
//! Enabled with the `google` feature. [`GoogleCalendar`] implements
//! [`crate::RemoteCalendar`] over the Calendar API v3, refreshing OAuth
//! tokens through the configured [`crate::CredentialStore`].

mod calendar;
mod client;
mod config;

pub use calendar::GoogleCalendar;
pub use config::GoogleConfig;
