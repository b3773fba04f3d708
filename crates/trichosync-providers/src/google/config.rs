//! Google Calendar backend configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the Google Calendar backend.
///
/// The OAuth client id/secret come from a registered application; the
/// consent flow that produces the initial credential is an external
/// collaborator, this backend only consumes and refreshes tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Calendar to sync against ("primary" for the account's main calendar).
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// IANA timezone sent with event bodies; must match the clinic timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// OAuth 2.0 client ID.
    pub client_id: String,
    /// OAuth 2.0 client secret.
    pub client_secret: String,
    /// HTTP request timeout.
    #[serde(default = "default_timeout", with = "humantime_secs")]
    pub timeout: Duration,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_timezone() -> String {
    "Europe/Warsaw".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serde helper: timeout as integer seconds.
mod humantime_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl GoogleConfig {
    /// Creates a config with defaults for everything but the OAuth client.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            calendar_id: default_calendar_id(),
            timezone: default_timezone(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: default_timeout(),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("client_id must not be empty".to_string());
        }
        if self.client_secret.is_empty() {
            return Err("client_secret must not be empty".to_string());
        }
        if self.calendar_id.is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GoogleConfig::new("id", "secret");
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.timezone, "Europe/Warsaw");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_empty_client() {
        assert!(GoogleConfig::new("", "secret").validate().is_err());
        assert!(GoogleConfig::new("id", "").validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: GoogleConfig =
            serde_json::from_str(r#"{"client_id": "id", "client_secret": "secret"}"#).unwrap();
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
