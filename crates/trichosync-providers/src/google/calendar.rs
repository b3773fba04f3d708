//! Google Calendar backend implementing [`RemoteCalendar`].
//!
//! Wraps the low-level API client with the credential lifecycle: the
//! access token is pulled from the [`CredentialStore`], refreshed against
//! the OAuth token endpoint when expired, and invalidated when the refresh
//! token itself is rejected.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use trichosync_core::{NormalizedEvent, VisitWindow};

use crate::credential::{ConnectionState, CredentialStore};
use crate::error::{RemoteError, RemoteResult};
use crate::remote::{BoxFuture, RemoteCalendar, RemoteEvent};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;

/// OAuth 2.0 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google Calendar backend.
pub struct GoogleCalendar {
    config: GoogleConfig,
    credentials: Arc<dyn CredentialStore>,
    // Serializes API calls with token refreshes; a caller observing an
    // expired token waits for the in-flight refresh instead of issuing
    // a redundant one.
    client: Mutex<GoogleCalendarClient>,
    http_client: reqwest::Client,
}

impl GoogleCalendar {
    /// Creates a backend from a validated config and a credential store.
    pub fn new(config: GoogleConfig, credentials: Arc<dyn CredentialStore>) -> RemoteResult<Self> {
        config.validate().map_err(RemoteError::configuration)?;

        let access_token = credentials
            .get()
            .map(|c| c.access_token)
            .unwrap_or_default();
        let client = GoogleCalendarClient::new(access_token, config.timeout)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            credentials,
            client: Mutex::new(client),
            http_client,
        })
    }

    /// Fails fast when no credential is stored at all.
    fn ensure_credential(&self) -> RemoteResult<()> {
        if self.credentials.get().is_none() {
            return Err(RemoteError::unauthenticated("no stored credential"));
        }
        Ok(())
    }

    async fn do_refresh(&self) -> RemoteResult<()> {
        // Hold the client lock for the whole refresh so only one caller
        // talks to the token endpoint.
        let mut client = self.client.lock().await;

        let credential = self
            .credentials
            .get()
            .ok_or_else(|| RemoteError::unauthenticated("no stored credential"))?;

        if !credential.is_expired() {
            // Someone else refreshed while we waited for the lock
            client.set_access_token(&credential.access_token);
            return Ok(());
        }

        let refresh_token = credential.refresh_token.clone().ok_or_else(|| {
            RemoteError::reauthorization_required("credential has no refresh token")
        })?;

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| RemoteError::unavailable(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                // The refresh token is dead; drop the credential so the
                // connection reads as disconnected until re-consent.
                warn!("refresh token rejected, clearing stored credential");
                self.credentials.clear()?;
                return Err(RemoteError::reauthorization_required(
                    "refresh token rejected by authorization server",
                ));
            }
            return Err(RemoteError::unavailable(format!(
                "token endpoint error ({status}): {body}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::invalid_response(format!("failed to parse tokens: {e}")))?;

        let mut updated = credential;
        updated.update_access_token(&tokens.access_token, tokens.expires_in);
        client.set_access_token(&tokens.access_token);
        self.credentials.set(updated)?;

        info!("refreshed remote calendar access token");
        Ok(())
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

impl RemoteCalendar for GoogleCalendar {
    fn list_events(&self, window: &VisitWindow) -> BoxFuture<'_, RemoteResult<Vec<RemoteEvent>>> {
        let window = *window;
        Box::pin(async move {
            self.ensure_credential()?;
            let client = self.client.lock().await;
            client
                .list_events(&self.config.calendar_id, &window)
                .await
        })
    }

    fn create_event(&self, event: &NormalizedEvent) -> BoxFuture<'_, RemoteResult<String>> {
        let event = event.clone();
        Box::pin(async move {
            self.ensure_credential()?;
            let client = self.client.lock().await;
            client
                .insert_event(&self.config.calendar_id, &event, &self.config.timezone)
                .await
        })
    }

    fn update_event(
        &self,
        remote_id: &str,
        event: &NormalizedEvent,
    ) -> BoxFuture<'_, RemoteResult<()>> {
        let remote_id = remote_id.to_string();
        let event = event.clone();
        Box::pin(async move {
            self.ensure_credential()?;
            let client = self.client.lock().await;
            client
                .patch_event(
                    &self.config.calendar_id,
                    &remote_id,
                    &event,
                    &self.config.timezone,
                )
                .await
        })
    }

    fn refresh_credential(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(self.do_refresh())
    }

    fn connection_state(&self) -> ConnectionState {
        self.credentials.connection_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{Credential, MemoryCredentialStore};
    use crate::error::RemoteErrorCode;
    use chrono::NaiveDate;

    fn config() -> GoogleConfig {
        GoogleConfig::new("client-id", "client-secret")
    }

    #[test]
    fn rejects_invalid_config() {
        let store = Arc::new(MemoryCredentialStore::new());
        let err = GoogleCalendar::new(GoogleConfig::new("", ""), store).unwrap_err();
        assert_eq!(err.code(), RemoteErrorCode::Configuration);
    }

    #[test]
    fn connection_state_follows_store() {
        let store = Arc::new(MemoryCredentialStore::new());
        let calendar = GoogleCalendar::new(config(), store.clone()).unwrap();
        assert_eq!(calendar.connection_state(), ConnectionState::Disconnected);

        store
            .set(Credential::new("token", Some("refresh".to_string()), Some(3600)))
            .unwrap();
        assert_eq!(calendar.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn operations_fail_without_credential() {
        let store = Arc::new(MemoryCredentialStore::new());
        let calendar = GoogleCalendar::new(config(), store).unwrap();

        let window = VisitWindow::from_dates(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
        );
        let err = calendar.list_events(&window).await.unwrap_err();
        assert_eq!(err.code(), RemoteErrorCode::Unauthenticated);
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_requires_reauthorization() {
        let store = Arc::new(MemoryCredentialStore::with_credential({
            let mut c = Credential::new("token", None, Some(3600));
            c.expires_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));
            c
        }));
        let calendar = GoogleCalendar::new(config(), store).unwrap();

        let err = calendar.refresh_credential().await.unwrap_err();
        assert_eq!(err.code(), RemoteErrorCode::ReauthorizationRequired);
    }

    #[tokio::test]
    async fn refresh_is_a_noop_when_credential_is_valid() {
        let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
            "token",
            Some("refresh".to_string()),
            Some(3600),
        )));
        let calendar = GoogleCalendar::new(config(), store).unwrap();

        // Valid credential: no network call is made
        calendar.refresh_credential().await.unwrap();
    }
}
