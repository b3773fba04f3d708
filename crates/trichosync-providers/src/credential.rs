//! Credential lifecycle and storage.
//!
//! A [`Credential`] is created by the external authorization handshake,
//! refreshed transparently by the remote client when expired, and
//! invalidated on an irrecoverable auth failure. Storage sits behind the
//! [`CredentialStore`] trait so the orchestrator and tests can substitute
//! an in-memory fake for the durable file store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RemoteError, RemoteResult};

/// Connection state of the remote calendar, derived from the credential.
///
/// Exposed to callers instead of the raw tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No credential present; authorization has never completed or was
    /// invalidated.
    Disconnected,
    /// Credential present and not expired.
    Connected,
    /// Credential present but the access token has expired.
    Expired,
}

/// An OAuth credential for the remote calendar service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    pub access_token: String,
    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,
    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential from authorization response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        let expires_at = expires_in_secs.map(|secs| {
            // Subtract a buffer to refresh before actual expiry
            Utc::now() + Duration::seconds(secs) - Duration::seconds(60)
        });

        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            // No recorded expiry: assume valid
            None => false,
        }
    }

    /// Updates the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs
            .map(|secs| Utc::now() + Duration::seconds(secs) - Duration::seconds(60));
        self.last_refresh = Utc::now();
    }

    /// The connection state this credential implies.
    pub fn connection_state(&self) -> ConnectionState {
        if self.is_expired() {
            ConnectionState::Expired
        } else {
            ConnectionState::Connected
        }
    }
}

/// Durable credential storage.
pub trait CredentialStore: Send + Sync {
    /// Returns a clone of the current credential, if any.
    fn get(&self) -> Option<Credential>;

    /// Replaces the stored credential.
    fn set(&self, credential: Credential) -> RemoteResult<()>;

    /// Removes the stored credential (irrecoverable auth failure).
    fn clear(&self) -> RemoteResult<()>;

    /// The connection state implied by the stored credential.
    fn connection_state(&self) -> ConnectionState {
        match self.get() {
            None => ConnectionState::Disconnected,
            Some(credential) => credential.connection_state(),
        }
    }
}

/// File-backed credential store with an in-memory cache.
///
/// The credential is stored as JSON; writes go through a temp file and
/// rename so a crash never leaves a torn file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Option<Credential>>,
}

impl FileCredentialStore {
    /// Creates a store at the given path and loads any existing credential.
    pub fn open(path: impl Into<PathBuf>) -> RemoteResult<Self> {
        let store = Self {
            path: path.into(),
            cached: RwLock::new(None),
        };
        store.load()?;
        Ok(store)
    }

    /// Returns the storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> RemoteResult<bool> {
        if !self.path.exists() {
            debug!("no credential file at {:?}", self.path);
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            RemoteError::configuration(format!("failed to read credential file: {e}"))
        })?;
        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            RemoteError::configuration(format!("failed to parse credential file: {e}"))
        })?;

        info!("loaded credential from {:?}", self.path);
        *self.cached.write().unwrap() = Some(credential);
        Ok(true)
    }

    fn save(&self, credential: &Credential) -> RemoteResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RemoteError::configuration(format!("failed to create credential directory: {e}"))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| RemoteError::internal(format!("failed to serialize credential: {e}")))?;

        fs::write(&temp_path, &content).map_err(|e| {
            RemoteError::configuration(format!("failed to write credential file: {e}"))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            RemoteError::configuration(format!("failed to rename credential file: {e}"))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!("saved credential to {:?}", self.path);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.cached.read().unwrap().clone()
    }

    fn set(&self, credential: Credential) -> RemoteResult<()> {
        self.save(&credential)?;
        *self.cached.write().unwrap() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> RemoteResult<()> {
        *self.cached.write().unwrap() = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                RemoteError::configuration(format!("failed to remove credential file: {e}"))
            })?;
            info!("cleared credential at {:?}", self.path);
        }
        Ok(())
    }
}

/// In-memory credential store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    cached: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            cached: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.cached.read().unwrap().clone()
    }

    fn set(&self, credential: Credential) -> RemoteResult<()> {
        *self.cached.write().unwrap() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> RemoteResult<()> {
        *self.cached.write().unwrap() = None;
        Ok(())
    }
}
