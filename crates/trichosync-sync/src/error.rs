//! Error type for the sync engine.

use thiserror::Error;
use trichosync_providers::RemoteError;

/// An error from the sync engine.
///
/// Per-appointment remote failures never surface here; they are recorded
/// in the run report. This type covers run-level aborts and storage
/// failures only.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync run holds the lease; nothing was pushed.
    #[error("a sync run is already in progress")]
    RunInProgress,

    /// No credential is stored; the remote calendar was never connected
    /// or the connection was invalidated.
    #[error("remote calendar is not connected")]
    NotConnected,

    /// Reading or writing durable sync state failed.
    #[error("sync state storage failed: {0}")]
    Storage(String),

    /// A remote operation failed at run level (listing events for the
    /// combined view, or a pre-run credential refresh).
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// A specialized Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            SyncError::RunInProgress.to_string(),
            "a sync run is already in progress"
        );
        assert_eq!(
            SyncError::NotConnected.to_string(),
            "remote calendar is not connected"
        );
    }

    #[test]
    fn remote_errors_convert() {
        let err: SyncError = RemoteError::unavailable("down").into();
        assert!(matches!(err, SyncError::Remote(_)));
    }
}
