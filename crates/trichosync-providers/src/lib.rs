//! Remote calendar backends for the clinic sync service.
//!
//! This crate defines the [`RemoteCalendar`] capability trait the sync
//! engine depends on, the credential lifecycle around it, and the error
//! taxonomy the orchestrator branches on. Concrete backends are feature
//! gated; the `google` feature enables the Google Calendar implementation.

pub mod credential;
pub mod error;
pub mod remote;

#[cfg(feature = "google")]
pub mod google;

pub use credential::{
    ConnectionState, Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{RemoteError, RemoteErrorCode, RemoteResult};
pub use remote::{BoxFuture, RemoteCalendar, RemoteEvent};

#[cfg(feature = "google")]
pub use google::{GoogleCalendar, GoogleConfig};
