//! Merge engine and sync orchestrator for the clinic calendar.
//!
//! Sits between the patient-record store and a remote calendar backend:
//!
//! - [`merge`] — one combined, deduplicated event stream from both sources
//! - [`orchestrator`] — one-directional push of visits to the remote
//!   calendar, idempotent across runs
//! - [`mapping`] — durable local-to-remote event mappings
//! - [`run_lock`] — at-most-one-run-in-flight lease
//! - [`view`] — display-ready entries for the combined calendar

pub mod error;
pub mod mapping;
pub mod merge;
pub mod orchestrator;
pub mod run_lock;
pub mod view;

pub use error::{SyncError, SyncResult};
pub use mapping::{FileMappingStore, MappingStore, MemoryMappingStore, SyncMapping};
pub use merge::combine_events;
pub use orchestrator::{content_hash, CancelFlag, SyncEngine, SyncReport};
pub use run_lock::{RunGuard, RunLock, DEFAULT_LEASE_TTL};
pub use view::CalendarEntry;
