//! The sync orchestrator: pushes local visits to the remote calendar.
//!
//! One-directional push. Each run normalizes the handed-over visits,
//! consults the mapping store to decide create / update / skip, and walks
//! the list sequentially so a partial outage degrades to a partial run
//! instead of a failed one. At most one run is in flight at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use trichosync_core::{
    normalize_appointment, Appointment, ClinicConfig, NormalizedEvent, VisitWindow,
};
use trichosync_providers::{ConnectionState, RemoteCalendar, RemoteErrorCode, RemoteResult};

use crate::error::{SyncError, SyncResult};
use crate::mapping::{MappingStore, SyncMapping};
use crate::merge::combine_events;
use crate::run_lock::RunLock;
use crate::view::CalendarEntry;

/// Outcome counts of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Events created on the remote calendar.
    pub created: usize,
    /// Mapped events re-pushed because their content changed.
    pub updated: usize,
    /// Visits that needed no push: already mapped and unchanged, outside
    /// the requested window, or not attempted after an abort or
    /// cancellation.
    pub skipped: usize,
    /// Visits whose push failed; retried on the next run.
    pub failed: usize,
    /// The refresh token was rejected; a new consent flow is needed
    /// before any further pushes succeed.
    pub reauthorization_required: bool,
}

impl SyncReport {
    /// Total number of visits the run accounted for.
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// Cooperative cancellation handle for a sync run.
///
/// Checked between remote calls only; an in-flight request completes and
/// its result is recorded before the run winds down.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a fresh, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag. Cancellation is sticky; callers reset the flag
    /// before starting the next run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The sync engine.
pub struct SyncEngine {
    remote: Arc<dyn RemoteCalendar>,
    mappings: Arc<dyn MappingStore>,
    config: ClinicConfig,
    lock: RunLock,
    cancel: CancelFlag,
}

impl SyncEngine {
    /// Creates an engine over a remote backend and a mapping store.
    pub fn new(
        remote: Arc<dyn RemoteCalendar>,
        mappings: Arc<dyn MappingStore>,
        config: ClinicConfig,
    ) -> Self {
        Self {
            remote,
            mappings,
            config,
            lock: RunLock::default(),
            cancel: CancelFlag::new(),
        }
    }

    /// Builder method to share a run lock with other engine instances.
    pub fn with_run_lock(mut self, lock: RunLock) -> Self {
        self.lock = lock;
        self
    }

    /// A handle that cancels the current run when triggered.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The connection state of the remote calendar.
    pub fn connection_state(&self) -> ConnectionState {
        self.remote.connection_state()
    }

    /// Pushes the given visits to the remote calendar.
    ///
    /// With a window, only visits whose normalized start falls inside it
    /// are candidates; the rest count as skipped.
    ///
    /// Fails with [`SyncError::RunInProgress`] when another run holds the
    /// lease and [`SyncError::NotConnected`] when no credential is stored;
    /// both abort before any remote call. Per-visit failures land in the
    /// report instead: a transient outage fails that visit and the run
    /// moves on, while a rejected refresh token stops further attempts
    /// and flags the report.
    pub async fn run(
        &self,
        appointments: &[Appointment],
        window: Option<&VisitWindow>,
        now: NaiveDateTime,
    ) -> SyncResult<SyncReport> {
        let _guard = self.lock.try_acquire().ok_or(SyncError::RunInProgress)?;

        let mut report = SyncReport::default();

        match self.remote.connection_state() {
            ConnectionState::Disconnected => return Err(SyncError::NotConnected),
            ConnectionState::Expired => {
                // Refresh up front so the run starts with a live token
                if let Err(e) = self.remote.refresh_credential().await {
                    if e.code() == RemoteErrorCode::ReauthorizationRequired {
                        report.reauthorization_required = true;
                        report.skipped = appointments.len();
                        return Ok(report);
                    }
                    return Err(e.into());
                }
            }
            ConnectionState::Connected => {}
        }

        info!(count = appointments.len(), "starting sync run");

        for (index, appointment) in appointments.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("sync run cancelled, winding down");
                report.skipped += appointments.len() - index;
                break;
            }

            let event = normalize_appointment(appointment, &self.config, now);
            if let Some(window) = window {
                if !window.contains(event.start) {
                    report.skipped += 1;
                    continue;
                }
            }
            let hash = content_hash(&event);

            let abort = match self.mappings.get(&event.uid) {
                Some(mapping) if mapping.content_hash.as_deref() == Some(hash.as_str()) => {
                    debug!(uid = %event.uid, "visit unchanged, skipping");
                    report.skipped += 1;
                    false
                }
                Some(mapping) => self.push_update(&mapping.remote_id, &event, hash, &mut report)
                    .await?,
                None => self.push_create(&event, hash, &mut report).await?,
            };

            if abort {
                report.skipped += appointments.len() - index - 1;
                break;
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "sync run finished"
        );
        Ok(report)
    }

    /// Creates a remote event for an unmapped visit.
    ///
    /// Returns `Ok(true)` when the run must stop attempting pushes.
    async fn push_create(
        &self,
        event: &NormalizedEvent,
        hash: String,
        report: &mut SyncReport,
    ) -> SyncResult<bool> {
        match self.create_with_refresh(event).await {
            Ok(remote_id) => {
                self.mappings
                    .record(&event.uid, SyncMapping::new(remote_id, Some(hash)))?;
                report.created += 1;
                Ok(false)
            }
            Err(e) => match e.code() {
                RemoteErrorCode::Conflict => {
                    // The event already exists remotely; adopt it instead
                    // of failing
                    match e.existing_id() {
                        Some(existing) => {
                            info!(uid = %event.uid, remote_id = existing, "adopting remote duplicate");
                            self.mappings
                                .record(&event.uid, SyncMapping::new(existing, None))?;
                            report.created += 1;
                        }
                        None => {
                            warn!(uid = %event.uid, "duplicate reported without an identifier");
                            report.skipped += 1;
                        }
                    }
                    Ok(false)
                }
                RemoteErrorCode::ReauthorizationRequired => {
                    warn!("refresh token rejected, stopping further pushes");
                    report.reauthorization_required = true;
                    report.failed += 1;
                    Ok(true)
                }
                code => {
                    warn!(uid = %event.uid, code = %code, error = %e, "push failed");
                    report.failed += 1;
                    Ok(false)
                }
            },
        }
    }

    /// Re-pushes a mapped visit whose content changed.
    async fn push_update(
        &self,
        remote_id: &str,
        event: &NormalizedEvent,
        hash: String,
        report: &mut SyncReport,
    ) -> SyncResult<bool> {
        match self.update_with_refresh(remote_id, event).await {
            Ok(()) => {
                self.mappings
                    .record(&event.uid, SyncMapping::new(remote_id, Some(hash)))?;
                report.updated += 1;
                Ok(false)
            }
            Err(e) => match e.code() {
                RemoteErrorCode::ReauthorizationRequired => {
                    warn!("refresh token rejected, stopping further pushes");
                    report.reauthorization_required = true;
                    report.failed += 1;
                    Ok(true)
                }
                code => {
                    warn!(uid = %event.uid, code = %code, error = %e, "re-push failed");
                    report.failed += 1;
                    Ok(false)
                }
            },
        }
    }

    /// One create attempt, with a single refresh-and-retry on an expired
    /// token.
    async fn create_with_refresh(&self, event: &NormalizedEvent) -> RemoteResult<String> {
        match self.remote.create_event(event).await {
            Err(e) if e.code() == RemoteErrorCode::Unauthenticated => {
                debug!("access token expired, refreshing");
                self.remote.refresh_credential().await?;
                self.remote.create_event(event).await
            }
            other => other,
        }
    }

    /// One update attempt, with a single refresh-and-retry on an expired
    /// token.
    async fn update_with_refresh(
        &self,
        remote_id: &str,
        event: &NormalizedEvent,
    ) -> RemoteResult<()> {
        match self.remote.update_event(remote_id, event).await {
            Err(e) if e.code() == RemoteErrorCode::Unauthenticated => {
                debug!("access token expired, refreshing");
                self.remote.refresh_credential().await?;
                self.remote.update_event(remote_id, event).await
            }
            other => other,
        }
    }

    /// The combined calendar view: local visits plus remote events inside
    /// the window, with echoes of pushed visits suppressed.
    pub async fn combined_view(
        &self,
        appointments: &[Appointment],
        window: &VisitWindow,
        now: NaiveDateTime,
    ) -> SyncResult<Vec<CalendarEntry>> {
        let remote_events = self.remote.list_events(window).await?;
        let mapped: HashMap<String, String> = self
            .mappings
            .all()
            .into_iter()
            .map(|(uid, m)| (uid, m.remote_id))
            .collect();

        let combined = combine_events(
            appointments,
            &remote_events,
            &mapped,
            window,
            &self.config,
            now,
        );
        Ok(combined.iter().map(CalendarEntry::from).collect())
    }
}

/// Content hash of the pushed representation of an event.
///
/// Covers every field that lands on the remote calendar; identity fields
/// alone never change it.
pub fn content_hash(event: &NormalizedEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.title.as_bytes());
    hasher.update(b"\n");
    hasher.update(event.description.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(event.location.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(event.start.format("%Y-%m-%dT%H:%M:%S").to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(event.end.format("%Y-%m-%dT%H:%M:%S").to_string().as_bytes());

    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
