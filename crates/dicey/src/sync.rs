//! Client-side snapshot synchronization.
//!
//! Participants don't get pushed updates. Each one polls the current
//! snapshot on a fixed interval and reconciles it against what it already
//! has. [`SyncReconciler`] holds the cached copy and decides whether a
//! fetched snapshot is new, the same, or older than what it has.

use std::time::Duration;

use dicey_protocol::{Codec, ParticipantId, RoomCode, RoomSnapshot};
use dicey_room::RoomError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::{DecisionService, DiceyError, IdentitySource};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where snapshots come from. The service in-process, or something
/// that fetches them remotely.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(
        &self,
        code: &RoomCode,
    ) -> impl std::future::Future<Output = Result<RoomSnapshot, DiceyError>> + Send;
}

/// Reads snapshots straight from a [`DecisionService`] as one participant.
pub struct ServiceSource<I: IdentitySource, C: Codec> {
    service: DecisionService<I, C>,
    viewer: ParticipantId,
}

impl<I: IdentitySource, C: Codec> ServiceSource<I, C> {
    pub fn new(service: DecisionService<I, C>, viewer: ParticipantId) -> Self {
        Self { service, viewer }
    }
}

impl<I: IdentitySource, C: Codec> SnapshotSource for ServiceSource<I, C> {
    async fn fetch(&self, code: &RoomCode) -> Result<RoomSnapshot, DiceyError> {
        self.service.snapshot(self.viewer, code).await
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between polls.
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
        }
    }
}

/// How a fetched snapshot compared with the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing was cached; the snapshot was accepted.
    Initial,
    /// Same revision as the cache.
    Unchanged,
    /// Newer revision, now cached. `phase_changed` is set when the phase
    /// or the open flag moved, which is what views usually react to.
    Updated { phase_changed: bool },
    /// Older than the cache (a slow response overtaken by a newer one);
    /// ignored.
    Stale,
}

/// Keeps one participant's local copy of one room.
#[derive(Debug, Clone)]
pub struct SyncReconciler {
    code: RoomCode,
    cached: Option<RoomSnapshot>,
}

impl SyncReconciler {
    pub fn new(code: RoomCode) -> Self {
        Self { code, cached: None }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn cached(&self) -> Option<&RoomSnapshot> {
        self.cached.as_ref()
    }

    /// Folds `fresh` into the cache. Revisions only move forward.
    pub fn reconcile_with(&mut self, fresh: RoomSnapshot) -> SyncOutcome {
        let Some(cached) = &self.cached else {
            self.cached = Some(fresh);
            return SyncOutcome::Initial;
        };
        if fresh.revision < cached.revision {
            return SyncOutcome::Stale;
        }
        if fresh.revision == cached.revision {
            return SyncOutcome::Unchanged;
        }
        let phase_changed =
            fresh.room.phase != cached.room.phase || fresh.room.is_open != cached.room.is_open;
        self.cached = Some(fresh);
        SyncOutcome::Updated { phase_changed }
    }

    /// Fetches once from `source` and reconciles.
    pub async fn reconcile<S: SnapshotSource>(
        &mut self,
        source: &S,
    ) -> Result<SyncOutcome, DiceyError> {
        let fresh = source.fetch(&self.code).await?;
        Ok(self.reconcile_with(fresh))
    }

    /// Polls `source` on `config.interval` in a background task.
    ///
    /// Every accepted snapshot is published on the returned watch channel.
    /// The task ends when every receiver is dropped or the room is gone.
    /// Missed ticks are skipped rather than bunched up.
    pub fn spawn<S: SnapshotSource>(
        mut self,
        source: S,
        config: SyncConfig,
    ) -> (watch::Receiver<Option<RoomSnapshot>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(self.cached.clone());

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                match self.reconcile(&source).await {
                    Ok(SyncOutcome::Initial | SyncOutcome::Updated { .. }) => {
                        tx.send_replace(self.cached.clone());
                    }
                    Ok(outcome) => {
                        tracing::trace!(room = %self.code, ?outcome, "snapshot poll");
                    }
                    Err(DiceyError::Room(RoomError::NotFound(_))) => {
                        tracing::info!(room = %self.code, "room gone, stopping sync");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(room = %self.code, error = %e, "snapshot poll failed");
                    }
                }
            }
        });

        (rx, task)
    }
}
