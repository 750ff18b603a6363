//! Registry of live and recently finished transfers.
//!
//! The registry holds the latest snapshot per [`TransferId`] in first-seen
//! order. Snapshots arrive from the progress feed; once a transfer reaches a
//! terminal status it stays visible for a grace period and is then retired by
//! a one-shot timer. Terminal statuses are absorbing: any later snapshot for
//! the same id is counted and dropped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::errors::OrchestratorResult;
use crate::transfer_state::{TransferId, TransferSnapshot};

/// What [`TransferRegistry::ingest`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First snapshot for this id.
    Inserted,
    /// Existing running entry replaced.
    Updated,
    /// The snapshot moved the transfer into a terminal status; retirement is scheduled.
    Finished,
    /// The id already finished, or was retired or dismissed after finishing; nothing changed.
    StaleIgnored,
}

/// A registry entry together with its bookkeeping timestamps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTransfer {
    pub snapshot: TransferSnapshot,
    pub first_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct Entry {
    tracked: TrackedTransfer,
    retirement: Option<AbortHandle>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<TransferId, Entry>,
    order: Vec<TransferId>,
    tombstones: VecDeque<TransferId>,
    tombstone_set: HashSet<TransferId>,
    revision: u64,
}

/// A copy of the visible list, tagged with the revision it was taken at.
struct StagedView {
    revision: u64,
    snapshots: Vec<TransferSnapshot>,
}

impl RegistryState {
    fn stage(&mut self) -> StagedView {
        self.revision += 1;
        StagedView {
            revision: self.revision,
            snapshots: self.visible(),
        }
    }

    fn visible(&self) -> Vec<TransferSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.tracked.snapshot.clone())
            .collect()
    }

    fn remove(&mut self, id: &TransferId) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|other| other != id);
        Some(entry)
    }

    fn bury(&mut self, id: TransferId, capacity: usize) {
        if capacity == 0 || !self.tombstone_set.insert(id.clone()) {
            return;
        }
        self.tombstones.push_back(id);
        while self.tombstones.len() > capacity {
            if let Some(oldest) = self.tombstones.pop_front() {
                self.tombstone_set.remove(&oldest);
            }
        }
    }
}

// The state lock is never held while writing to `view`: readers may hold a
// borrow of the feed and call back into the registry.
struct RegistryShared {
    state: Mutex<RegistryState>,
    view: watch::Sender<Vec<TransferSnapshot>>,
    published_revision: AtomicU64,
    stale_updates: AtomicU64,
    grace_period: Duration,
    tombstone_capacity: usize,
}

impl RegistryShared {
    /// Publishes `staged` unless a later revision is already out.
    fn publish(&self, staged: StagedView) {
        let published = &self.published_revision;
        self.view.send_if_modified(|current| {
            if staged.revision <= published.load(Ordering::Relaxed) {
                return false;
            }
            published.store(staged.revision, Ordering::Relaxed);
            *current = staged.snapshots;
            true
        });
    }
}

/// Shared handle to the transfer registry. Clones refer to the same store.
#[derive(Clone)]
pub struct TransferRegistry {
    shared: Arc<RegistryShared>,
}

impl TransferRegistry {
    pub fn new(config: &OrchestratorConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        let (view, _) = watch::channel(Vec::new());
        Ok(Self {
            shared: Arc::new(RegistryShared {
                state: Mutex::new(RegistryState::default()),
                view,
                published_revision: AtomicU64::new(0),
                stale_updates: AtomicU64::new(0),
                grace_period: config.grace_period(),
                tombstone_capacity: config.tombstone_capacity,
            }),
        })
    }

    pub fn grace_period(&self) -> Duration {
        self.shared.grace_period
    }

    /// Records `snapshot` as the latest state of its transfer.
    pub fn ingest(&self, snapshot: TransferSnapshot) -> IngestOutcome {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let id = snapshot.id.clone();

        if state.tombstone_set.contains(&id) {
            return self.ignore_stale(&snapshot, "transfer already retired");
        }

        let now = Utc::now();
        let finishing = snapshot.is_finished();
        let outcome = match state.entries.get_mut(&id) {
            Some(entry) if entry.tracked.snapshot.is_finished() => {
                return self.ignore_stale(&snapshot, "transfer already finished");
            }
            Some(entry) => {
                entry.tracked.snapshot = snapshot;
                entry.tracked.updated_at = now;
                IngestOutcome::Updated
            }
            None => {
                state.entries.insert(
                    id.clone(),
                    Entry {
                        tracked: TrackedTransfer {
                            snapshot,
                            first_seen: now,
                            updated_at: now,
                            finished_at: None,
                        },
                        retirement: None,
                    },
                );
                state.order.push(id.clone());
                IngestOutcome::Inserted
            }
        };

        let outcome = if finishing {
            let retirement = self.schedule_retirement(id.clone());
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.tracked.finished_at = Some(now);
                entry.retirement = retirement;
                info!(
                    transfer_id = %id,
                    status = ?entry.tracked.snapshot.status,
                    "Transfer finished"
                );
            }
            IngestOutcome::Finished
        } else {
            outcome
        };

        let staged = state.stage();
        drop(guard);
        self.shared.publish(staged);
        outcome
    }

    /// Removes `id` immediately, whatever its status. Returns whether an entry was removed.
    ///
    /// A dismissed running transfer reappears with its next snapshot; a
    /// dismissed finished one is gone for good.
    pub fn dismiss(&self, id: &TransferId) -> bool {
        let staged = {
            let mut state = self.shared.state.lock();
            let Some(entry) = state.remove(id) else {
                return false;
            };
            if let Some(retirement) = entry.retirement {
                retirement.abort();
            }
            if entry.tracked.snapshot.is_finished() {
                state.bury(id.clone(), self.shared.tombstone_capacity);
            }
            state.stage()
        };
        self.shared.publish(staged);
        info!(transfer_id = %id, "Transfer dismissed");
        true
    }

    /// Currently visible snapshots, in first-seen order.
    pub fn list(&self) -> Vec<TransferSnapshot> {
        self.shared.state.lock().visible()
    }

    pub fn get(&self, id: &TransferId) -> Option<TrackedTransfer> {
        self.shared
            .state
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.tracked.clone())
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of snapshots dropped because their transfer had already finished.
    pub fn stale_updates(&self) -> u64 {
        self.shared.stale_updates.load(Ordering::Relaxed)
    }

    /// Change feed of [`list`](Self::list), republished after every visible mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TransferSnapshot>> {
        self.shared.view.subscribe()
    }

    /// Feeds every snapshot from `progress_rx` into the registry until the sender side closes.
    pub async fn run_ingest(&self, mut progress_rx: mpsc::Receiver<TransferSnapshot>) {
        while let Some(snapshot) = progress_rx.recv().await {
            self.ingest(snapshot);
        }
        debug!("Progress feed closed; ingest loop exiting");
    }

    pub fn spawn_ingest(&self, progress_rx: mpsc::Receiver<TransferSnapshot>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move { registry.run_ingest(progress_rx).await })
    }

    /// Cancels every pending retirement and forgets all entries.
    pub fn shutdown(&self) {
        let staged = {
            let mut state = self.shared.state.lock();
            for (_, entry) in state.entries.drain() {
                if let Some(retirement) = entry.retirement {
                    retirement.abort();
                }
            }
            state.order.clear();
            state.tombstones.clear();
            state.tombstone_set.clear();
            state.stage()
        };
        self.shared.publish(staged);
    }

    fn ignore_stale(&self, snapshot: &TransferSnapshot, reason: &str) -> IngestOutcome {
        self.shared.stale_updates.fetch_add(1, Ordering::Relaxed);
        debug!(
            transfer_id = %snapshot.id,
            status = ?snapshot.status,
            reason,
            "Ignoring stale progress update"
        );
        IngestOutcome::StaleIgnored
    }

    fn schedule_retirement(&self, id: TransferId) -> Option<AbortHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    transfer_id = %id,
                    "No async runtime; finished transfer stays until dismissed"
                );
                return None;
            }
        };
        let shared = Arc::downgrade(&self.shared);
        let grace_period = self.shared.grace_period;
        let task = runtime.spawn(async move {
            tokio::time::sleep(grace_period).await;
            Self::retire(shared, &id);
        });
        Some(task.abort_handle())
    }

    fn retire(shared: Weak<RegistryShared>, id: &TransferId) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let staged = {
            let mut state = shared.state.lock();
            let finished = state
                .entries
                .get(id)
                .is_some_and(|entry| entry.tracked.snapshot.is_finished());
            if !finished {
                return;
            }
            state.remove(id);
            state.bury(id.clone(), shared.tombstone_capacity);
            state.stage()
        };
        shared.publish(staged);
        info!(transfer_id = %id, "Finished transfer retired");
    }
}
