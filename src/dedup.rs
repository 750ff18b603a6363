//! Admission control for drag-and-drop launches.
//!
//! A key is held from the moment a launch is attempted until the engine call
//! for that launch settles. While held, further launches for the same
//! source/destination pair are refused.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::transfer_state::TransferKey;

#[derive(Default)]
struct HeldKeys {
    keys: HashSet<TransferKey>,
    revision: u64,
}

impl HeldKeys {
    fn stage(&mut self) -> (u64, BTreeSet<String>) {
        self.revision += 1;
        let targets = self.keys.iter().map(TransferKey::target).collect();
        (self.revision, targets)
    }
}

// `targets` is written only after `held` is unlocked.
struct GuardInner {
    held: Mutex<HeldKeys>,
    targets: watch::Sender<BTreeSet<String>>,
    published_revision: AtomicU64,
}

/// Set of keys with an outstanding launch. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DedupGuard {
    inner: Arc<GuardInner>,
}

impl DedupGuard {
    pub fn new() -> Self {
        let (targets, _) = watch::channel(BTreeSet::new());
        Self {
            inner: Arc::new(GuardInner {
                held: Mutex::new(HeldKeys::default()),
                targets,
                published_revision: AtomicU64::new(0),
            }),
        }
    }

    /// Marks `key` as held. Returns `false` without side effects if it already is.
    pub fn try_acquire(&self, key: &TransferKey) -> bool {
        let staged = {
            let mut held = self.inner.held.lock();
            if !held.keys.insert(key.clone()) {
                return false;
            }
            held.stage()
        };
        self.publish(staged);
        true
    }

    /// Clears the hold on `key`, whether or not it was held.
    pub fn release(&self, key: &TransferKey) {
        let staged = {
            let mut held = self.inner.held.lock();
            if !held.keys.remove(key) {
                return;
            }
            held.stage()
        };
        self.publish(staged);
    }

    /// Acquires `key` and returns a hold that releases it when dropped.
    pub fn try_hold(&self, key: TransferKey) -> Option<DedupHold> {
        if self.try_acquire(&key) {
            Some(DedupHold {
                guard: self.clone(),
                key: Some(key),
            })
        } else {
            None
        }
    }

    pub fn is_pending(&self, key: &TransferKey) -> bool {
        self.inner.held.lock().keys.contains(key)
    }

    /// Drop targets (`"<destRemote>:<destPath>"`) with a launch outstanding.
    pub fn pending_targets(&self) -> BTreeSet<String> {
        self.inner.targets.borrow().clone()
    }

    /// Change feed of [`pending_targets`](Self::pending_targets).
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.inner.targets.subscribe()
    }

    fn publish(&self, (revision, targets): (u64, BTreeSet<String>)) {
        let published = &self.inner.published_revision;
        self.inner.targets.send_if_modified(|current| {
            if revision <= published.load(Ordering::Relaxed) {
                return false;
            }
            published.store(revision, Ordering::Relaxed);
            *current = targets;
            true
        });
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII hold on a [`TransferKey`]. The key is released exactly once, on drop
/// or through [`DedupHold::release`].
pub struct DedupHold {
    guard: DedupGuard,
    key: Option<TransferKey>,
}

impl DedupHold {
    pub fn key(&self) -> Option<&TransferKey> {
        self.key.as_ref()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(key) = self.key.take() {
            self.guard.release(&key);
        }
    }
}

impl Drop for DedupHold {
    fn drop(&mut self) {
        self.release_inner();
    }
}
