//! Launching transfers on the engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dedup::DedupGuard;
use crate::engine::TransferEngine;
use crate::errors::OrchestratorResult;
use crate::flags::TransferFlags;
use crate::transfer_state::{Location, TransferId, TransferKey, TransferOperation};

/// Where a launch request came from. Only drag-and-drop launches are deduplicated;
/// dialog launches are explicit and may overlap on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LaunchOrigin {
    Dialog,
    DragAndDrop { key: TransferKeyParts },
}

/// Raw source/destination components a drag-and-drop key is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferKeyParts {
    pub source: Location,
    pub target: Location,
}

impl TransferKeyParts {
    pub fn key(&self) -> TransferKey {
        TransferKey::new(self.source.clone(), self.target.clone())
    }
}

/// An item being dragged out of a remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragItem {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub operation: TransferOperation,
    pub source: Location,
    pub destination: Location,
    #[serde(default)]
    pub flags: TransferFlags,
    pub origin: LaunchOrigin,
}

impl TransferRequest {
    pub fn dialog(
        operation: TransferOperation,
        source: Location,
        destination: Location,
        flags: TransferFlags,
    ) -> Self {
        Self {
            operation,
            source,
            destination,
            flags,
            origin: LaunchOrigin::Dialog,
        }
    }

    /// Copies `item` into the folder `target` with default flags.
    pub fn drag_and_drop(item: DragItem, target: Location) -> Self {
        let destination = target.join(&item.name);
        Self {
            operation: TransferOperation::Copy,
            source: item.location.clone(),
            destination,
            flags: TransferFlags::default(),
            origin: LaunchOrigin::DragAndDrop {
                key: TransferKeyParts {
                    source: item.location,
                    target,
                },
            },
        }
    }

    /// The dedup key, present only for drag-and-drop requests.
    pub fn dedup_key(&self) -> Option<TransferKey> {
        match &self.origin {
            LaunchOrigin::Dialog => None,
            LaunchOrigin::DragAndDrop { key } => Some(key.key()),
        }
    }
}

/// Issues launch requests to the engine, deduplicating drag-and-drop launches.
#[derive(Clone)]
pub struct TransferLauncher {
    engine: Arc<dyn TransferEngine>,
    guard: DedupGuard,
}

impl TransferLauncher {
    pub fn new(engine: Arc<dyn TransferEngine>, guard: DedupGuard) -> Self {
        Self { engine, guard }
    }

    pub fn guard(&self) -> &DedupGuard {
        &self.guard
    }

    /// Launches `request` on the engine.
    ///
    /// Returns `Ok(None)` when a drag-and-drop launch for the same pair is
    /// already outstanding; the engine is not contacted in that case. The
    /// dedup hold lasts only until the engine call settles.
    pub async fn launch(&self, request: TransferRequest) -> OrchestratorResult<Option<TransferId>> {
        request.flags.validate()?;

        let _hold = match request.dedup_key() {
            Some(key) => match self.guard.try_hold(key.clone()) {
                Some(hold) => Some(hold),
                None => {
                    debug!(key = %key, "Launch already pending for this pair; ignoring drop");
                    return Ok(None);
                }
            },
            None => None,
        };

        let result = self
            .engine
            .launch_transfer(
                request.operation,
                &request.source,
                &request.destination,
                &request.flags,
            )
            .await;

        match result {
            Ok(id) => {
                info!(
                    transfer_id = %id,
                    operation = %request.operation,
                    source = %request.source,
                    destination = %request.destination,
                    "Transfer launched"
                );
                Ok(Some(id))
            }
            Err(e) => {
                warn!(
                    operation = %request.operation,
                    source = %request.source,
                    destination = %request.destination,
                    error = %e,
                    "Engine rejected transfer"
                );
                Err(e.into())
            }
        }
    }
}
