//! User-initiated cancel and dismiss actions.
//!
//! Cancelling only asks the engine; the registry learns the outcome from the
//! engine's own terminal snapshot. Dismissing is purely local.

use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::TransferEngine;
use crate::errors::{EngineError, OrchestratorResult};
use crate::registry::TransferRegistry;
use crate::transfer_state::TransferId;

#[derive(Clone)]
pub struct TransferController {
    engine: Arc<dyn TransferEngine>,
    registry: TransferRegistry,
}

impl TransferController {
    pub fn new(engine: Arc<dyn TransferEngine>, registry: TransferRegistry) -> Self {
        Self { engine, registry }
    }

    /// Forwards a cancel request to the engine.
    ///
    /// Returns `Ok(false)` when the engine does not know `id` (already
    /// finished or never existed). Other engine failures are returned as errors.
    pub async fn cancel(&self, id: &TransferId) -> OrchestratorResult<bool> {
        match self.engine.cancel_transfer(id).await {
            Ok(accepted) => {
                info!(transfer_id = %id, accepted, "Cancellation requested");
                Ok(accepted)
            }
            Err(EngineError::UnknownTransfer(_)) => {
                warn!(transfer_id = %id, "Cancel requested for transfer unknown to engine");
                Ok(false)
            }
            Err(e) => {
                warn!(transfer_id = %id, error = %e, "Cancel request failed");
                Err(e.into())
            }
        }
    }

    /// Hides `id` from the registry immediately. Never contacts the engine.
    pub fn dismiss(&self, id: &TransferId) -> bool {
        self.registry.dismiss(id)
    }
}
