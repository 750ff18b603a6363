//! Boundary with the external transfer engine.
//!
//! The engine performs the actual byte-level work. It accepts or rejects a
//! transfer, hands back a [`TransferId`], and afterwards reports progress for
//! that id through the progress feed, never through this trait.

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::flags::TransferFlags;
use crate::transfer_state::{Location, TransferId, TransferOperation};

#[async_trait]
pub trait TransferEngine: Send + Sync + 'static {
    /// Starts a transfer. Resolves once the engine has accepted it, not when it finishes.
    async fn launch_transfer(
        &self,
        operation: TransferOperation,
        source: &Location,
        destination: &Location,
        flags: &TransferFlags,
    ) -> Result<TransferId, EngineError>;

    /// Asks the engine to stop a transfer. Fails with
    /// [`EngineError::UnknownTransfer`] if the engine no longer knows `id`.
    async fn cancel_transfer(&self, id: &TransferId) -> Result<bool, EngineError>;
}
