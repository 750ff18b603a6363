//! Orchestration and progress tracking for concurrent remote file transfers.
//!
//! Transfers (copy, move, sync, check) are executed by an external
//! [`TransferEngine`]. This crate decides which launches reach the engine,
//! tracks the progress the engine reports, and keeps a self-cleaning view of
//! active and recently finished transfers for a UI to render.

pub mod config;
pub mod controller;
pub mod dedup;
pub mod engine;
pub mod errors;
pub mod flags;
pub mod launcher;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod transfer_state;

pub use config::OrchestratorConfig;
pub use controller::TransferController;
pub use dedup::{DedupGuard, DedupHold};
pub use engine::TransferEngine;
pub use errors::{EngineError, OrchestratorError, OrchestratorResult};
pub use flags::TransferFlags;
pub use launcher::{DragItem, LaunchOrigin, TransferLauncher, TransferRequest};
pub use orchestrator::TransferOrchestrator;
pub use progress::{progress_channel, ProgressSender, ProgressTick};
pub use registry::{IngestOutcome, TrackedTransfer, TransferRegistry};
pub use transfer_state::{
    Location, TransferId, TransferKey, TransferOperation, TransferSnapshot, TransferStatus,
};
