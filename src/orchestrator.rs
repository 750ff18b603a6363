//! Top-level handle tying the launcher, registry and controller together.
//!
//! One orchestrator is created per session with [`TransferOrchestrator::start`]
//! and torn down with [`TransferOrchestrator::shutdown`]. The presentation
//! layer only talks to this type: it reads through [`list`] and the change
//! feeds, and mutates only through `launch`, `cancel` and `dismiss`.
//!
//! [`list`]: TransferOrchestrator::list

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::OrchestratorConfig;
use crate::controller::TransferController;
use crate::dedup::DedupGuard;
use crate::engine::TransferEngine;
use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::launcher::{TransferLauncher, TransferRequest};
use crate::progress::{progress_channel, ProgressSender};
use crate::registry::{TrackedTransfer, TransferRegistry};
use crate::transfer_state::{TransferId, TransferSnapshot};

pub struct TransferOrchestrator {
    config: OrchestratorConfig,
    registry: TransferRegistry,
    launcher: TransferLauncher,
    controller: TransferController,
    progress: ProgressSender,
    ingest_task: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl TransferOrchestrator {
    /// Builds the orchestrator and starts its ingest loop on the current runtime.
    pub fn start(
        engine: Arc<dyn TransferEngine>,
        config: OrchestratorConfig,
    ) -> OrchestratorResult<Self> {
        let registry = TransferRegistry::new(&config)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| OrchestratorError::Runtime(e.to_string()))?;

        let guard = DedupGuard::new();
        let launcher = TransferLauncher::new(engine.clone(), guard);
        let controller = TransferController::new(engine, registry.clone());

        let (progress, progress_rx) = progress_channel(config.progress_channel_capacity);
        let ingest_registry = registry.clone();
        let ingest_task =
            runtime.spawn(async move { ingest_registry.run_ingest(progress_rx).await });

        info!(
            grace_period_ms = config.grace_period_ms,
            channel_capacity = config.progress_channel_capacity,
            "Transfer orchestrator started"
        );

        Ok(Self {
            config,
            registry,
            launcher,
            controller,
            progress,
            ingest_task: Mutex::new(Some(ingest_task)),
            running: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sender the engine adapter publishes progress snapshots through.
    pub fn progress_sender(&self) -> ProgressSender {
        self.progress.clone()
    }

    pub fn registry(&self) -> &TransferRegistry {
        &self.registry
    }

    pub async fn launch(&self, request: TransferRequest) -> OrchestratorResult<Option<TransferId>> {
        self.ensure_running()?;
        self.launcher.launch(request).await
    }

    pub async fn cancel(&self, id: &TransferId) -> OrchestratorResult<bool> {
        self.ensure_running()?;
        self.controller.cancel(id).await
    }

    pub fn dismiss(&self, id: &TransferId) -> bool {
        self.controller.dismiss(id)
    }

    pub fn list(&self) -> Vec<TransferSnapshot> {
        self.registry.list()
    }

    pub fn get(&self, id: &TransferId) -> Option<TrackedTransfer> {
        self.registry.get(id)
    }

    pub fn subscribe_transfers(&self) -> watch::Receiver<Vec<TransferSnapshot>> {
        self.registry.subscribe()
    }

    /// Drop targets with a drag-and-drop launch outstanding.
    pub fn pending_targets(&self) -> BTreeSet<String> {
        self.launcher.guard().pending_targets()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<BTreeSet<String>> {
        self.launcher.guard().subscribe()
    }

    /// Stops the ingest loop and drops all tracked state. Idempotent.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let task = self.ingest_task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        self.registry.shutdown();
        info!("Transfer orchestrator stopped");
    }

    fn ensure_running(&self) -> OrchestratorResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(OrchestratorError::NotRunning)
        }
    }
}

impl Drop for TransferOrchestrator {
    fn drop(&mut self) {
        if let Some(task) = self.ingest_task.get_mut().take() {
            task.abort();
        }
        self.registry.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::flags::TransferFlags;
    use crate::transfer_state::{Location, TransferOperation, TransferStatus};
    use async_trait::async_trait;

    struct EchoEngine;

    #[async_trait]
    impl TransferEngine for EchoEngine {
        async fn launch_transfer(
            &self,
            _operation: TransferOperation,
            _source: &Location,
            _destination: &Location,
            _flags: &TransferFlags,
        ) -> Result<TransferId, EngineError> {
            Ok(TransferId::new("t1"))
        }

        async fn cancel_transfer(&self, id: &TransferId) -> Result<bool, EngineError> {
            Err(EngineError::UnknownTransfer(id.clone()))
        }
    }

    fn request() -> TransferRequest {
        TransferRequest::dialog(
            TransferOperation::Check,
            Location::new("gdrive", "/a"),
            Location::new("s3", "/b"),
            TransferFlags::default(),
        )
    }

    #[test]
    fn test_start_requires_runtime() {
        let result = TransferOrchestrator::start(Arc::new(EchoEngine), OrchestratorConfig::default());
        assert!(matches!(result, Err(OrchestratorError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let config = OrchestratorConfig {
            progress_channel_capacity: 0,
            ..OrchestratorConfig::default()
        };
        let result = TransferOrchestrator::start(Arc::new(EchoEngine), config);
        assert!(matches!(result, Err(OrchestratorError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_progress_reaches_list() {
        let orchestrator =
            TransferOrchestrator::start(Arc::new(EchoEngine), OrchestratorConfig::default()).unwrap();
        let mut updates = orchestrator.subscribe_transfers();

        let id = orchestrator.launch(request()).await.unwrap().unwrap();
        assert!(orchestrator.list().is_empty());

        let snapshot = TransferSnapshot::new(id.clone(), TransferOperation::Check, "gdrive:/a", "s3:/b")
            .with_percentage(12.5);
        assert!(orchestrator.progress_sender().send(snapshot).await);

        updates.changed().await.unwrap();
        let list = orchestrator.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].status, TransferStatus::Running);
        assert!(orchestrator.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_cancel_unknown_reports_false() {
        let orchestrator =
            TransferOrchestrator::start(Arc::new(EchoEngine), OrchestratorConfig::default()).unwrap();
        assert!(!orchestrator.cancel(&"nope".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_stops_operations() {
        let orchestrator =
            TransferOrchestrator::start(Arc::new(EchoEngine), OrchestratorConfig::default()).unwrap();
        orchestrator.shutdown().await;
        orchestrator.shutdown().await;

        assert!(!orchestrator.is_running());
        assert!(matches!(
            orchestrator.launch(request()).await,
            Err(OrchestratorError::NotRunning)
        ));
        assert!(!orchestrator.progress_sender().send(
            TransferSnapshot::new("t1".into(), TransferOperation::Copy, "a:", "b:")
        ).await);
    }
}
