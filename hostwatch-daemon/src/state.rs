use crate::config::AppConfig;
use hostwatch_core::patch::PatchEngine;
use hostwatch_core::remote::{Connector, SshConnector};
use hostwatch_core::snapshot::SnapshotEngine;
use hostwatch_core::{Notifier, StatusChecker};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Destination used for log-only delivery.
pub const LOG_DESTINATION: &str = "log";

/// Produces a local backup archive. Blocking.
pub trait BackupEngine: Send + Sync {
    fn create_backup(&self) -> hostwatch_core::Result<PathBuf>;
}

impl<C: Connector> BackupEngine for SnapshotEngine<C> {
    fn create_backup(&self) -> hostwatch_core::Result<PathBuf> {
        SnapshotEngine::create_backup(self)
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub notifier: Arc<dyn Notifier>,
    pub status: StatusChecker,
    pub snapshots: Option<Arc<dyn BackupEngine>>,
    pub patcher: Option<Arc<PatchEngine<SshConnector>>>,
    pub alert_destination: String,
    pub backup_destination: String,
    pub started_at: Instant,
    backup_running: Arc<AtomicBool>,
}

/// Marks a backup as in progress until dropped.
pub struct BackupGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl AppState {
    pub fn new(config: AppConfig, notifier: Arc<dyn Notifier>, status: StatusChecker) -> Self {
        let (snapshots, patcher) = match &config.ssh {
            Some(credential) => {
                let connector = SshConnector::new(credential.clone());
                let snapshots: Arc<dyn BackupEngine> =
                    Arc::new(SnapshotEngine::new(connector.clone(), config.snapshot_options()));
                (
                    Some(snapshots),
                    Some(Arc::new(PatchEngine::new(connector, config.patch_options()))),
                )
            }
            None => (None, None),
        };

        let alert_destination = config
            .alert_webhook
            .clone()
            .unwrap_or_else(|| LOG_DESTINATION.to_string());
        let backup_destination = config
            .backup_webhook
            .clone()
            .unwrap_or_else(|| alert_destination.clone());

        Self {
            config,
            notifier,
            status,
            snapshots,
            patcher,
            alert_destination,
            backup_destination,
            started_at: Instant::now(),
            backup_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `None` while another backup holds the guard.
    pub fn begin_backup(&self) -> Option<BackupGuard> {
        self.backup_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BackupGuard {
                flag: self.backup_running.clone(),
            })
    }

    pub fn backup_in_progress(&self) -> bool {
        self.backup_running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use hostwatch_core::monitor::target::Target;
    use hostwatch_core::monitor::ProbeTimeouts;
    use hostwatch_core::probe::TargetProber;
    use hostwatch_core::MonitorEngine;
    use std::time::Duration;

    struct AllUp;

    #[async_trait]
    impl TargetProber for AllUp {
        async fn probe(&self, _target: &Target, _timeout: Duration) -> bool {
            true
        }
    }

    /// Returns a prebuilt archive instead of mirroring anything.
    pub struct PrebuiltArchive(pub PathBuf);

    impl BackupEngine for PrebuiltArchive {
        fn create_backup(&self) -> hostwatch_core::Result<PathBuf> {
            Ok(self.0.clone())
        }
    }

    /// State for host `10.0.0.5` with no credential and log-only destinations.
    pub fn state(notifier: Arc<dyn Notifier>) -> AppState {
        let config = AppConfig::from_lookup(|key| (key == "MONITOR_HOST").then(|| "10.0.0.5".to_string()))
            .unwrap();
        let engine = MonitorEngine::new(
            config.monitor_host.clone(),
            config.targets(),
            Arc::new(AllUp),
            ProbeTimeouts::default(),
        )
        .unwrap();
        AppState::new(config, notifier, engine.checker())
    }

    pub fn with_backups(notifier: Arc<dyn Notifier>, engine: Arc<dyn BackupEngine>) -> Arc<AppState> {
        let mut state = state(notifier);
        state.snapshots = Some(engine);
        Arc::new(state)
    }
}
