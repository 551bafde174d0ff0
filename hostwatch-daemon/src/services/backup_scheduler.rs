use crate::services::backup_service;
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

/// One cron tick. Returns whether a backup was attempted.
pub async fn run_scheduled_backup(state: Arc<AppState>) -> bool {
    if state.backup_in_progress() {
        tracing::warn!("Skipping scheduled backup: backup already running");
        return false;
    }

    tracing::info!("Starting scheduled backup");
    let destination = state.backup_destination.clone();
    match backup_service::run_backup(state, destination).await {
        Ok(outcome) => outcome.is_some(),
        Err(e) => {
            tracing::error!(error = %e, "Scheduled backup failed");
            true
        }
    }
}

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    state: Arc<AppState>,
}

impl BackupScheduler {
    pub async fn new(state: Arc<AppState>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            state,
        })
    }

    pub async fn schedule_backup(&self, cron_expression: &str) -> anyhow::Result<()> {
        let state = self.state.clone();

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let state = state.clone();
            Box::pin(async move {
                run_scheduled_backup(state).await;
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = %cron_expression, "Backup scheduled");
        Ok(())
    }

    /// Schedule from `BACKUP_CRON` when both it and a credential are configured.
    pub async fn init_schedules(&self) -> anyhow::Result<()> {
        let Some(cron) = self.state.config.backup_cron.clone() else {
            return Ok(());
        };
        if self.state.snapshots.is_none() {
            tracing::warn!(cron = %cron, "BACKUP_CRON set but no SSH credential configured, not scheduling");
            return Ok(());
        }
        self.schedule_backup(&cron).await
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backup_service::STARTED_MESSAGE;
    use crate::state::testing::{self, PrebuiltArchive};
    use crate::state::LOG_DESTINATION;
    use hostwatch_core::notify::testing::{RecordingNotifier, Sent};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_tick_is_skipped_while_backup_runs() {
        let local = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = testing::with_backups(
            notifier.clone(),
            Arc::new(PrebuiltArchive(local.path().join("unused.zip"))),
        );

        let running = state.begin_backup().unwrap();
        assert!(!run_scheduled_backup(state.clone()).await);
        assert!(notifier.sent().is_empty());

        drop(running);
        assert!(!state.backup_in_progress());
    }

    #[tokio::test]
    async fn test_tick_delivers_to_backup_destination() {
        let local = TempDir::new().unwrap();
        let archive = local.path().join("website_backup_20240101_000000.zip");
        std::fs::write(&archive, b"PK\x05\x06").unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = testing::with_backups(notifier.clone(), Arc::new(PrebuiltArchive(archive)));

        assert!(run_scheduled_backup(state).await);

        let sent = notifier.sent();
        assert_eq!(
            sent[0],
            Sent::Notify {
                destination: LOG_DESTINATION.into(),
                text: STARTED_MESSAGE.into(),
            }
        );
        assert!(matches!(&sent[1], Sent::Attach { destination, .. } if destination == LOG_DESTINATION));
    }

    #[tokio::test]
    async fn test_no_cron_schedules_nothing() {
        let state = Arc::new(testing::state(Arc::new(RecordingNotifier::default())));
        let scheduler = BackupScheduler::new(state).await.unwrap();
        scheduler.init_schedules().await.unwrap();
    }
}
