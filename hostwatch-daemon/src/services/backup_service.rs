use crate::state::AppState;
use anyhow::anyhow;
use hostwatch_core::snapshot::{deliver_backup, DeliveryOutcome};
use std::sync::Arc;

pub const STARTED_MESSAGE: &str = "Creating backup... This may take some time.";
pub const FAILED_MESSAGE: &str = "Failed to create backup. Check server logs for details.";

/// Create a backup and deliver it to `destination`.
///
/// Returns `Ok(None)` when another backup is already running.
pub async fn run_backup(
    state: Arc<AppState>,
    destination: String,
) -> anyhow::Result<Option<DeliveryOutcome>> {
    let engine = state
        .snapshots
        .clone()
        .ok_or_else(|| anyhow!("no SSH credential configured"))?;
    let Some(_guard) = state.begin_backup() else {
        tracing::warn!("Backup already in progress, skipping");
        return Ok(None);
    };

    announce(&state, &destination, STARTED_MESSAGE).await;

    let created = tokio::task::spawn_blocking(move || engine.create_backup())
        .await
        .map_err(|e| anyhow!(e))?;
    let archive = match created {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(error = %e, "Backup creation failed");
            announce(&state, &destination, FAILED_MESSAGE).await;
            return Err(e.into());
        }
    };

    match deliver_backup(&*state.notifier, &destination, &archive).await {
        Ok(outcome) => Ok(Some(outcome)),
        Err(e) => {
            tracing::error!(path = %archive.display(), error = %e, "Backup delivery failed");
            announce(&state, &destination, &format!("Error during backup process: {e}")).await;
            Err(e.into())
        }
    }
}

async fn announce(state: &AppState, destination: &str, text: &str) {
    if let Err(e) = state.notifier.notify(destination, text).await {
        tracing::warn!(error = %e, "Failed to post backup status");
    }
}
