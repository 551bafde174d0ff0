use hostwatch_core::{MonitorEngine, Notifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` fires.
pub fn start(
    engine: MonitorEngine,
    notifier: Arc<dyn Notifier>,
    destination: String,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        engine.run_forever(interval, notifier, destination, cancel).await;
        tracing::info!("Monitor service stopped");
    })
}
