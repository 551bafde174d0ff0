//! Handing finished archives to the notification sink.

use crate::notify::Notifier;
use crate::utils::errors::{Result, WatchError};
use std::path::Path;
use tracing::{info, warn};

/// Largest file the notification sink accepts as an attachment (25 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { size: u64 },
    TooLarge { size: u64 },
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Size of `path`, or `SizeLimitExceeded` when it cannot be attached.
pub fn ensure_attachable(path: &Path) -> Result<u64> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_ATTACHMENT_BYTES {
        return Err(WatchError::SizeLimitExceeded {
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(size)
}

/// Attach `archive` to a message in `destination`, unless it is over the limit.
pub async fn deliver_backup(
    notifier: &dyn Notifier,
    destination: &str,
    archive: &Path,
) -> Result<DeliveryOutcome> {
    let size = match ensure_attachable(archive) {
        Ok(size) => size,
        Err(WatchError::SizeLimitExceeded { size, .. }) => {
            warn!(path = %archive.display(), size, "Backup too large to attach");
            notifier
                .notify(
                    destination,
                    &format!("Backup file is too large ({:.2}MB) to send directly.", megabytes(size)),
                )
                .await?;
            return Ok(DeliveryOutcome::TooLarge { size });
        }
        Err(e) => return Err(e),
    };

    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup.zip".to_string());
    let bytes = tokio::fs::read(archive).await?;
    let text = format!(
        "Website backup created on {}:",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    notifier.attach_file(destination, &text, bytes, &file_name).await?;

    info!(file = %file_name, size, "Backup delivered");
    Ok(DeliveryOutcome::Sent { size })
}
