//! Backup file naming and retention pruning.

use crate::utils::errors::Result;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// `<prefix>_<YYYYMMDD>_<HHMMSS>.<extension>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupNaming {
    pub prefix: String,
    pub extension: String,
}

impl Default for BackupNaming {
    fn default() -> Self {
        Self {
            prefix: "website_backup".to_string(),
            extension: "zip".to_string(),
        }
    }
}

impl BackupNaming {
    pub fn file_name<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> String
    where
        Tz::Offset: Display,
    {
        format!("{}_{}.{}", self.prefix, at.format("%Y%m%d_%H%M%S"), self.extension)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() > self.prefix.len() + self.extension.len() + 2
            && file_name.starts_with(&self.prefix)
            && file_name[self.prefix.len()..].starts_with('_')
            && file_name.ends_with(&format!(".{}", self.extension))
    }
}

/// Delete all but the `max_backups` newest backups in `dir`.
///
/// Newest means latest modification time, ties broken by file name.
/// Returns the paths that were deleted.
pub fn prune_backups(dir: &Path, naming: &BackupNaming, max_backups: usize) -> Result<Vec<PathBuf>> {
    let mut backups: Vec<(PathBuf, SystemTime, String)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !naming.matches(&name) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        backups.push((entry.path(), modified, name));
    }

    backups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.cmp(&a.2)));

    let mut deleted = Vec::new();
    for (path, _, name) in backups.into_iter().skip(max_backups) {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(file = %name, "Removed old backup");
                deleted.push(path);
            }
            Err(e) => warn!(file = %name, error = %e, "Failed to remove old backup"),
        }
    }
    Ok(deleted)
}
