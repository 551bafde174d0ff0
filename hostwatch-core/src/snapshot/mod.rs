//! Remote snapshot engine: mirror a remote tree, zip it, rotate old archives.

pub mod archive;
pub mod delivery;
pub mod mirror;
pub mod retention;

use crate::remote::Connector;
use crate::utils::errors::Result;
use chrono::{DateTime, Local};
use retention::BackupNaming;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info};

pub use delivery::{deliver_backup, ensure_attachable, DeliveryOutcome, MAX_ATTACHMENT_BYTES};
pub use mirror::MirrorReport;

/// Directory names never mirrored.
pub fn default_exclusions() -> BTreeSet<String> {
    ["venv", ".venv", "__pycache__"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Remote directory to mirror.
    pub remote_dir: String,
    /// Where finished archives are kept.
    pub backup_dir: PathBuf,
    pub max_backups: usize,
    pub exclude: BTreeSet<String>,
    pub naming: BackupNaming,
    /// Parent for the temporary mirror; the system temp dir when `None`.
    pub staging_dir: Option<PathBuf>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            remote_dir: "/var/www/html".to_string(),
            backup_dir: PathBuf::from("backups"),
            max_backups: 5,
            exclude: default_exclusions(),
            naming: BackupNaming::default(),
            staging_dir: None,
        }
    }
}

/// Creates archives of one remote directory.
///
/// Creation and pruning are serialized per engine so two concurrent backups
/// never race on the retention pass.
pub struct SnapshotEngine<C> {
    connector: C,
    options: SnapshotOptions,
    lock: Mutex<()>,
}

impl<C: Connector> SnapshotEngine<C> {
    pub fn new(connector: C, options: SnapshotOptions) -> Self {
        Self {
            connector,
            options,
            lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    /// Mirror, archive and prune. Blocking; run it off the async runtime.
    ///
    /// Returns the path of the new archive.
    pub fn create_backup(&self) -> Result<PathBuf> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let opts = &self.options;

        std::fs::create_dir_all(&opts.backup_dir)?;
        let mut builder = tempfile::Builder::new();
        builder.prefix("hostwatch-mirror-");
        let staging = match &opts.staging_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let report = {
            let session = self.connector.connect()?;
            mirror::mirror_tree(&session, &opts.remote_dir, staging.path(), &opts.exclude)?
        };
        info!(
            remote_dir = %opts.remote_dir,
            files = report.files,
            bytes = report.bytes,
            skipped = report.skipped,
            excluded = report.excluded,
            "Remote tree mirrored"
        );

        let dest = self.next_archive_path(&Local::now());
        let entries = archive::write_archive(staging.path(), &dest)?;
        info!(path = %dest.display(), entries, "Backup archive created");

        // The archive just written is the newest and always survives.
        let keep = opts.max_backups.max(1);
        if let Err(e) = retention::prune_backups(&opts.backup_dir, &opts.naming, keep) {
            error!(error = %e, "Retention pass failed");
        }

        Ok(dest)
    }

    /// Keep only the `max_backups` newest archives. Returns deleted paths.
    pub fn prune_retention(&self, max_backups: usize) -> Result<Vec<PathBuf>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        retention::prune_backups(&self.options.backup_dir, &self.options.naming, max_backups)
    }

    fn next_archive_path(&self, now: &DateTime<Local>) -> PathBuf {
        let naming = &self.options.naming;
        let base = naming.file_name(now);
        let mut path = self.options.backup_dir.join(&base);
        let stem = base.trim_end_matches(&format!(".{}", naming.extension)).to_string();
        let mut n = 1;
        while path.exists() {
            path = self
                .options
                .backup_dir
                .join(format!("{}_{}.{}", stem, n, naming.extension));
            n += 1;
        }
        path
    }
}
