//! Recursive remote-to-local mirroring.

use crate::remote::{join_remote, EntryKind, RemoteFs};
use crate::utils::errors::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of one mirror pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub files: usize,
    pub bytes: u64,
    /// Directories or files that could not be read, plus non-regular entries.
    pub skipped: usize,
    pub excluded: usize,
}

/// A name that can be joined onto a local path without escaping it.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn download_file<F: RemoteFs + ?Sized>(remote: &F, remote_path: &str, local_path: &Path) -> Result<u64> {
    let mut file = fs::File::create(local_path)?;
    match remote.download(remote_path, &mut file) {
        Ok(n) => Ok(n),
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(local_path);
            Err(e)
        }
    }
}

/// Copy the tree under `remote_root` into `local_root`.
///
/// Directories named in `exclude` are skipped at any depth. Failing to list
/// `remote_root` itself is an error; any deeper listing or download failure
/// is logged and that subtree or file is left out.
pub fn mirror_tree<F: RemoteFs + ?Sized>(
    remote: &F,
    remote_root: &str,
    local_root: &Path,
    exclude: &BTreeSet<String>,
) -> Result<MirrorReport> {
    let root_entries = remote.list_dir(remote_root)?;
    let mut report = MirrorReport::default();
    let mut pending: Vec<(String, PathBuf, _)> =
        vec![(remote_root.to_string(), local_root.to_path_buf(), root_entries)];

    while let Some((remote_dir, local_dir, entries)) = pending.pop() {
        fs::create_dir_all(&local_dir)?;

        for entry in entries {
            if !is_plain_name(&entry.name) {
                warn!(dir = %remote_dir, name = %entry.name, "Skipping entry with unsafe name");
                report.skipped += 1;
                continue;
            }

            let remote_path = join_remote(&remote_dir, &entry.name);
            let local_path = local_dir.join(&entry.name);

            match entry.kind {
                EntryKind::Directory if exclude.contains(&entry.name) => {
                    debug!(path = %remote_path, "Excluded directory");
                    report.excluded += 1;
                }
                EntryKind::Directory => match remote.list_dir(&remote_path) {
                    Ok(children) => pending.push((remote_path, local_path, children)),
                    Err(e) => {
                        warn!(path = %remote_path, error = %e, "Skipping unreadable directory");
                        report.skipped += 1;
                    }
                },
                EntryKind::File => match download_file(remote, &remote_path, &local_path) {
                    Ok(bytes) => {
                        report.files += 1;
                        report.bytes += bytes;
                    }
                    Err(e) => {
                        warn!(path = %remote_path, error = %e, "Skipping file that failed to download");
                        report.skipped += 1;
                    }
                },
                EntryKind::Other => {
                    debug!(path = %remote_path, mode = entry.mode, "Skipping non-regular entry");
                    report.skipped += 1;
                }
            }
        }
    }

    Ok(report)
}
