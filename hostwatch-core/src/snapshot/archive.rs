//! Deflate zip archives of a mirrored tree.

use crate::utils::errors::{Result, WatchError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive entry name for `path`: relative to `root`, `/`-separated.
pub fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| WatchError::Archive(format!("{} is outside {}", path.display(), root.display())))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| WatchError::Archive(format!("non UTF-8 path: {}", path.display())))?,
            ),
            _ => return Err(WatchError::Archive(format!("unexpected path component in {}", path.display()))),
        }
    }
    Ok(parts.join("/"))
}

/// Zip every regular file under `source` into `dest`, returning the entry count.
///
/// The archive is written beside `dest` first and renamed into place, so a
/// failure never leaves a truncated file under the final name.
pub fn write_archive(source: &Path, dest: &Path) -> Result<usize> {
    let partial = dest.with_extension("zip.partial");
    match write_zip(source, &partial) {
        Ok(count) => {
            std::fs::rename(&partial, dest)?;
            Ok(count)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn write_zip(source: &Path, path: &Path) -> Result<usize> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut count = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        zip.start_file(entry_name(source, entry.path())?, options)?;
        let mut file = File::open(entry.path())?;
        std::io::copy(&mut file, &mut zip)?;
        count += 1;
    }

    zip.finish()?.flush()?;
    Ok(count)
}
