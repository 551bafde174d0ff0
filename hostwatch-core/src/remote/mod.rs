//! Remote shell / file-transfer sessions.
//!
//! Engines only depend on [`Connector`] and [`RemoteFs`]; the SSH
//! implementation lives in [`ssh`].

pub mod credential;
pub mod ssh;

use crate::utils::errors::Result;
use std::io::{Read, Write};

pub use credential::RemoteCredential;
pub use ssh::{SshConnector, SshSession};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    /// Symlinks, sockets, devices. Never mirrored.
    Other,
}

impl EntryKind {
    /// Classify by the file-type bits of a POSIX mode.
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFDIR => EntryKind::Directory,
            S_IFREG => EntryKind::File,
            _ => EntryKind::Other,
        }
    }
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Operations available on an open session.
pub trait RemoteFs {
    /// Entries of `path`, excluding `.` and `..`.
    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    fn stat(&self, path: &str) -> Result<RemoteEntry>;

    /// Stream the remote file into `dest`, returning bytes copied.
    fn download(&self, path: &str, dest: &mut dyn Write) -> Result<u64>;

    /// Replace the remote file with the contents of `src`, returning bytes copied.
    fn upload(&self, path: &str, src: &mut dyn Read) -> Result<u64>;

    fn exec(&self, command: &str) -> Result<CommandOutput>;
}

/// Opens a fresh session per call. Sessions are never pooled.
pub trait Connector: Send + Sync {
    type Session: RemoteFs;

    fn connect(&self) -> Result<Self::Session>;
}

/// Join remote path segments with `/` regardless of the local platform.
pub fn join_remote(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! A [`RemoteFs`] backed by a local directory, for exercising the
    //! engines without an SSH server.

    use super::*;
    use crate::utils::errors::WatchError;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// Hands out [`LocalRemote`] sessions rooted at one local directory.
    #[derive(Clone)]
    pub struct LocalConnector {
        root: PathBuf,
        /// Remote paths whose download or listing fails with an I/O error.
        pub broken: HashSet<String>,
        pub exit_status: i32,
        /// `upload <path>` / `exec <command>` lines, across all sessions.
        pub journal: Arc<Mutex<Vec<String>>>,
    }

    impl LocalConnector {
        pub fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                broken: HashSet::new(),
                exit_status: 0,
                journal: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn journal(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }
    }

    impl Connector for LocalConnector {
        type Session = LocalRemote;

        fn connect(&self) -> Result<LocalRemote> {
            Ok(LocalRemote { config: self.clone() })
        }
    }

    /// Always fails to authenticate.
    pub struct RefusingConnector;

    impl Connector for RefusingConnector {
        type Session = LocalRemote;

        fn connect(&self) -> Result<LocalRemote> {
            Err(WatchError::Auth("SSH authentication failed".into()))
        }
    }

    pub struct LocalRemote {
        config: LocalConnector,
    }

    impl LocalRemote {
        fn local(&self, path: &str) -> PathBuf {
            self.config.root.join(path.trim_start_matches('/'))
        }

        fn check_broken(&self, path: &str) -> Result<()> {
            if self.config.broken.contains(path) {
                return Err(WatchError::RemoteIo(format!("{path}: permission denied")));
            }
            Ok(())
        }

        fn map_err(path: &str, e: std::io::Error) -> WatchError {
            if e.kind() == std::io::ErrorKind::NotFound {
                WatchError::NotFound(path.to_string())
            } else {
                WatchError::RemoteIo(format!("{path}: {e}"))
            }
        }

        fn entry(name: String, meta: &std::fs::Metadata) -> RemoteEntry {
            use std::os::unix::fs::MetadataExt;
            RemoteEntry {
                name,
                kind: EntryKind::from_mode(meta.mode()),
                mode: meta.mode(),
                size: meta.len(),
            }
        }

        fn record(&self, line: String) {
            self.config.journal.lock().unwrap().push(line);
        }
    }

    impl RemoteFs for LocalRemote {
        fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
            self.check_broken(path)?;
            let mut entries = Vec::new();
            for item in std::fs::read_dir(self.local(path)).map_err(|e| Self::map_err(path, e))? {
                let item = item?;
                let meta = std::fs::symlink_metadata(item.path())?;
                entries.push(Self::entry(item.file_name().to_string_lossy().into_owned(), &meta));
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        }

        fn stat(&self, path: &str) -> Result<RemoteEntry> {
            let meta = std::fs::metadata(self.local(path)).map_err(|e| Self::map_err(path, e))?;
            Ok(Self::entry(path.to_string(), &meta))
        }

        fn download(&self, path: &str, dest: &mut dyn Write) -> Result<u64> {
            self.check_broken(path)?;
            let mut file = std::fs::File::open(self.local(path)).map_err(|e| Self::map_err(path, e))?;
            Ok(std::io::copy(&mut file, dest)?)
        }

        fn upload(&self, path: &str, src: &mut dyn Read) -> Result<u64> {
            let mut file = std::fs::File::create(self.local(path)).map_err(|e| Self::map_err(path, e))?;
            self.record(format!("upload {path}"));
            Ok(std::io::copy(src, &mut file)?)
        }

        fn exec(&self, command: &str) -> Result<CommandOutput> {
            self.record(format!("exec {command}"));
            let failed = self.config.exit_status != 0;
            Ok(CommandOutput {
                exit_status: self.config.exit_status,
                stdout: String::new(),
                stderr: if failed { "Failed to restart unit".to_string() } else { String::new() },
            })
        }
    }
}
