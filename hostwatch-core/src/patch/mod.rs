//! Remote hot patching: fetch a few files, substitute text, upload what
//! changed, and restart the application service.

pub mod rule;

use crate::remote::{join_remote, CommandOutput, Connector, EntryKind, RemoteFs};
use crate::utils::errors::{Result, WatchError};
use rule::{PatchRule, ENDPOINT_RULE};
use std::io::{Seek, SeekFrom, Write};
use tracing::{error, info, warn};

/// A file to patch, relative to the remote application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    pub path: String,
    /// A missing optional file is logged and tolerated.
    pub required: bool,
}

impl PatchFile {
    pub fn required(path: impl Into<String>) -> Self {
        Self { path: path.into(), required: true }
    }

    pub fn optional(path: impl Into<String>) -> Self {
        Self { path: path.into(), required: false }
    }
}

#[derive(Debug, Clone)]
pub struct PatchOptions {
    pub remote_dir: String,
    pub files: Vec<PatchFile>,
    pub rule: PatchRule,
    /// systemd unit restarted by [`PatchEngine::restart_service`].
    pub service_unit: String,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            remote_dir: "/var/www/student_app".to_string(),
            files: vec![
                PatchFile::required("app.py"),
                PatchFile::optional("templates/index.html"),
            ],
            rule: ENDPOINT_RULE,
            service_unit: "student_app.service".to_string(),
        }
    }
}

/// What a patch run did to each file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub patched: Vec<String>,
    pub unchanged: Vec<String>,
    pub missing: Vec<String>,
}

impl PatchReport {
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for path in &self.patched {
            lines.push(format!("Updated {path}"));
        }
        for path in &self.unchanged {
            lines.push(format!("No changes needed in {path}"));
        }
        for path in &self.missing {
            lines.push(format!("Skipped {path} (not found or unreadable)"));
        }
        lines.join("\n")
    }
}

pub struct PatchEngine<C> {
    connector: C,
    options: PatchOptions,
}

impl<C: Connector> PatchEngine<C> {
    pub fn new(connector: C, options: PatchOptions) -> Self {
        Self { connector, options }
    }

    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    pub fn restart_command(&self) -> String {
        format!("sudo systemctl restart {}", self.options.service_unit)
    }

    /// Patch every configured file. Blocking.
    ///
    /// Fails only when the session or the application directory is
    /// unavailable, or a required file cannot be processed. Files that need
    /// no change are not re-uploaded.
    pub fn apply_patch(&self) -> Result<PatchReport> {
        let session = self.connector.connect()?;
        let dir = &self.options.remote_dir;

        let entry = session.stat(dir)?;
        if entry.kind != EntryKind::Directory {
            return Err(WatchError::RemoteIo(format!("{dir} is not a directory")));
        }

        let mut report = PatchReport::default();
        for file in &self.options.files {
            let remote_path = join_remote(dir, &file.path);
            match self.patch_file(&session, &remote_path) {
                Ok(true) => {
                    info!(path = %remote_path, "Uploaded patched file");
                    report.patched.push(file.path.clone());
                }
                Ok(false) => {
                    info!(path = %remote_path, "No changes needed");
                    report.unchanged.push(file.path.clone());
                }
                Err(e) if !file.required => {
                    warn!(path = %remote_path, error = %e, "Skipping optional file");
                    report.missing.push(file.path.clone());
                }
                Err(e) => {
                    error!(path = %remote_path, error = %e, "Patch failed");
                    return Err(e);
                }
            }
        }
        Ok(report)
    }

    /// Returns whether the file was changed and uploaded.
    fn patch_file<S: RemoteFs>(&self, session: &S, remote_path: &str) -> Result<bool> {
        let mut local = tempfile::Builder::new()
            .prefix("hostwatch-patch-")
            .tempfile()?;
        session.download(remote_path, local.as_file_mut())?;

        let original = match String::from_utf8(std::fs::read(local.path())?) {
            Ok(text) => text,
            Err(_) => {
                warn!(path = %remote_path, "File is not valid UTF-8, leaving it untouched");
                return Ok(false);
            }
        };
        let Some(patched) = self.options.rule.apply(&original) else {
            return Ok(false);
        };

        let file = local.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(patched.as_bytes())?;
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;

        session.upload(remote_path, file)?;
        Ok(true)
    }

    /// Restart the application service. Ok iff the command exits 0. Blocking.
    pub fn restart_service(&self) -> Result<CommandOutput> {
        let session = self.connector.connect()?;
        let command = self.restart_command();
        let output = session.exec(&command)?;

        if output.success() {
            info!(unit = %self.options.service_unit, "Service restart completed");
            Ok(output)
        } else {
            error!(
                unit = %self.options.service_unit,
                status = output.exit_status,
                stderr = %output.stderr,
                "Service restart failed"
            );
            Err(WatchError::CommandFailed {
                status: output.exit_status,
                stderr: output.stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::{LocalConnector, RefusingConnector};
    use std::fs;
    use tempfile::TempDir;

    fn app_dir(app: &str, index: Option<&str>) -> std::io::Result<TempDir> {
        let remote = TempDir::new()?;
        let dir = remote.path().join("var/www/student_app");
        fs::create_dir_all(dir.join("templates"))?;
        fs::write(dir.join("app.py"), app)?;
        if let Some(index) = index {
            fs::write(dir.join("templates/index.html"), index)?;
        }
        Ok(remote)
    }

    fn read(remote: &TempDir, path: &str) -> String {
        fs::read_to_string(remote.path().join("var/www/student_app").join(path)).unwrap()
    }

    #[test]
    fn test_patches_and_uploads_changed_files() -> Result<()> {
        let remote = app_dir(
            "@app.route('/transaction', methods=['POST'])",
            Some("<form action=\"/transaction\">"),
        )?;
        let connector = LocalConnector::new(remote.path());
        let engine = PatchEngine::new(connector.clone(), PatchOptions::default());

        let report = engine.apply_patch()?;

        assert_eq!(report.patched, vec!["app.py", "templates/index.html"]);
        assert_eq!(read(&remote, "app.py"), "@app.route('/submit-transaction', methods=['POST'])");
        assert_eq!(read(&remote, "templates/index.html"), "<form action=\"/submit-transaction\">");
        assert_eq!(
            connector.journal(),
            vec![
                "upload /var/www/student_app/app.py",
                "upload /var/www/student_app/templates/index.html",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unchanged_file_is_not_uploaded() -> Result<()> {
        let remote = app_dir("@app.route('/')", Some("<p>hello</p>"))?;
        let connector = LocalConnector::new(remote.path());
        let engine = PatchEngine::new(connector.clone(), PatchOptions::default());

        let report = engine.apply_patch()?;

        assert!(report.patched.is_empty());
        assert_eq!(report.unchanged, vec!["app.py", "templates/index.html"]);
        assert!(connector.journal().is_empty());
        Ok(())
    }

    #[test]
    fn test_non_utf8_file_is_left_unchanged() -> Result<()> {
        let remote = app_dir("", Some("<p>hello</p>"))?;
        let app = remote.path().join("var/www/student_app/app.py");
        fs::write(&app, b"# caf\xe9\n@app.route('/transaction')\n")?;
        let connector = LocalConnector::new(remote.path());
        let engine = PatchEngine::new(connector.clone(), PatchOptions::default());

        let report = engine.apply_patch()?;

        assert_eq!(report.unchanged, vec!["app.py", "templates/index.html"]);
        assert!(connector.journal().is_empty());
        assert_eq!(fs::read(&app)?, b"# caf\xe9\n@app.route('/transaction')\n");
        Ok(())
    }

    #[test]
    fn test_missing_template_is_tolerated() -> Result<()> {
        let remote = app_dir("fetch('/transaction')", None)?;
        let engine = PatchEngine::new(LocalConnector::new(remote.path()), PatchOptions::default());

        let report = engine.apply_patch()?;

        assert_eq!(report.patched, vec!["app.py"]);
        assert_eq!(report.missing, vec!["templates/index.html"]);
        assert!(report.summary().contains("Skipped templates/index.html"));
        Ok(())
    }

    #[test]
    fn test_missing_app_dir_fails() -> Result<()> {
        let remote = TempDir::new()?;
        let engine = PatchEngine::new(LocalConnector::new(remote.path()), PatchOptions::default());
        assert!(matches!(engine.apply_patch(), Err(WatchError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_connection_failure_fails() {
        let engine = PatchEngine::new(RefusingConnector, PatchOptions::default());
        assert!(matches!(engine.apply_patch(), Err(WatchError::Auth(_))));
        assert!(matches!(engine.restart_service(), Err(WatchError::Auth(_))));
    }

    #[test]
    fn test_restart_runs_unit_command() -> Result<()> {
        let remote = TempDir::new()?;
        let connector = LocalConnector::new(remote.path());
        let engine = PatchEngine::new(connector.clone(), PatchOptions::default());

        assert!(engine.restart_service()?.success());
        assert_eq!(
            connector.journal(),
            vec!["exec sudo systemctl restart student_app.service"]
        );
        Ok(())
    }

    #[test]
    fn test_restart_nonzero_exit_is_failure() -> Result<()> {
        let remote = TempDir::new()?;
        let mut connector = LocalConnector::new(remote.path());
        connector.exit_status = 5;
        let engine = PatchEngine::new(connector, PatchOptions::default());

        match engine.restart_service() {
            Err(WatchError::CommandFailed { status, stderr }) => {
                assert_eq!(status, 5);
                assert_eq!(stderr, "Failed to restart unit");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
        Ok(())
    }
}
