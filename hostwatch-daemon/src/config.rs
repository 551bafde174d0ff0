use anyhow::{anyhow, bail, Context};
use hostwatch_core::monitor::target::Target;
use hostwatch_core::monitor::ProbeTimeouts;
use hostwatch_core::patch::PatchOptions;
use hostwatch_core::remote::credential::DEFAULT_SSH_PORT;
use hostwatch_core::remote::RemoteCredential;
use hostwatch_core::snapshot::SnapshotOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORTS: &str = "22:SSH,80:HTTP Website,443:HTTPS Website";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,

    pub monitor_host: String,
    pub monitor_ports: Vec<Target>,
    pub api_endpoint: Option<String>,
    pub check_interval: Duration,
    pub port_timeout: Duration,
    pub api_timeout: Duration,
    pub status_timeout: Duration,

    pub alert_webhook: Option<String>,
    pub backup_webhook: Option<String>,

    /// Remote features are disabled when `None`.
    pub ssh: Option<RemoteCredential>,

    pub backup_dir: PathBuf,
    pub max_backups: usize,
    pub backup_remote_dir: String,
    pub backup_cron: Option<String>,

    pub patch_remote_dir: String,
    pub restart_unit: String,
}

impl AppConfig {
    /// Read the process environment. `.env` loading happens in `main`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let monitor_host = get("MONITOR_HOST").ok_or_else(|| anyhow!("MONITOR_HOST is required"))?;
        let monitor_ports = parse_ports(get("MONITOR_PORTS").as_deref().unwrap_or(DEFAULT_PORTS))?;

        let alert_webhook = get("ALERT_WEBHOOK_URL");
        let backup_webhook = get("BACKUP_WEBHOOK_URL").or_else(|| alert_webhook.clone());

        let ssh = match (get("SSH_USERNAME"), get("SSH_KEY")) {
            (Some(username), Some(private_key)) => Some(RemoteCredential {
                host: get("SSH_HOST").unwrap_or_else(|| monitor_host.clone()),
                port: parse_or(&get, "SSH_PORT", DEFAULT_SSH_PORT)?,
                username,
                private_key,
                passphrase: get("SSH_KEY_PASSPHRASE"),
            }),
            (None, None) => None,
            _ => bail!("SSH_USERNAME and SSH_KEY must be set together"),
        };

        let max_backups = parse_or(&get, "MAX_BACKUPS", 5)?;
        if max_backups == 0 {
            bail!("MAX_BACKUPS must be at least 1");
        }

        Ok(Self {
            port: parse_or(&get, "PORT", 3000)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            monitor_host,
            monitor_ports,
            api_endpoint: get("MONITOR_API_ENDPOINT"),
            check_interval: Duration::from_secs(parse_or(&get, "CHECK_INTERVAL_SECS", 60)?),
            port_timeout: Duration::from_secs(parse_or(&get, "PORT_TIMEOUT_SECS", 2)?),
            api_timeout: Duration::from_secs(parse_or(&get, "API_TIMEOUT_SECS", 5)?),
            status_timeout: Duration::from_secs(parse_or(&get, "STATUS_TIMEOUT_SECS", 2)?),
            alert_webhook,
            backup_webhook,
            ssh,
            backup_dir: PathBuf::from(get("BACKUP_DIR").unwrap_or_else(|| "backups".into())),
            max_backups,
            backup_remote_dir: get("BACKUP_REMOTE_DIR").unwrap_or_else(|| "/var/www/html".into()),
            backup_cron: get("BACKUP_CRON"),
            patch_remote_dir: get("PATCH_REMOTE_DIR").unwrap_or_else(|| "/var/www/student_app".into()),
            restart_unit: get("RESTART_UNIT").unwrap_or_else(|| "student_app.service".into()),
        })
    }

    /// Ports in declared order, followed by the API endpoint when configured.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = self.monitor_ports.clone();
        if let Some(url) = &self.api_endpoint {
            targets.push(Target::endpoint(url.clone()));
        }
        targets
    }

    pub fn probe_timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts {
            port: self.port_timeout,
            endpoint: self.api_timeout,
        }
    }

    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            remote_dir: self.backup_remote_dir.clone(),
            backup_dir: self.backup_dir.clone(),
            max_backups: self.max_backups,
            ..SnapshotOptions::default()
        }
    }

    pub fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            remote_dir: self.patch_remote_dir.clone(),
            service_unit: self.restart_unit.clone(),
            ..PatchOptions::default()
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

/// Parse a `port[:label]` list such as `22:SSH,8080`.
pub fn parse_ports(raw: &str) -> anyhow::Result<Vec<Target>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (number, label) = item.split_once(':').unwrap_or((item, ""));
            let number: u16 = number
                .trim()
                .parse()
                .with_context(|| format!("invalid port in MONITOR_PORTS: {item:?}"))?;
            Ok(Target::port(number, label.trim()))
        })
        .collect()
}
