//! Pre-provisioned SSH credentials.

use crate::utils::errors::{Result, WatchError};
use std::fmt;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Key-based identity for the remote host. Opaque to logging.
#[derive(Clone)]
pub struct RemoteCredential {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Private key text. May carry literal `\n` sequences instead of line breaks.
    pub private_key: String,
    pub passphrase: Option<String>,
}

impl RemoteCredential {
    /// The key with literal `\n` escapes turned into real line breaks.
    pub fn normalized_key(&self) -> String {
        self.private_key.replace("\\n", "\n")
    }

    /// Reject key material that cannot possibly be a PEM/OpenSSH private key.
    pub fn validated_key(&self) -> Result<String> {
        let key = self.normalized_key();
        let trimmed = key.trim();
        if !trimmed.starts_with("-----BEGIN ") || !trimmed.contains("PRIVATE KEY-----") {
            return Err(WatchError::Auth("malformed private key material".into()));
        }
        if !trimmed.contains('\n') {
            return Err(WatchError::Auth("private key has no line breaks".into()));
        }
        Ok(key)
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("private_key", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
