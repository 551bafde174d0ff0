//! SSH/SFTP sessions via libssh2.
//!
//! Host keys are not verified: the remote identity is accepted on every
//! connect, only the client authenticates.

use super::{CommandOutput, Connector, EntryKind, RemoteCredential, RemoteEntry, RemoteFs};
use crate::utils::errors::{Result, WatchError};
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// libssh2 `LIBSSH2_FX_NO_SUCH_FILE`.
const SFTP_NO_SUCH_FILE: i32 = 2;

fn remote_err(context: &str, e: ssh2::Error) -> WatchError {
    match e.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => WatchError::NotFound(context.to_string()),
        _ => WatchError::RemoteIo(format!("{context}: {e}")),
    }
}

fn entry_from_stat(name: String, stat: &FileStat) -> RemoteEntry {
    let mode = stat.perm.unwrap_or(0);
    RemoteEntry {
        name,
        kind: EntryKind::from_mode(mode),
        mode,
        size: stat.size.unwrap_or(0),
    }
}

/// Bytes read by one call, `None` when the stream had nothing ready.
fn read_some(stream: &mut impl Read, buf: &mut Vec<u8>) -> io::Result<Option<usize>> {
    let mut chunk = [0u8; 8192];
    match stream.read(&mut chunk) {
        Ok(n) => {
            buf.extend_from_slice(&chunk[..n]);
            Ok(Some(n))
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read two non-blocking streams to EOF, alternating between them so a
/// full buffer on one never stalls the other.
fn drain_streams(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    deadline: Instant,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        let mut progressed = false;
        if !out_done {
            match read_some(stdout, &mut out)? {
                Some(0) => out_done = true,
                Some(_) => progressed = true,
                None => {}
            }
        }
        if !err_done {
            match read_some(stderr, &mut err)? {
                Some(0) => err_done = true,
                Some(_) => progressed = true,
                None => {}
            }
        }
        if !progressed {
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "command output timed out"));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
    Ok((out, err))
}

/// Opens authenticated sessions for one credential.
#[derive(Debug, Clone)]
pub struct SshConnector {
    credential: RemoteCredential,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl SshConnector {
    pub fn new(credential: RemoteCredential) -> Self {
        Self {
            credential,
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
    }

    fn open_tcp(&self) -> Result<TcpStream> {
        let cred = &self.credential;
        let addrs = (cred.host.as_str(), cred.port)
            .to_socket_addrs()
            .map_err(|e| WatchError::Connection(format!("resolve {}: {}", cred.host, e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(WatchError::Connection(match last_err {
            Some(e) => format!("connect {}:{}: {}", cred.host, cred.port, e),
            None => format!("no addresses for {}", cred.host),
        }))
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    fn connect(&self) -> Result<SshSession> {
        let cred = &self.credential;
        let key = cred.validated_key()?;

        let tcp = self.open_tcp()?;
        let mut session = Session::new().map_err(|e| WatchError::Connection(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.io_timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| WatchError::Connection(format!("SSH handshake failed: {e}")))?;

        session
            .userauth_pubkey_memory(&cred.username, None, &key, cred.passphrase())
            .map_err(|e| WatchError::Auth(format!("SSH authentication failed: {e}")))?;
        if !session.authenticated() {
            return Err(WatchError::Auth("SSH authentication failed".into()));
        }

        info!(host = %cred.host, port = cred.port, "SSH session established");
        Ok(SshSession {
            session,
            sftp: RefCell::new(None),
            io_timeout: self.io_timeout,
        })
    }
}

/// An authenticated session. Closed when dropped.
pub struct SshSession {
    session: Session,
    sftp: RefCell<Option<Sftp>>,
    io_timeout: Duration,
}

impl SshSession {
    fn with_sftp<T>(&self, f: impl FnOnce(&Sftp) -> Result<T>) -> Result<T> {
        let mut slot = self.sftp.borrow_mut();
        if slot.is_none() {
            let sftp = self
                .session
                .sftp()
                .map_err(|e| remote_err("open SFTP channel", e))?;
            *slot = Some(sftp);
        }
        match slot.as_ref() {
            Some(sftp) => f(sftp),
            None => Err(WatchError::RemoteIo("SFTP channel unavailable".into())),
        }
    }
}

impl RemoteFs for SshSession {
    fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.with_sftp(|sftp| {
            let listing = sftp.readdir(Path::new(path)).map_err(|e| remote_err(path, e))?;
            Ok(listing
                .into_iter()
                .filter_map(|(full, stat)| {
                    let name = full.file_name()?.to_string_lossy().into_owned();
                    if name == "." || name == ".." {
                        return None;
                    }
                    Some(entry_from_stat(name, &stat))
                })
                .collect())
        })
    }

    fn stat(&self, path: &str) -> Result<RemoteEntry> {
        self.with_sftp(|sftp| {
            let stat = sftp.stat(Path::new(path)).map_err(|e| remote_err(path, e))?;
            Ok(entry_from_stat(path.to_string(), &stat))
        })
    }

    fn download(&self, path: &str, dest: &mut dyn Write) -> Result<u64> {
        self.with_sftp(|sftp| {
            let mut file = sftp.open(Path::new(path)).map_err(|e| remote_err(path, e))?;
            std::io::copy(&mut file, dest)
                .map_err(|e| WatchError::RemoteIo(format!("download {path}: {e}")))
        })
    }

    fn upload(&self, path: &str, src: &mut dyn Read) -> Result<u64> {
        self.with_sftp(|sftp| {
            let mut file = sftp.create(Path::new(path)).map_err(|e| remote_err(path, e))?;
            let written = std::io::copy(src, &mut file)
                .map_err(|e| WatchError::RemoteIo(format!("upload {path}: {e}")))?;
            file.flush()
                .map_err(|e| WatchError::RemoteIo(format!("upload {path}: {e}")))?;
            Ok(written)
        })
    }

    fn exec(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| remote_err("open channel", e))?;
        channel.exec(command).map_err(|e| remote_err("exec", e))?;

        let mut stdout_stream = channel.stream(0);
        let mut stderr_stream = channel.stderr();
        self.session.set_blocking(false);
        let drained = drain_streams(
            &mut stdout_stream,
            &mut stderr_stream,
            Instant::now() + self.io_timeout,
        );
        self.session.set_blocking(true);
        let (stdout, stderr) =
            drained.map_err(|e| WatchError::RemoteIo(format!("read output of {command:?}: {e}")))?;

        channel.wait_close().map_err(|e| remote_err("close channel", e))?;
        let exit_status = channel.exit_status().map_err(|e| remote_err("exit status", e))?;

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.sftp.get_mut().take();
        if let Err(e) = self.session.disconnect(None, "closing session", None) {
            debug!(error = %e, "SSH disconnect failed");
        }
    }
}
