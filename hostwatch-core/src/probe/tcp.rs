//! TCP connect probe.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Returns `true` iff a TCP connection to `host:port` completes within `timeout`.
pub async fn check_port(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "Port check failed");
            false
        }
        Err(_) => {
            debug!(host, port, timeout_ms = timeout.as_millis() as u64, "Port check timed out");
            false
        }
    }
}
