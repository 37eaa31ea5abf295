//! Best-effort TCP reachability probe.
//!
//! No external binaries (nmap, ping) are required; a plain async dial with
//! a short timeout is enough to tell whether a published port answers.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::errors::NodeError;

/// Per-probe timeout.
const PROBE_TIMEOUT_MS: u64 = 2_000;

/// Dial `address:port` and drop the connection immediately.
pub async fn check_port(address: &str, port: u16) -> Result<(), NodeError> {
    let target = format!("{}:{}", address, port);
    let timeout = Duration::from_millis(PROBE_TIMEOUT_MS);

    match tokio::time::timeout(timeout, TcpStream::connect(&target)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(NodeError::Io(e)),
        Err(_) => Err(NodeError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("connect to {} timed out", target),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_port_open() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(check_port("127.0.0.1", port).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_port_closed() {
        // Port 1 is reserved and closed on any sane test machine
        assert!(check_port("127.0.0.1", 1).await.is_err());
    }
}
