//! Remote command channel
//!
//! The reconciler reaches the remote host through a narrow seam: run a
//! command and capture its output, stream a long-running command to the
//! console, or upload a batch of files. The production implementation in
//! [`ssh`] shells out to the local ssh/scp binaries; the integration tests
//! script their own channel.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::NodeError;

pub mod probe;
pub mod ssh;

/// Shell-execution channel to a single remote host.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Host identity, used in error messages and log lines.
    fn server(&self) -> &str;

    /// Address remote peers can reach this host on.
    fn address(&self) -> &str;

    /// Run a command remotely and capture its combined output.
    async fn run(&self, cmd: &str) -> Result<Vec<u8>, NodeError>;

    /// Run a command remotely, forwarding its output live to the console.
    /// Only a non-zero exit is surfaced as an error.
    async fn stream(&self, cmd: &str) -> Result<(), NodeError>;

    /// Upload a set of files, keyed by path relative to the remote home
    /// directory. Returns any output the transfer produced.
    async fn upload(&self, files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, NodeError>;
}
