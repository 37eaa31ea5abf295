//! Subprocess ssh/scp implementation of the command channel.
//!
//! The transport itself is delegated to the local OpenSSH binaries; this
//! module only shapes commands, captures output and stages uploads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::channel::CommandChannel;
use crate::errors::NodeError;

/// Command channel to one remote host, driven through ssh/scp subprocesses.
pub struct SshChannel {
    server: String,
    login: String,
}

impl SshChannel {
    /// Create a channel for `server`, optionally logging in as `user`.
    pub fn new(server: impl Into<String>, user: Option<&str>) -> Self {
        let server = server.into();
        let login = match user {
            Some(user) => format!("{}@{}", user, server),
            None => server.clone(),
        };
        Self { server, login }
    }

    fn remote_failed(&self, message: String, output: Vec<u8>) -> NodeError {
        NodeError::RemoteCommand {
            server: self.server.clone(),
            message,
            output,
        }
    }
}

#[async_trait]
impl CommandChannel for SshChannel {
    fn server(&self) -> &str {
        &self.server
    }

    fn address(&self) -> &str {
        &self.server
    }

    async fn run(&self, cmd: &str) -> Result<Vec<u8>, NodeError> {
        debug!(server = %self.server, "running: {}", cmd);

        let output = Command::new("ssh")
            .args(["-o", "BatchMode=yes", self.login.as_str(), cmd])
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            return Err(self.remote_failed(format!("{} ({})", cmd, output.status), combined));
        }
        Ok(output.stdout)
    }

    async fn stream(&self, cmd: &str) -> Result<(), NodeError> {
        debug!(server = %self.server, "streaming: {}", cmd);

        // Output inherits the console so the operator sees the build live
        let status = Command::new("ssh")
            .args(["-o", "BatchMode=yes", self.login.as_str(), cmd])
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(self.remote_failed(format!("{} ({})", cmd, status), Vec::new()));
        }
        Ok(())
    }

    async fn upload(&self, files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, NodeError> {
        // Stage the batch locally, then copy it over in one scp run
        let staging: PathBuf =
            std::env::temp_dir().join(format!("netdeploy-{}", Uuid::new_v4().simple()));
        stage_files(&staging, files).await?;

        let source = format!("{}/.", staging.display());
        let target = format!("{}:", self.login);
        debug!(server = %self.server, "uploading {} files", files.len());

        let output = Command::new("scp")
            .args(["-o", "BatchMode=yes", "-rq", source.as_str(), target.as_str()])
            .stdin(Stdio::null())
            .output()
            .await;

        let _ = tokio::fs::remove_dir_all(&staging).await;

        let output = output?;
        if !output.status.success() {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            return Err(self.remote_failed(format!("scp upload ({})", output.status), combined));
        }
        Ok(output.stdout)
    }
}

/// Write the batch under `staging`, removing the directory again when any
/// write fails so no temp directory leaks on the error path.
async fn stage_files(staging: &Path, files: &BTreeMap<String, Vec<u8>>) -> Result<(), NodeError> {
    let result = write_batch(staging, files).await;
    if result.is_err() {
        let _ = tokio::fs::remove_dir_all(staging).await;
    }
    result.map_err(Into::into)
}

async fn write_batch(staging: &Path, files: &BTreeMap<String, Vec<u8>>) -> std::io::Result<()> {
    for (path, content) in files {
        let local = staging.join(path);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&local, content).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_staging() -> PathBuf {
        std::env::temp_dir().join(format!("netdeploy-test-{}", Uuid::new_v4().simple()))
    }

    #[tokio::test]
    async fn test_stage_files_writes_batch() {
        let staging = temp_staging();
        let mut files = BTreeMap::new();
        files.insert("workdir/Dockerfile".to_string(), b"FROM scratch\n".to_vec());

        stage_files(&staging, &files).await.unwrap();
        let written = tokio::fs::read(staging.join("workdir/Dockerfile")).await.unwrap();
        assert_eq!(written, b"FROM scratch\n");

        let _ = tokio::fs::remove_dir_all(&staging).await;
    }

    #[tokio::test]
    async fn test_stage_files_cleans_up_on_failure() {
        let staging = temp_staging();
        let mut files = BTreeMap::new();
        // "a" is written as a file first, so "a/b" cannot be created
        files.insert("a".to_string(), b"file".to_vec());
        files.insert("a/b".to_string(), b"conflict".to_vec());

        assert!(stage_files(&staging, &files).await.is_err());
        assert!(!staging.exists());
    }
}
