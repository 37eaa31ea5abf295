//! Deployment artifact renderer
//!
//! Renders the container build recipe and the compose descriptor from typed
//! template contexts, so a renamed field fails at compile time instead of
//! leaving a silent hole in the output. Rendering is deterministic apart
//! from the scratch-directory name, which is fresh per attempt.

use std::collections::BTreeMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::config::{NodeConfig, Role};

/// Artifact names inside the scratch directory. The Dockerfile references
/// its siblings by these relative paths.
pub const DOCKERFILE: &str = "Dockerfile";
pub const COMPOSEFILE: &str = "docker-compose.yaml";
pub const GENESIS_FILE: &str = "genesis.json";
pub const KEY_FILE: &str = "account.key";
pub const PASS_FILE: &str = "account.pass";

/// Rendered artifact set for a single deployment attempt. Holds no identity
/// beyond the attempt that produced it.
#[derive(Debug, Clone)]
pub struct DeploymentArtifacts {
    /// Fresh scratch directory on the remote host, unique per attempt so
    /// stale or concurrent deployments cannot collide on files.
    pub workdir: String,

    /// Relative path -> content, rooted at the remote home directory.
    pub files: BTreeMap<String, Vec<u8>>,
}

/// Template context for the container build recipe.
struct DockerfileContext<'a> {
    network_id: u64,
    account: Option<&'a str>,
    listen_port: u16,
    api_port: u16,
    max_peers: u32,
    bootnodes: &'a str,
    has_key: bool,
}

impl DockerfileContext<'_> {
    fn render(&self) -> String {
        let mut cmd = format!("netnode --networkid {} ", self.network_id);
        if let Some(account) = self.account {
            let _ = write!(cmd, "--account {} ", account);
        }
        let _ = write!(
            cmd,
            "--port {} --apiport {} --maxpeers {}",
            self.listen_port, self.api_port, self.max_peers
        );
        if !self.bootnodes.is_empty() {
            let _ = write!(cmd, " --bootnodes {}", self.bootnodes);
        }
        if self.has_key {
            // The passphrase travels as a file, never on the command line
            cmd.push_str(" --password /account.pass");
        }

        let mut out = String::from("FROM netnode/client:latest\n\n");
        out.push_str("ADD genesis.json /genesis.json\n");
        if self.has_key {
            out.push_str("ADD account.key /account.key\n");
            out.push_str("ADD account.pass /account.pass\n");
        }
        out.push('\n');
        out.push_str("RUN \\\n");
        if self.has_key {
            out.push_str(
                "\techo 'mkdir -p /data/keystore/ && cp /account.key /data/keystore/' > node.sh && \\\n",
            );
            let _ = writeln!(out, "\techo '{}' >> node.sh", cmd);
        } else {
            let _ = writeln!(out, "\techo '{}' > node.sh", cmd);
        }
        out.push_str("\nENTRYPOINT [\"/bin/sh\", \"node.sh\"]\n");
        out
    }
}

/// Template context for the compose descriptor.
struct ComposeContext<'a> {
    network: &'a str,
    service: &'a str,
    datadir: &'a str,
    listen_port: u16,
    api_port: u16,
    max_peers: u32,
    account: Option<&'a str>,
}

impl ComposeContext<'_> {
    fn render(&self) -> String {
        let mut out = String::from("version: '2'\nservices:\n");
        let _ = writeln!(out, "  {}:", self.service);
        out.push_str("    build: .\n");
        let _ = writeln!(out, "    image: {}/{}", self.network, self.service);
        out.push_str("    ports:\n");
        let _ = writeln!(out, "      - \"{}:{}\"", self.listen_port, self.listen_port);
        let _ = writeln!(out, "      - \"{}:{}/udp\"", self.listen_port, self.listen_port);
        let _ = writeln!(out, "      - \"{}:{}\"", self.api_port, self.api_port);
        out.push_str("    volumes:\n");
        let _ = writeln!(out, "      - {}:/data", self.datadir);
        out.push_str("    environment:\n");
        let _ = writeln!(out, "      - PORT={}/tcp", self.listen_port);
        let _ = writeln!(out, "      - TOTAL_PEERS={}", self.max_peers);
        if let Some(account) = self.account {
            let _ = writeln!(out, "      - ACCOUNT={}", account);
        }
        out.push_str(
            "    logging:\n      driver: \"json-file\"\n      options:\n        max-size: \"1m\"\n        max-file: \"10\"\n",
        );
        out.push_str("    restart: always\n");
        out
    }
}

/// Render the artifact set for one deployment attempt.
pub fn render_artifacts(
    network: &str,
    config: &NodeConfig,
    role: Role,
    bootnodes: &[String],
) -> DeploymentArtifacts {
    let workdir = Uuid::new_v4().simple().to_string();
    let bootnodes = bootnodes.join(",");

    let dockerfile = DockerfileContext {
        network_id: config.network_id,
        account: config.account.as_deref(),
        listen_port: config.listen_port,
        api_port: config.api_port,
        max_peers: config.max_peers,
        bootnodes: &bootnodes,
        has_key: config.key_json.is_some(),
    }
    .render();

    let composefile = ComposeContext {
        network,
        service: role.service_name(),
        datadir: &config.datadir,
        listen_port: config.listen_port,
        api_port: config.api_port,
        max_peers: config.max_peers,
        account: config.account.as_deref(),
    }
    .render();

    let mut files = BTreeMap::new();
    files.insert(format!("{}/{}", workdir, DOCKERFILE), dockerfile.into_bytes());
    files.insert(format!("{}/{}", workdir, COMPOSEFILE), composefile.into_bytes());
    files.insert(format!("{}/{}", workdir, GENESIS_FILE), config.genesis.clone());
    if let (Some(key_json), Some(key_pass)) = (&config.key_json, &config.key_pass) {
        files.insert(
            format!("{}/{}", workdir, KEY_FILE),
            key_json.clone().into_bytes(),
        );
        files.insert(
            format!("{}/{}", workdir, PASS_FILE),
            key_pass.clone().into_bytes(),
        );
    }

    DeploymentArtifacts { workdir, files }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;

    fn test_config() -> NodeConfig {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            network_id: Some(42),
            genesis: Some(b"{\"config\":{}}".to_vec()),
            datadir: Some("/srv/node".into()),
            ..Default::default()
        });
        config
    }

    fn artifact_text(artifacts: &DeploymentArtifacts, name: &str) -> String {
        let path = format!("{}/{}", artifacts.workdir, name);
        String::from_utf8(artifacts.files.get(&path).unwrap().clone()).unwrap()
    }

    #[test]
    fn test_bootstrap_has_no_bootnodes() {
        let config = test_config();
        let artifacts = render_artifacts("testnet", &config, Role::Bootstrap, &[]);

        let dockerfile = artifact_text(&artifacts, DOCKERFILE);
        assert!(!dockerfile.contains("--bootnodes"));
    }

    #[test]
    fn test_peer_bootnodes_joined_in_order() {
        let config = test_config();
        let bootnodes = vec![
            "enode://aa@10.0.0.1:30399".to_string(),
            "enode://bb@10.0.0.2:30399".to_string(),
        ];
        let artifacts = render_artifacts("testnet", &config, Role::Peer, &bootnodes);

        let dockerfile = artifact_text(&artifacts, DOCKERFILE);
        assert!(dockerfile
            .contains("--bootnodes enode://aa@10.0.0.1:30399,enode://bb@10.0.0.2:30399"));
    }

    #[test]
    fn test_render_deterministic_modulo_workdir() {
        let config = test_config();
        let a = render_artifacts("testnet", &config, Role::Peer, &[]);
        let b = render_artifacts("testnet", &config, Role::Peer, &[]);

        assert_ne!(a.workdir, b.workdir);
        for name in [DOCKERFILE, COMPOSEFILE, GENESIS_FILE] {
            assert_eq!(
                artifact_text(&a, name),
                artifact_text(&b, name),
                "artifact {} differs",
                name
            );
        }
    }

    #[test]
    fn test_passphrase_never_in_templates() {
        let mut config = test_config();
        config.apply(Overrides {
            account: Some("0x8f17f1962b36e491b30a40b2405849e597ba5fb5".into()),
            key_json: Some("{\"address\":\"8f17f1962b36e491b30a40b2405849e597ba5fb5\"}".into()),
            key_pass: Some("hunter2".into()),
            ..Default::default()
        });
        let artifacts = render_artifacts("testnet", &config, Role::Bootstrap, &[]);

        assert!(!artifact_text(&artifacts, DOCKERFILE).contains("hunter2"));
        assert!(!artifact_text(&artifacts, COMPOSEFILE).contains("hunter2"));
        // The passphrase travels only as its own file
        assert_eq!(
            artifact_text(&artifacts, PASS_FILE),
            "hunter2"
        );
        assert!(artifact_text(&artifacts, DOCKERFILE).contains("--password /account.pass"));
    }

    #[test]
    fn test_compose_descriptor_shape() {
        let config = test_config();
        let artifacts = render_artifacts("testnet", &config, Role::Peer, &[]);

        let compose = artifact_text(&artifacts, COMPOSEFILE);
        assert!(compose.contains("  node:\n"));
        assert!(compose.contains("image: testnet/node"));
        assert!(compose.contains("- \"30399:30399\"\n"));
        assert!(compose.contains("- \"30399:30399/udp\"\n"));
        assert!(compose.contains("- \"8500:8500\"\n"));
        assert!(compose.contains("- /srv/node:/data"));
        assert!(compose.contains("- TOTAL_PEERS=50"));
        assert!(compose.contains("restart: always"));
    }
}
