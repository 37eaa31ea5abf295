//! Status checker
//!
//! Builds the full picture of "what is deployed right now" for one node by
//! combining the container inspection with a few read-only probes inside
//! the container. The snapshot is rebuilt on every check and never cached.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::channel::{probe, CommandChannel};
use crate::config::{Role, DEFAULT_LISTEN_PORT, DEFAULT_MAX_PEERS};
use crate::errors::NodeError;
use crate::inspect::{inspect_container, ContainerSnapshot};

/// Well-known file locations inside the node image, fixed by the Dockerfile.
const GENESIS_PATH: &str = "/genesis.json";
const KEY_PATH: &str = "/account.key";
const PASS_PATH: &str = "/account.pass";
const DATA_MOUNT: &str = "/data";
const ADMIN_IPC: &str = "/data/netnode.ipc";

/// Observed state of a running node instance.
#[derive(Debug, Clone)]
pub struct RemoteSnapshot {
    /// Always true for a returned snapshot; a dead instance surfaces as
    /// [`NodeError::ServiceOffline`] instead of a zeroed struct.
    pub running: bool,

    /// Environment variables the container was started with.
    pub envvars: HashMap<String, String>,

    /// Declared tcp container port -> externally bound host port.
    pub portmap: BTreeMap<u16, u16>,

    /// Container mount path -> host path.
    pub volumes: HashMap<String, String>,

    /// Identity the node assigned itself on first boot.
    pub node_id: String,

    /// Genesis payload the node was launched with.
    pub genesis: Vec<u8>,

    /// Host directory bound to the node's state directory.
    pub datadir: String,

    /// Externally reachable p2p port.
    pub listen_port: u16,

    /// Peer cap the instance was started with.
    pub max_peers: u32,

    /// Account address, when the instance runs under one.
    pub account: Option<String>,

    /// Encrypted key JSON read back from the container, when present.
    pub key_json: Option<String>,

    /// Key passphrase read back from the container, when present.
    pub key_pass: Option<String>,

    /// Peer URL other nodes can dial this instance on.
    pub node_url: String,
}

/// Container name docker-compose assigns the service for `network`/`role`.
pub fn container_name(network: &str, role: Role) -> String {
    format!("{}_{}_1", network, role.service_name())
}

/// Health-check the node instance for `network` on the host behind `channel`.
pub async fn check_node(
    channel: &dyn CommandChannel,
    network: &str,
    role: Role,
) -> Result<RemoteSnapshot, NodeError> {
    let container = container_name(network, role);

    let infos = match inspect_container(channel, &container).await {
        Ok(infos) => infos,
        // "never deployed" and "not running" look the same to the caller
        Err(NodeError::NotFound { server, container }) => {
            return Err(NodeError::ServiceOffline { server, container })
        }
        Err(err) => return Err(err),
    };
    if !infos.running {
        return Err(NodeError::ServiceOffline {
            server: channel.server().to_string(),
            container,
        });
    }

    let unreachable = |reason: String| NodeError::Unreachable {
        server: channel.server().to_string(),
        container: container.clone(),
        reason,
    };

    // The node's own view of its identity, via the admin IPC socket
    let out = channel
        .run(&format!(
            "docker exec {} netnode attach --exec admin.nodeid {}",
            container, ADMIN_IPC
        ))
        .await
        .map_err(|e| unreachable(format!("identity query failed: {}", e)))?;
    let node_id = String::from_utf8_lossy(&out)
        .trim()
        .trim_matches('"')
        .to_string();

    // Genesis the instance was actually launched with
    let out = channel
        .run(&format!("docker exec {} cat {}", container, GENESIS_PATH))
        .await
        .map_err(|e| unreachable(format!("genesis readback failed: {}", e)))?;
    let genesis = out.trim_ascii().to_vec();

    // Credential files are only present on account-carrying nodes; their
    // absence is tolerated, not fatal
    let key_json = read_optional(channel, &container, KEY_PATH).await;
    let key_pass = read_optional(channel, &container, PASS_PATH).await;

    let listen_port = external_port(&infos).unwrap_or(DEFAULT_LISTEN_PORT);

    // Sanity-check the p2p path; the snapshot stays authoritative even when
    // the network path is currently blocked
    if let Err(err) = probe::check_port(channel.address(), listen_port).await {
        warn!(
            server = channel.server(),
            port = listen_port,
            "{} p2p port seems unreachable: {}",
            role.service_name(),
            err
        );
    }

    let max_peers = infos
        .envvars
        .get("TOTAL_PEERS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_PEERS);
    let account = infos.envvars.get("ACCOUNT").cloned();
    let datadir = infos.volumes.get(DATA_MOUNT).cloned().unwrap_or_default();
    let node_url = format!("enode://{}@{}:{}", node_id, channel.address(), listen_port);

    Ok(RemoteSnapshot {
        running: true,
        envvars: infos.envvars,
        portmap: infos.portmap,
        volumes: infos.volumes,
        node_id,
        genesis,
        datadir,
        listen_port,
        max_peers,
        account,
        key_json,
        key_pass,
        node_url,
    })
}

async fn read_optional(
    channel: &dyn CommandChannel,
    container: &str,
    path: &str,
) -> Option<String> {
    channel
        .run(&format!("docker exec {} cat {}", container, path))
        .await
        .ok()
        .map(|out| String::from_utf8_lossy(out.trim_ascii()).to_string())
        .filter(|content| !content.is_empty())
}

/// Externally bound tcp port: the mapping for the declared `PORT` env var,
/// or the sole published mapping when the declaration is missing. Several
/// mappings without a declaration are ambiguous and yield nothing.
fn external_port(infos: &ContainerSnapshot) -> Option<u16> {
    if let Some(declared) = infos.envvars.get("PORT").and_then(|d| parse_port_decl(d)) {
        if let Some(&bound) = infos.portmap.get(&declared) {
            return Some(bound);
        }
    }
    if infos.portmap.len() == 1 {
        return infos.portmap.values().next().copied();
    }
    None
}

fn parse_port_decl(decl: &str) -> Option<u16> {
    decl.split('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name() {
        assert_eq!(container_name("mainnet", Role::Bootstrap), "mainnet_bootnode_1");
        assert_eq!(container_name("mainnet", Role::Peer), "mainnet_node_1");
    }

    #[test]
    fn test_external_port_from_declaration() {
        let mut infos = ContainerSnapshot::default();
        infos.envvars.insert("PORT".into(), "30303/tcp".into());
        infos.portmap.insert(30303, 31000);
        infos.portmap.insert(8500, 8500);

        assert_eq!(external_port(&infos), Some(31000));
    }

    #[test]
    fn test_external_port_fallback_to_sole_mapping() {
        let mut infos = ContainerSnapshot::default();
        infos.portmap.insert(30303, 31000);

        assert_eq!(external_port(&infos), Some(31000));
    }

    #[test]
    fn test_external_port_ambiguous_without_declaration() {
        let mut infos = ContainerSnapshot::default();
        infos.portmap.insert(30303, 31000);
        infos.portmap.insert(8500, 8500);

        assert_eq!(external_port(&infos), None);
    }
}
