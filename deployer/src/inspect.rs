//! Container inspector
//!
//! Runs a single read-only `docker inspect` against a named container and
//! parses its JSON output into a typed snapshot at the channel boundary.
//! Raw remote text never travels deeper than this module.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::channel::CommandChannel;
use crate::errors::NodeError;

/// Point-in-time observed state of a single container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSnapshot {
    /// Whether the container process is currently running.
    pub running: bool,

    /// Environment variables as reported by the runtime.
    pub envvars: HashMap<String, String>,

    /// Declared tcp container port -> externally bound host port.
    pub portmap: BTreeMap<u16, u16>,

    /// Container mount path -> host path.
    pub volumes: HashMap<String, String>,
}

/// Inspect `container` on the host behind `channel`.
///
/// A missing container maps to [`NodeError::NotFound`]; any other command
/// failure maps to [`NodeError::Unreachable`].
pub async fn inspect_container(
    channel: &dyn CommandChannel,
    container: &str,
) -> Result<ContainerSnapshot, NodeError> {
    let out = match channel.run(&format!("docker inspect {}", container)).await {
        Ok(out) => out,
        Err(err) if mentions_missing_container(&err) => {
            return Err(NodeError::NotFound {
                server: channel.server().to_string(),
                container: container.to_string(),
            })
        }
        Err(err) => {
            return Err(NodeError::Unreachable {
                server: channel.server().to_string(),
                container: container.to_string(),
                reason: err.to_string(),
            })
        }
    };

    match parse_inspect_output(&out) {
        Ok(Some(snapshot)) => Ok(snapshot),
        Ok(None) => Err(NodeError::NotFound {
            server: channel.server().to_string(),
            container: container.to_string(),
        }),
        // A live daemon handing back unparseable output is the same class
        // of failure as any other query against a live container failing
        Err(err) => Err(NodeError::Unreachable {
            server: channel.server().to_string(),
            container: container.to_string(),
            reason: format!("inspect output unparseable: {}", err),
        }),
    }
}

/// `docker inspect` exits non-zero with a "No such object" message when the
/// container does not exist, which is not the same failure as a dead daemon
/// or an unreachable host.
fn mentions_missing_container(err: &NodeError) -> bool {
    err.remote_output()
        .map(|out| {
            let text = String::from_utf8_lossy(out);
            text.contains("No such object") || text.contains("No such container")
        })
        .unwrap_or(false)
}

#[derive(Deserialize)]
struct Inspection {
    #[serde(rename = "State")]
    state: InspectionState,
    #[serde(rename = "Config", default)]
    config: InspectionConfig,
    #[serde(rename = "HostConfig", default)]
    host_config: InspectionHostConfig,
    #[serde(rename = "NetworkSettings", default)]
    network_settings: InspectionNetwork,
}

#[derive(Deserialize)]
struct InspectionState {
    #[serde(rename = "Running")]
    running: bool,
}

#[derive(Deserialize, Default)]
struct InspectionConfig {
    #[serde(rename = "Env", default)]
    env: Vec<String>,
}

#[derive(Deserialize, Default)]
struct InspectionHostConfig {
    #[serde(rename = "Binds", default)]
    binds: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct InspectionNetwork {
    #[serde(rename = "Ports", default)]
    ports: Option<HashMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Deserialize)]
struct PortBinding {
    #[serde(rename = "HostPort")]
    host_port: String,
}

/// Pure parser for the `docker inspect` JSON array. Returns `None` for an
/// empty array (no such container).
fn parse_inspect_output(out: &[u8]) -> Result<Option<ContainerSnapshot>, NodeError> {
    let mut inspections: Vec<Inspection> = serde_json::from_slice(out)?;
    let inspection = match inspections.pop() {
        Some(inspection) => inspection,
        None => return Ok(None),
    };

    let mut envvars = HashMap::new();
    for entry in &inspection.config.env {
        if let Some((key, value)) = entry.split_once('=') {
            envvars.insert(key.to_string(), value.to_string());
        }
    }

    let mut portmap = BTreeMap::new();
    if let Some(ports) = inspection.network_settings.ports {
        for (decl, bindings) in ports {
            // Only tcp mappings matter for reachability
            let Some(container_port) = parse_tcp_port(&decl) else {
                continue;
            };
            let Some(bindings) = bindings else { continue };
            if let Some(host_port) = bindings.first().and_then(|b| b.host_port.parse().ok()) {
                portmap.insert(container_port, host_port);
            }
        }
    }

    let mut volumes = HashMap::new();
    for bind in inspection.host_config.binds.unwrap_or_default() {
        let mut parts = bind.splitn(3, ':');
        if let (Some(host), Some(container)) = (parts.next(), parts.next()) {
            volumes.insert(container.to_string(), host.to_string());
        }
    }

    Ok(Some(ContainerSnapshot {
        running: inspection.state.running,
        envvars,
        portmap,
        volumes,
    }))
}

fn parse_tcp_port(decl: &str) -> Option<u16> {
    match decl.split_once('/') {
        Some((port, "tcp")) => port.parse().ok(),
        Some(_) => None,
        None => decl.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trimmed capture of a real `docker inspect` on a compose-managed node
    const RUNNING: &str = r#"[{
        "State": {"Running": true, "Paused": false},
        "Config": {"Env": ["PORT=30303/tcp", "TOTAL_PEERS=50", "PATH=/usr/bin"]},
        "HostConfig": {"Binds": ["/srv/node:/data", "/etc/localtime:/etc/localtime:ro"]},
        "NetworkSettings": {"Ports": {
            "30303/tcp": [{"HostIp": "0.0.0.0", "HostPort": "31000"}],
            "30303/udp": [{"HostIp": "0.0.0.0", "HostPort": "31000"}],
            "8500/tcp": null
        }}
    }]"#;

    #[test]
    fn test_parse_running_container() {
        let snapshot = parse_inspect_output(RUNNING.as_bytes()).unwrap().unwrap();

        assert!(snapshot.running);
        assert_eq!(snapshot.envvars.get("TOTAL_PEERS").unwrap(), "50");
        assert_eq!(snapshot.portmap.get(&30303), Some(&31000));
        assert!(!snapshot.portmap.contains_key(&8500));
        assert_eq!(snapshot.volumes.get("/data").unwrap(), "/srv/node");
        assert_eq!(snapshot.volumes.get("/etc/localtime").unwrap(), "/etc/localtime");
    }

    #[test]
    fn test_parse_stopped_container() {
        let out = r#"[{"State": {"Running": false}, "Config": {"Env": []}}]"#;
        let snapshot = parse_inspect_output(out.as_bytes()).unwrap().unwrap();
        assert!(!snapshot.running);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_inspect_output(b"[]").unwrap().is_none());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_inspect_output(b"not json").is_err());
    }
}
