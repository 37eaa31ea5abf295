//! Node configuration with declared defaults and an explicit merge step.
//!
//! Every field has a default; values observed on the remote host seed the
//! configuration via [`NodeConfig::seeded`], and operator input is applied
//! as a typed [`Overrides`] value, so "accepted default" and "overrode" are
//! distinct operations rather than a string comparison.

use serde::Deserialize;

use crate::errors::NodeError;
use crate::status::RemoteSnapshot;

pub const DEFAULT_LISTEN_PORT: u16 = 30399;
pub const DEFAULT_API_PORT: u16 = 8500;
pub const DEFAULT_MAX_PEERS: u32 = 50;

/// Role a node plays in the network.
///
/// Derived solely from whether a prior node identity exists: a node without
/// one becomes the bootstrap node and is given no peer list of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Bootstrap,
    Peer,
}

impl Role {
    /// Service name used in the compose file and the container name.
    pub fn service_name(&self) -> &'static str {
        match self {
            Role::Bootstrap => "bootnode",
            Role::Peer => "node",
        }
    }
}

/// Desired configuration for one node deployment.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain/network identifier baked into the genesis.
    pub network_id: u64,

    /// Genesis payload, immutable once captured.
    pub genesis: Vec<u8>,

    /// Host directory holding the node's persistent state.
    pub datadir: String,

    /// Primary p2p listening port (tcp and udp).
    pub listen_port: u16,

    /// Secondary API port (tcp only).
    pub api_port: u16,

    /// Maximum number of peer connections.
    pub max_peers: u32,

    /// Account address the node runs under.
    pub account: Option<String>,

    /// Encrypted key JSON for the account.
    pub key_json: Option<String>,

    /// Passphrase unlocking the key. Referenced by file path only, never
    /// interpolated into rendered artifacts.
    pub key_pass: Option<String>,

    /// Peer URL of an already-running instance, when one exists.
    pub node_url: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network_id: 0,
            genesis: Vec::new(),
            datadir: String::new(),
            listen_port: DEFAULT_LISTEN_PORT,
            api_port: DEFAULT_API_PORT,
            max_peers: DEFAULT_MAX_PEERS,
            account: None,
            key_json: None,
            key_pass: None,
            node_url: None,
        }
    }
}

/// Operator-supplied overrides. `None` means the default (or the observed
/// remote value) was accepted.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub network_id: Option<u64>,
    pub genesis: Option<Vec<u8>>,
    pub datadir: Option<String>,
    pub listen_port: Option<u16>,
    pub api_port: Option<u16>,
    pub max_peers: Option<u32>,
    pub account: Option<String>,
    pub key_json: Option<String>,
    pub key_pass: Option<String>,
}

impl NodeConfig {
    /// Seed a configuration from an observed snapshot, falling back to the
    /// declared defaults when nothing is running.
    pub fn seeded(snapshot: Option<&RemoteSnapshot>) -> Self {
        match snapshot {
            None => Self::default(),
            Some(snapshot) => Self {
                network_id: 0,
                genesis: snapshot.genesis.clone(),
                datadir: snapshot.datadir.clone(),
                listen_port: snapshot.listen_port,
                api_port: DEFAULT_API_PORT,
                max_peers: snapshot.max_peers,
                account: snapshot.account.clone(),
                key_json: snapshot.key_json.clone(),
                key_pass: snapshot.key_pass.clone(),
                node_url: Some(snapshot.node_url.clone()),
            },
        }
    }

    /// Apply operator overrides on top of the seeded values.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(network_id) = overrides.network_id {
            self.network_id = network_id;
        }
        if let Some(genesis) = overrides.genesis {
            self.genesis = genesis;
        }
        if let Some(datadir) = overrides.datadir {
            self.datadir = datadir;
        }
        if let Some(listen_port) = overrides.listen_port {
            self.listen_port = listen_port;
        }
        if let Some(api_port) = overrides.api_port {
            self.api_port = api_port;
        }
        if let Some(max_peers) = overrides.max_peers {
            self.max_peers = max_peers;
        }
        if let Some(account) = overrides.account {
            self.account = Some(account);
        }
        if let Some(key_json) = overrides.key_json {
            self.key_json = Some(key_json);
        }
        if let Some(key_pass) = overrides.key_pass {
            self.key_pass = Some(key_pass);
        }
    }

    /// Role derived from the presence of a prior node identity.
    pub fn role(&self) -> Role {
        if self.node_url.is_some() {
            Role::Peer
        } else {
            Role::Bootstrap
        }
    }

    /// Check the configuration is deployable.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.genesis.is_empty() {
            return Err(NodeError::ConfigInvalid("no genesis payload".into()));
        }
        if self.network_id == 0 {
            return Err(NodeError::ConfigInvalid("no network id".into()));
        }
        if self.datadir.is_empty() {
            return Err(NodeError::ConfigInvalid("no remote data directory".into()));
        }
        if self.key_json.is_some() != self.key_pass.is_some() {
            return Err(NodeError::ConfigInvalid(
                "account key and passphrase must be supplied together".into(),
            ));
        }
        if let (Some(key_json), Some(account)) = (&self.key_json, &self.account) {
            let decoded = decode_key_address(key_json)?;
            if !decoded.eq_ignore_ascii_case(&normalize_account(account)) {
                return Err(NodeError::ConfigInvalid(format!(
                    "account {} does not match the address {} in the key file",
                    account, decoded
                )));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct KeyFile {
    address: String,
}

/// Decode the account address out of an encrypted key JSON blob.
pub fn decode_key_address(key_json: &str) -> Result<String, NodeError> {
    let key: KeyFile = serde_json::from_str(key_json)?;
    let raw = key.address.trim_start_matches("0x");
    let bytes = hex::decode(raw)
        .map_err(|e| NodeError::ConfigInvalid(format!("bad address in key file: {}", e)))?;
    if bytes.len() != 20 {
        return Err(NodeError::ConfigInvalid(format!(
            "bad address length in key file: {} bytes",
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

fn normalize_account(account: &str) -> String {
    let raw = account.trim_start_matches("0x");
    format!("0x{}", raw.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_JSON: &str =
        r#"{"address":"8f17f1962b36e491b30a40b2405849e597ba5fb5","crypto":{}}"#;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::seeded(None);
        assert_eq!(config.listen_port, 30399);
        assert_eq!(config.api_port, 8500);
        assert_eq!(config.max_peers, 50);
        assert_eq!(config.role(), Role::Bootstrap);
    }

    #[test]
    fn test_override_merge() {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            network_id: Some(42),
            listen_port: Some(30300),
            ..Default::default()
        });

        assert_eq!(config.network_id, 42);
        assert_eq!(config.listen_port, 30300);
        // Untouched fields keep their defaults
        assert_eq!(config.max_peers, 50);
    }

    #[test]
    fn test_decode_key_address() {
        let address = decode_key_address(KEY_JSON).unwrap();
        assert_eq!(address, "0x8f17f1962b36e491b30a40b2405849e597ba5fb5");
    }

    #[test]
    fn test_validate_account_mismatch() {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            network_id: Some(42),
            genesis: Some(b"{}".to_vec()),
            datadir: Some("/srv/node".into()),
            account: Some("0x0000000000000000000000000000000000000001".into()),
            key_json: Some(KEY_JSON.into()),
            key_pass: Some("secret".into()),
            ..Default::default()
        });

        assert!(matches!(
            config.validate(),
            Err(NodeError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_validate_key_without_pass() {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            network_id: Some(42),
            genesis: Some(b"{}".to_vec()),
            datadir: Some("/srv/node".into()),
            key_json: Some(KEY_JSON.into()),
            ..Default::default()
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_account_match() {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            network_id: Some(42),
            genesis: Some(b"{}".to_vec()),
            datadir: Some("/srv/node".into()),
            account: Some("0x8F17F1962B36e491b30A40b2405849e597Ba5FB5".into()),
            key_json: Some(KEY_JSON.into()),
            key_pass: Some("secret".into()),
            ..Default::default()
        });

        assert!(config.validate().is_ok());
    }
}
