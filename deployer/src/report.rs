//! Reporting view
//!
//! Flattens a merged node configuration into the key/value summary shown to
//! the operator.

use std::collections::BTreeMap;

use tracing::error;

use crate::config::{decode_key_address, NodeConfig};

/// Project `config` into a plain string map. The key file is authoritative
/// for the account address when it decodes; on decode failure the
/// previously known address is kept and the failure is only logged.
pub fn report(config: &NodeConfig) -> BTreeMap<String, String> {
    let mut report = BTreeMap::new();
    report.insert("Data directory".to_string(), config.datadir.clone());
    report.insert("Listener port".to_string(), config.listen_port.to_string());
    report.insert(
        "Peer count (all total)".to_string(),
        config.max_peers.to_string(),
    );

    if let Some(account) = &config.account {
        report.insert("Account".to_string(), account.clone());
    }
    if let Some(key_json) = &config.key_json {
        match decode_key_address(key_json) {
            Ok(address) => {
                report.insert("Account".to_string(), address);
            }
            Err(err) => error!("Failed to decode account address from key file: {}", err),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;

    #[test]
    fn test_report_basic_fields() {
        let config = NodeConfig::seeded(None);
        let report = report(&config);

        assert_eq!(report.get("Listener port").unwrap(), "30399");
        assert_eq!(report.get("Peer count (all total)").unwrap(), "50");
        assert!(report.contains_key("Data directory"));
        assert!(!report.contains_key("Account"));
    }

    #[test]
    fn test_report_prefers_key_file_address() {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            account: Some("0xdeadbeef".into()),
            key_json: Some(
                "{\"address\":\"8f17f1962b36e491b30a40b2405849e597ba5fb5\"}".into(),
            ),
            key_pass: Some("secret".into()),
            ..Default::default()
        });

        let report = report(&config);
        assert_eq!(
            report.get("Account").unwrap(),
            "0x8f17f1962b36e491b30a40b2405849e597ba5fb5"
        );
    }

    #[test]
    fn test_report_keeps_account_on_decode_failure() {
        let mut config = NodeConfig::seeded(None);
        config.apply(Overrides {
            account: Some("0xdeadbeef".into()),
            key_json: Some("not json".into()),
            ..Default::default()
        });

        let report = report(&config);
        assert_eq!(report.get("Account").unwrap(), "0xdeadbeef");
    }
}
