//! netdeploy - entry point
//!
//! One-shot deployment reconciler for containerized network nodes. Checks
//! what is running on the remote host, seeds the configuration from it,
//! applies command-line overrides and (with --deploy) converges the host
//! onto the desired state.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};

use netdeploy::channel::ssh::SshChannel;
use netdeploy::config::{NodeConfig, Overrides, Role};
use netdeploy::deploy::deploy_node;
use netdeploy::logs::{init_logging, LogOptions};
use netdeploy::report::report;
use netdeploy::status::check_node;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments (--key=value / --flag style)
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            cli_args.insert(key.trim_start_matches('-').to_string(), value.to_string());
        } else if arg.starts_with("--") {
            cli_args.insert(arg.trim_start_matches('-').to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("help") || cli_args.is_empty() {
        print_usage();
        return Ok(());
    }

    let log_level = cli_args
        .get("log-level")
        .map(|s| s.parse())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();
    if let Err(e) = init_logging(LogOptions { log_level }) {
        println!("Failed to initialize logging: {e}");
    }

    let server = cli_args
        .get("server")
        .context("--server=<host> is required")?
        .clone();
    let network = cli_args
        .get("network")
        .context("--network=<name> is required")?
        .clone();
    let channel = SshChannel::new(&server, cli_args.get("user").map(String::as_str));

    // Which instance to look for on the host
    let role = if cli_args.contains_key("boot") {
        Role::Bootstrap
    } else {
        Role::Peer
    };

    // Always start from what is actually running
    let snapshot = match check_node(&channel, &network, role).await {
        Ok(snapshot) => Some(snapshot),
        Err(err) if err.is_offline() => {
            info!(
                "No running {} instance for {} on {}; treating as a fresh deployment",
                role.service_name(),
                network,
                server
            );
            None
        }
        Err(err) => return Err(err.into()),
    };

    if !cli_args.contains_key("deploy") {
        match snapshot {
            Some(snapshot) => print_report(&NodeConfig::seeded(Some(&snapshot)), &snapshot.node_url),
            None => println!("Nothing deployed for network {} on {}", network, server),
        }
        return Ok(());
    }

    // Merge: snapshot values are the defaults, CLI flags override
    let mut config = NodeConfig::seeded(snapshot.as_ref());
    config.apply(overrides_from(&cli_args).await?);
    config.validate()?;

    let bootnodes: Vec<String> = cli_args
        .get("bootnodes")
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let force_rebuild = cli_args.contains_key("rebuild");

    if let Err(err) = deploy_node(&channel, &network, &bootnodes, &config, force_rebuild).await {
        if let Some(out) = err.remote_output() {
            eprintln!("{}", String::from_utf8_lossy(out));
        }
        bail!("deployment failed: {}", err);
    }

    // Give the service a moment to boot, then confirm it came back up
    info!("Waiting for the node to finish booting");
    tokio::time::sleep(Duration::from_secs(3)).await;

    match check_node(&channel, &network, config.role()).await {
        Ok(snapshot) => {
            let node_url = snapshot.node_url.clone();
            print_report(&NodeConfig::seeded(Some(&snapshot)), &node_url);
        }
        Err(err) => warn!("Deployed, but the follow-up status check failed: {}", err),
    }

    Ok(())
}

async fn overrides_from(cli_args: &HashMap<String, String>) -> anyhow::Result<Overrides> {
    let genesis = match cli_args.get("genesis") {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("cannot read genesis file {}", path))?,
        ),
        None => None,
    };
    let key_json = match cli_args.get("key") {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("cannot read key file {}", path))?,
        ),
        None => None,
    };

    Ok(Overrides {
        network_id: parse_flag(cli_args, "network-id")?,
        genesis,
        datadir: cli_args.get("datadir").cloned(),
        listen_port: parse_flag(cli_args, "port")?,
        api_port: parse_flag(cli_args, "api-port")?,
        max_peers: parse_flag(cli_args, "peers")?,
        account: cli_args.get("account").cloned(),
        key_json,
        key_pass: cli_args.get("password").cloned(),
    })
}

fn parse_flag<T: std::str::FromStr>(
    cli_args: &HashMap<String, String>,
    key: &str,
) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    cli_args
        .get(key)
        .map(|value| {
            value
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid --{}={}: {}", key, value, e))
        })
        .transpose()
}

fn print_report(config: &NodeConfig, node_url: &str) {
    for (key, value) in report(config) {
        println!("{:24} {}", key, value);
    }
    println!("{:24} {}", "Peer URL", node_url);
}

fn print_usage() {
    println!("netdeploy - remote node deployment reconciler");
    println!();
    println!("Usage: netdeploy --server=<host> --network=<name> [options]");
    println!();
    println!("Options:");
    println!("  --user=<name>        ssh login user");
    println!("  --boot               address the bootstrap instance instead of the peer one");
    println!("  --deploy             converge the host instead of only reporting status");
    println!("  --network-id=<id>    chain/network identifier");
    println!("  --genesis=<path>     genesis payload to deploy with");
    println!("  --datadir=<path>     remote directory for persistent node state");
    println!("  --port=<port>        p2p listening port (default 30399)");
    println!("  --api-port=<port>    api port (default 8500)");
    println!("  --peers=<n>          maximum peer connections (default 50)");
    println!("  --bootnodes=<a,b>    comma-separated peer URLs to join through");
    println!("  --account=<address>  account the node runs under");
    println!("  --key=<path>         encrypted key JSON for the account");
    println!("  --password=<pass>    passphrase unlocking the key");
    println!("  --rebuild            rebuild the image from scratch (no cache, pull base)");
    println!("  --log-level=<level>  trace|debug|info|warn|error");
}
