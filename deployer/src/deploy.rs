//! Convergence driver
//!
//! Drives a single upload-build-restart attempt against a remote host. The
//! scratch directory is removed best-effort once the build command has
//! finished, success or failure; a cleanup failure never masks the build
//! outcome. There is no retry: a failed build is surfaced to the caller.

use tracing::{debug, info};

use crate::channel::CommandChannel;
use crate::config::{NodeConfig, Role};
use crate::errors::NodeError;
use crate::render::render_artifacts;

/// Deploy (or redeploy) the node for `network` onto the host behind
/// `channel`. An existing instance with the same network name is replaced.
pub async fn deploy_node(
    channel: &dyn CommandChannel,
    network: &str,
    bootnodes: &[String],
    config: &NodeConfig,
    force_rebuild: bool,
) -> Result<(), NodeError> {
    let role = config.role();
    // A bootstrap node peers with nobody at deploy time
    let bootnodes: &[String] = match role {
        Role::Bootstrap => &[],
        Role::Peer => bootnodes,
    };

    let artifacts = render_artifacts(network, config, role, bootnodes);
    info!(
        server = channel.server(),
        network,
        role = role.service_name(),
        workdir = %artifacts.workdir,
        "uploading deployment artifacts"
    );
    channel.upload(&artifacts.files).await?;

    // Build and (re)start the service, streaming the build output live
    let result = if force_rebuild {
        channel
            .stream(&format!(
                "cd {} && docker-compose -p {} build --pull --no-cache && docker-compose -p {} up -d --force-recreate",
                artifacts.workdir, network, network
            ))
            .await
    } else {
        channel
            .stream(&format!(
                "cd {} && docker-compose -p {} up -d --build --force-recreate",
                artifacts.workdir, network
            ))
            .await
    };

    // Best-effort scratch cleanup, regardless of the build outcome
    if let Err(err) = channel.run(&format!("rm -rf {}", artifacts.workdir)).await {
        debug!(
            server = channel.server(),
            workdir = %artifacts.workdir,
            "scratch directory cleanup failed: {}",
            err
        );
    }

    result
}
