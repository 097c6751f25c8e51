//! Command Builder
//!
//! Pure constructors for the commands the operator can issue. Nothing here
//! touches the network; validation failures come back as [`CommandError`].

use crate::connection::protocol::{
    remote_command::Command, ContainerHostConfig, PortMap, RemoteCommand, RunParams, StopParams,
};
use crate::error::CommandError;

/// Tag shown to the operator when none was given. Never put on the wire.
pub const DEFAULT_TAG: &str = "latest";

/// Parse a port mapping such as `8080/tcp:8080` or `3000:3000`.
///
/// The container-side segment is passed through untouched, protocol suffix
/// included.
pub fn parse_port_mapping(port_mapping: &str) -> Result<PortMap, CommandError> {
    let invalid = || CommandError::InvalidPortMapping(port_mapping.to_string());

    let (from, to) = port_mapping.split_once(':').ok_or_else(invalid)?;
    if from.is_empty() || to.is_empty() || to.contains(':') {
        return Err(invalid());
    }

    Ok(PortMap {
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// Build a run command for `image_name`, optionally pinned to `tag` and
/// publishing one port mapping.
pub fn build_run_command(
    image_name: &str,
    tag: Option<&str>,
    port_mapping: Option<&str>,
) -> Result<RemoteCommand, CommandError> {
    if image_name.is_empty() {
        return Err(CommandError::EmptyImageName);
    }

    let container_host_config = port_mapping
        .map(parse_port_mapping)
        .transpose()?
        .map(|port_map| ContainerHostConfig {
            port_map: Some(port_map),
        });

    Ok(RemoteCommand {
        command: Some(Command::Run(RunParams {
            image_name: image_name.to_string(),
            tag: tag.map(str::to_string),
            container_host_config,
        })),
    })
}

/// Build a stop command for `container_id`.
pub fn build_stop_command(container_id: &str) -> Result<RemoteCommand, CommandError> {
    if container_id.is_empty() {
        return Err(CommandError::EmptyContainerId);
    }

    Ok(RemoteCommand {
        command: Some(Command::Stop(StopParams {
            container_id: container_id.to_string(),
        })),
    })
}

/// Serialize a command into the bytes of one binary frame.
pub fn serialize_command(cmd: &RemoteCommand) -> Vec<u8> {
    cmd.to_bytes()
}
