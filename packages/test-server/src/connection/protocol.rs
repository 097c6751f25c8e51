//! Message Protocol
//!
//! Defines the `deploything.v1` messages exchanged between the test server and
//! the agent. Commands travel server -> agent as binary frames, snapshots
//! travel agent -> server as binary frames. Both use protobuf encoding via
//! `prost`; the derives below mirror what `prost-build` emits for the schema.

use prost::Message;

/// Command sent from the test server to the agent
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoteCommand {
    #[prost(oneof = "remote_command::Command", tags = "1, 2")]
    pub command: ::core::option::Option<remote_command::Command>,
}

/// Nested types for [`RemoteCommand`]
pub mod remote_command {
    /// The populated command variant
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Command {
        /// Start a container from an image
        #[prost(message, tag = "1")]
        Run(super::RunParams),
        /// Stop a running container
        #[prost(message, tag = "2")]
        Stop(super::StopParams),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RunParams {
    #[prost(string, tag = "1")]
    pub image_name: ::prost::alloc::string::String,
    /// Omitted on the wire when the operator did not supply one
    #[prost(string, optional, tag = "2")]
    pub tag: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "3")]
    pub container_host_config: ::core::option::Option<ContainerHostConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopParams {
    #[prost(string, tag = "1")]
    pub container_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContainerHostConfig {
    #[prost(message, optional, tag = "1")]
    pub port_map: ::core::option::Option<PortMap>,
}

/// Container-side spec (optionally `port/protocol`) mapped to a host port
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortMap {
    #[prost(string, tag = "1")]
    pub from: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub to: ::prost::alloc::string::String,
}

/// State report pushed by the agent
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentSnapshot {
    #[prost(message, optional, tag = "1")]
    pub timestamp: ::core::option::Option<::prost_types::Timestamp>,
    /// Kept in the order the agent reported them
    #[prost(message, repeated, tag = "2")]
    pub container_status: ::prost::alloc::vec::Vec<ContainerStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContainerStatus {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub image_ref: ::prost::alloc::string::String,
    #[prost(enumeration = "ContainerState", tag = "4")]
    pub container_state: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ContainerState {
    Unspecified = 0,
    Running = 1,
    Exited = 2,
}

impl ContainerState {
    /// Protobuf name of the variant, as it appears in the schema
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ContainerState::Unspecified => "CONTAINER_STATE_UNSPECIFIED",
            ContainerState::Running => "CONTAINER_STATE_RUNNING",
            ContainerState::Exited => "CONTAINER_STATE_EXITED",
        }
    }

    /// Short operator-facing label for a raw wire value.
    ///
    /// Values outside the known set map to `UNKNOWN`, never to `UNSPECIFIED`.
    pub fn label(value: i32) -> &'static str {
        match ContainerState::try_from(value) {
            Ok(ContainerState::Unspecified) => "UNSPECIFIED",
            Ok(ContainerState::Running) => "RUNNING",
            Ok(ContainerState::Exited) => "EXITED",
            Err(_) => "UNKNOWN",
        }
    }
}

impl RemoteCommand {
    /// Name of the populated variant, for logging
    pub fn kind(&self) -> &'static str {
        match &self.command {
            Some(remote_command::Command::Run(_)) => "run",
            Some(remote_command::Command::Stop(_)) => "stop",
            None => "empty",
        }
    }

    /// Canonical protobuf encoding of the command
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode a command from its protobuf encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}

impl AgentSnapshot {
    /// Decode a snapshot from a binary frame payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }

    /// Protobuf encoding of the snapshot
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_tag_is_omitted_on_the_wire() {
        let without_tag = RunParams {
            image_name: "nginx".to_string(),
            tag: None,
            container_host_config: None,
        };
        let with_tag = RunParams {
            tag: Some("latest".to_string()),
            ..without_tag.clone()
        };

        assert!(without_tag.encode_to_vec().len() < with_tag.encode_to_vec().len());
        assert_eq!(RunParams::decode(&without_tag.encode_to_vec()[..]).unwrap().tag, None);
    }

    #[test]
    fn test_snapshot_preserves_container_order() {
        let snapshot = AgentSnapshot {
            timestamp: Some(prost_types::Timestamp { seconds: 1_700_000_000, nanos: 0 }),
            container_status: vec![
                ContainerStatus {
                    id: "b".to_string(),
                    container_state: ContainerState::Running as i32,
                    ..Default::default()
                },
                ContainerStatus {
                    id: "a".to_string(),
                    container_state: ContainerState::Exited as i32,
                    ..Default::default()
                },
            ],
        };

        let decoded = AgentSnapshot::from_bytes(&snapshot.to_bytes()).unwrap();
        let ids: Vec<_> = decoded.container_status.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_unknown_state_keeps_raw_value() {
        let status = ContainerStatus {
            container_state: 7,
            ..Default::default()
        };
        let decoded = ContainerStatus::decode(&status.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.container_state, 7);
        assert_eq!(ContainerState::label(decoded.container_state), "UNKNOWN");
        assert_eq!(ContainerState::label(0), "UNSPECIFIED");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(AgentSnapshot::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_command_kind() {
        let cmd = RemoteCommand {
            command: Some(remote_command::Command::Stop(StopParams {
                container_id: "abc".to_string(),
            })),
        };
        assert_eq!(cmd.kind(), "stop");
        assert_eq!(RemoteCommand::default().kind(), "empty");
    }
}
