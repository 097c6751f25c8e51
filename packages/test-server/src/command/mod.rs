//! Command module
//!
//! Turns operator intent into validated [`RemoteCommand`](crate::connection::protocol::RemoteCommand)
//! values ready to be framed and sent to the agent.

pub mod builder;
