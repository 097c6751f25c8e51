//! Server module
//!
//! The listening side of the harness: the acceptor and the registry of
//! connected agents.

pub mod acceptor;
pub mod registry;
