//! Connection module
//!
//! This module handles all communication with a connected agent,
//! including the wire messages and the per-socket connection state.

pub mod agent;
pub mod protocol;
