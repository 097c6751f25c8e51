//! Snapshot module
//!
//! Human-readable rendering of the state reports agents push to the server.

pub mod formatter;
