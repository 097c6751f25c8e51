//! Snapshot Formatter
//!
//! Renders an [`AgentSnapshot`] as indented multi-line text:
//!
//! ```text
//! AgentSnapshot:
//!   timestamp: 2024-01-01T00:00:00Z
//!   containers:
//!     - id: 4f2a
//!       name: web
//!       image: nginx:latest
//!       state: RUNNING
//! ```

use chrono::{DateTime, Utc};

use crate::connection::protocol::{AgentSnapshot, ContainerState, ContainerStatus};

const NONE: &str = "(none)";

/// Format a snapshot for display.
pub fn format_snapshot(snapshot: &AgentSnapshot) -> String {
    let mut lines = vec!["AgentSnapshot:".to_string()];
    lines.push(format!("  timestamp: {}", format_timestamp(snapshot)));

    if snapshot.container_status.is_empty() {
        lines.push(format!("  containers: {}", NONE));
    } else {
        lines.push("  containers:".to_string());
        for container in &snapshot.container_status {
            lines.extend(format_container(container, "    "));
        }
    }

    lines.join("\n")
}

fn format_timestamp(snapshot: &AgentSnapshot) -> String {
    let Some(ts) = snapshot.timestamp.as_ref() else {
        return "(no timestamp)".to_string();
    };

    let mut ts = ts.clone();
    ts.normalize();

    match DateTime::<Utc>::from_timestamp(ts.seconds, ts.nanos as u32) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => "(invalid timestamp)".to_string(),
    }
}

fn format_container(container: &ContainerStatus, indent: &str) -> [String; 4] {
    [
        format!("{indent}- id: {}", or_none(&container.id)),
        format!("{indent}  name: {}", or_none(&container.name)),
        format!("{indent}  image: {}", or_none(&container.image_ref)),
        format!(
            "{indent}  state: {}",
            ContainerState::label(container.container_state)
        ),
    ]
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        NONE
    } else {
        value
    }
}
