//! Activity log formatting

use chrono::Local;

/// Prefix for lines the agent sent us
pub const INBOUND: &str = "<<<";

/// Stamp a multi-line block as `[HH:MM:SS] <prefix> <first line>`, indenting
/// the remaining lines so they align under the first.
pub fn log_block(prefix: &str, text: &str) -> String {
    stamp_block(&Local::now().format("%H:%M:%S").to_string(), prefix, text)
}

fn stamp_block(timestamp: &str, prefix: &str, text: &str) -> String {
    let indent = " ".repeat(timestamp.len() + 3 + prefix.len() + 1);

    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                format!("[{}] {} {}", timestamp, prefix, line)
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
