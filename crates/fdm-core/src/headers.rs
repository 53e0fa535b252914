//! Parse user-supplied raw header text into name/value pairs.

use std::collections::HashMap;

/// Parses a block of `Name: value` lines.
///
/// Each line is split on its first `:` and both halves are trimmed. Lines
/// without a colon, or with an empty name or value, are skipped. A repeated
/// name keeps the last value.
pub fn parse_header_block(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in text.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        out.insert(name.to_string(), value.to_string());
    }
    out
}
