//! Output formatting utilities

use crate::OutputFormat;
use serde::Serialize;

/// Print output in the specified format
pub fn print_output<T: Serialize + std::fmt::Display>(
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Human => {
            println!("{}", value);
        }
    }
    Ok(())
}

/// Print one value as a single JSON line
pub fn print_json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format speed limit as human-readable
pub fn format_speed(bytes_per_sec: Option<u64>) -> String {
    match bytes_per_sec {
        Some(limit) if limit > 0 => format!("{}/s", format_bytes(limit)),
        _ => "unlimited".to_string(),
    }
}
