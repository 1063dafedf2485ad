//! Small time and formatting helpers shared across modules.

use std::time::SystemTime;

/// Return current wall-clock time in milliseconds since Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Human readable byte size (`B`, `KB`, `MB`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    if bytes < 1024 * 1024 {
        return format!("{} KB", bytes / 1024);
    }
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Whole minutes elapsed since `then_ms`.
pub(crate) fn minutes_since(then_ms: u64) -> u64 {
    now_ms().saturating_sub(then_ms) / 60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_by_magnitude() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(4096), "4 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }
}
