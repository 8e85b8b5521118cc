//! Host memory detection.
//!
//! The memory cache budget defaults to a fraction of a reference memory
//! ceiling. When no ceiling is configured, the detected total system
//! memory is used.

/// Fallback memory value when detection fails.
pub const FALLBACK_MEMORY: usize = 8 * 1024 * 1024 * 1024;

/// Detect total system memory in bytes.
///
/// # Platform Support
///
/// - **Linux**: Parses `/proc/meminfo`
/// - **Other platforms**: Returns [`FALLBACK_MEMORY`]
#[cfg(target_os = "linux")]
pub fn detect_total_memory() -> usize {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|content| parse_meminfo_total(&content))
        .unwrap_or(FALLBACK_MEMORY)
}

#[cfg(not(target_os = "linux"))]
pub fn detect_total_memory() -> usize {
    FALLBACK_MEMORY
}

/// Extract `MemTotal` from `/proc/meminfo` content, in bytes.
///
/// Format: `MemTotal:       16384000 kB`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total(content: &str) -> Option<usize> {
    let line = content.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    kb.checked_mul(1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_total_memory_returns_positive() {
        assert!(detect_total_memory() > 0);
    }

    #[test]
    fn test_parse_meminfo_total() {
        let content = "MemTotal:       16384000 kB\nMemFree:         1000 kB\n";
        assert_eq!(parse_meminfo_total(content), Some(16_384_000 * 1024));
    }

    #[test]
    fn test_parse_meminfo_missing_line() {
        assert_eq!(parse_meminfo_total("MemFree: 1000 kB\n"), None);
        assert_eq!(parse_meminfo_total("MemTotal: lots kB\n"), None);
    }
}
