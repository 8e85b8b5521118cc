//! INI serialization: `ConfigFile` → commented INI string.

use super::file::ConfigFile;
use super::size::format_size;
use crate::system::detect_total_memory;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let memory_size = config
        .cache
        .explicit_bytes()
        .map(format_size)
        .unwrap_or_default();
    // Leave the ceiling blank while it tracks the machine's memory.
    let reference_memory = if config.cache.reference_ceiling() == detect_total_memory() {
        String::new()
    } else {
        format_size(config.cache.reference_ceiling())
    };
    let max_dimension = config
        .decoder
        .max_dimension()
        .map(|v| v.to_string())
        .unwrap_or_default();

    format!(
        r#"[cache]
; Memory cache budget for decoded images.
; Explicit size (e.g., 256MB, 1GB). Overrides memory_fraction when set.
memory_size = {}
; Share of reference_memory used when memory_size is empty (0 < f <= 1, default: 0.125)
memory_fraction = {}
; Reference memory ceiling. Empty = total system memory.
reference_memory = {}

[coordinator]
; Time budget for one fetch + decode attempt, in milliseconds (default: 10000)
attempt_timeout_ms = {}
; Attempts per request before a retryable failure is reported (default: 3)
max_attempts = {}
; Base delay between attempts, doubled each retry. 0 = retry immediately (default: 0)
retry_backoff_ms = {}
; Wait for a timed-out attempt to return before retrying, in milliseconds (default: 30000)
drain_timeout_ms = {}

[transport]
; HTTP request timeout in seconds, capped at attempt_timeout_ms (default: 10)
request_timeout_secs = {}
; User-Agent header sent with every request
user_agent = {}

[decode]
; Reject images wider or taller than this many pixels. Empty = no limit.
max_dimension = {}
"#,
        memory_size,
        config.cache.fraction(),
        reference_memory,
        config.coordinator.attempt_timeout().as_millis(),
        config.coordinator.max_attempts(),
        config.coordinator.retry_backoff().as_millis(),
        config.coordinator.drain_timeout().as_millis(),
        config.transport.request_timeout().as_secs(),
        config.transport.user_agent(),
        max_dimension,
    )
}
