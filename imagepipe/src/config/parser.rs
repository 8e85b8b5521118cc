//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to settings.

use ini::{Ini, Properties};
use std::str::FromStr;
use std::time::Duration;

use super::file::{ConfigFile, ConfigFileError};
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
/// Empty values keep the default.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = value(section, "reference_memory") {
            let bytes = parse_size(v).map_err(|_| {
                invalid("cache", "reference_memory", v, "expected a size like '16GB'")
            })?;
            config.cache = config.cache.with_reference_ceiling(bytes);
        }
        if let Some(v) = value(section, "memory_fraction") {
            let fraction = v
                .parse::<f64>()
                .ok()
                .filter(|f| *f > 0.0 && *f <= 1.0)
                .ok_or_else(|| {
                    invalid("cache", "memory_fraction", v, "must be a number in (0, 1]")
                })?;
            config.cache = config.cache.with_fraction(fraction);
        }
        if let Some(v) = value(section, "memory_size") {
            let bytes = parse_size(v).map_err(|_| {
                invalid("cache", "memory_size", v, "expected a size like '256MB' or '1GB'")
            })?;
            config.cache = config.cache.with_max_bytes(Some(bytes));
        }
    }

    // [coordinator]
    if let Some(section) = ini.section(Some("coordinator")) {
        if let Some(v) = value(section, "attempt_timeout_ms") {
            let ms: u64 = parse_number(v, "coordinator", "attempt_timeout_ms", "milliseconds")?;
            if ms == 0 {
                return Err(invalid("coordinator", "attempt_timeout_ms", v, "must be greater than 0"));
            }
            config.coordinator = config
                .coordinator
                .with_attempt_timeout(Duration::from_millis(ms));
        }
        if let Some(v) = value(section, "max_attempts") {
            let attempts: u32 = parse_number(v, "coordinator", "max_attempts", "attempts")?;
            if attempts == 0 {
                return Err(invalid("coordinator", "max_attempts", v, "must be at least 1"));
            }
            config.coordinator = config.coordinator.with_max_attempts(attempts);
        }
        if let Some(v) = value(section, "retry_backoff_ms") {
            let ms: u64 = parse_number(v, "coordinator", "retry_backoff_ms", "milliseconds")?;
            config.coordinator = config
                .coordinator
                .with_retry_backoff(Duration::from_millis(ms));
        }
        if let Some(v) = value(section, "drain_timeout_ms") {
            let ms: u64 = parse_number(v, "coordinator", "drain_timeout_ms", "milliseconds")?;
            config.coordinator = config
                .coordinator
                .with_drain_timeout(Duration::from_millis(ms));
        }
    }

    // [transport]
    if let Some(section) = ini.section(Some("transport")) {
        if let Some(v) = value(section, "request_timeout_secs") {
            let secs: u64 = parse_number(v, "transport", "request_timeout_secs", "seconds")?;
            if secs == 0 {
                return Err(invalid("transport", "request_timeout_secs", v, "must be greater than 0"));
            }
            config.transport = config
                .transport
                .with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(v) = value(section, "user_agent") {
            config.transport = config.transport.with_user_agent(v);
        }
    }

    // [decode]
    if let Some(section) = ini.section(Some("decode")) {
        if let Some(v) = value(section, "max_dimension") {
            let max: u32 = parse_number(v, "decode", "max_dimension", "pixels")?;
            if max == 0 {
                return Err(invalid("decode", "max_dimension", v, "must be greater than 0"));
            }
            config.decoder = config.decoder.with_max_dimension(max);
        }
    }

    Ok(config)
}

/// Trimmed value for `key`, or `None` when absent or empty.
fn value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(
    v: &str,
    section: &str,
    key: &str,
    unit: &str,
) -> Result<T, ConfigFileError> {
    v.parse()
        .map_err(|_| invalid(section, key, v, &format!("must be a non-negative integer ({})", unit)))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
