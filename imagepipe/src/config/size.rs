//! Human-readable byte sizes ("256MB", "1.5GB", "8 GiB").

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// Suffixes checked longest-first so "MB" wins over "B".
const UNITS: &[(&str, usize)] = &[
    ("GIB", GB),
    ("MIB", MB),
    ("KIB", KB),
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// Error parsing a size string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '512MB', '1.5GB', or '65536'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable size into bytes.
///
/// Units are binary (1KB = 1024 bytes), case-insensitive, and may be
/// separated from the number by whitespace. A bare number is bytes.
/// Fractional values are allowed with a unit and rounded down.
///
/// # Examples
///
/// ```
/// use imagepipe::config::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("256MB").unwrap(), 256 * 1024 * 1024);
/// assert_eq!(parse_size("1.5 gb").unwrap(), 3 * 512 * 1024 * 1024);
/// assert!(parse_size("lots").is_err());
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|rest| (rest.trim_end(), *multiplier))
        })
        .unwrap_or((upper.as_str(), 1));

    if number.is_empty() {
        return Err(SizeParseError::new(s));
    }

    if let Ok(whole) = number.parse::<usize>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| SizeParseError::new(s));
    }

    let fractional: f64 = number.parse().map_err(|_| SizeParseError::new(s))?;
    let bytes = fractional * multiplier as f64;
    if !bytes.is_finite() || bytes < 0.0 || bytes > usize::MAX as f64 {
        return Err(SizeParseError::new(s));
    }
    Ok(bytes as usize)
}

/// Format a byte count using the largest unit that divides it exactly.
///
/// # Examples
///
/// ```
/// use imagepipe::config::format_size;
///
/// assert_eq!(format_size(512 * 1024 * 1024), "512MB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3GB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: usize) -> String {
    match [(GB, "GB"), (MB, "MB"), (KB, "KB")]
        .iter()
        .find(|(unit, _)| bytes >= *unit && bytes % unit == 0)
    {
        Some((unit, suffix)) => format!("{}{}", bytes / unit, suffix),
        None => bytes.to_string(),
    }
}

/// A byte count that parses from and displays as a human-readable size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Size(pub usize);

impl Size {
    pub fn bytes(self) -> usize {
        self.0
    }

    pub fn from_mb(mb: usize) -> Self {
        Self(mb.saturating_mul(MB))
    }

    pub fn from_gb(gb: usize) -> Self {
        Self(gb.saturating_mul(GB))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_size(self.0))
    }
}

impl FromStr for Size {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Size)
    }
}
