//! Export configuration
//!
//! All run-time options live in one value threaded through the pipeline.
//! There is no module-level mutable configuration state.

use crate::error::{ExportError, Result};
use chrono::FixedOffset;

/// Default strftime-style format for rendered timestamps
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output artifact format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Bodyfile,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Bodyfile => "bodyfile",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "bodyfile" => Ok(OutputFormat::Bodyfile),
            other => Err(format!(
                "unknown format '{}' (expected csv, json or bodyfile)",
                other
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output artifact format
    pub format: OutputFormat,
    /// Timezone all timestamps are converted to before formatting
    pub timezone: FixedOffset,
    /// strftime-style format string for CSV/JSON timestamps
    pub time_format: String,
    /// Bodyfile only: take dates from the name attribute instead of
    /// standard information
    pub use_fn: bool,
    /// Number of parallel export workers
    pub workers: usize,
    /// Apply the fixup array when decoding records (disable for records
    /// carved from memory)
    pub apply_fixup: bool,
    /// Show a progress bar during the scan
    pub show_progress: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            timezone: FixedOffset::east_opt(0).unwrap(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            use_fn: false,
            workers: 1,
            apply_fixup: true,
            show_progress: true,
        }
    }
}

/// Parse a timezone argument: `UTC` or a fixed offset (`+02:00`, `-0130`,
/// `+5`). Named zones are not supported.
pub fn parse_timezone(s: &str) -> Result<FixedOffset> {
    let bad = || ExportError::InvalidTimezone(s.to_string());

    if s.eq_ignore_ascii_case("utc") {
        return Ok(FixedOffset::east_opt(0).unwrap());
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1i32, &s[1..]),
        Some(b'-') => (-1i32, &s[1..]),
        _ => return Err(bad()),
    };

    if rest.matches(':').count() > 1 {
        return Err(bad());
    }

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }

    let (hours, minutes) = if digits.len() <= 2 {
        (digits.parse::<i32>().map_err(|_| bad())?, 0)
    } else {
        let split = digits.len() - 2;
        (
            digits[..split].parse::<i32>().map_err(|_| bad())?,
            digits[split..].parse::<i32>().map_err(|_| bad())?,
        )
    };

    if hours > 14 || minutes > 59 {
        return Err(bad());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}
