//! Capture policy and output knobs
//!
//! Everything here is policy the rest of the engine consults but never
//! hard-codes: which operation kinds get logged, whether lines carry
//! timestamps, and the two address/code ranges that classify return values
//! and exceptions. Defaults reproduce the behavior of a 32-bit Windows
//! target; both ranges are expected to be overridden for anything else.

use std::fmt;
use std::str::FromStr;

use crate::domain::{Addr, RangeParseError};

/// Heuristic filter separating real pointers from sentinel return values.
///
/// Bounds are exclusive on both ends: the low bound rejects null-like
/// values (null page and small error codes), the high bound rejects
/// kernel-space and `-1`-style values. A rejected address drops the whole
/// operation silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerWindow {
    pub low: u64,
    pub high: u64,
}

impl PointerWindow {
    #[must_use]
    pub fn contains(self, addr: Addr) -> bool {
        addr.0 > self.low && addr.0 < self.high
    }
}

impl Default for PointerWindow {
    fn default() -> Self {
        PointerWindow { low: 0x1000, high: 0x7fff_ffff }
    }
}

impl FromStr for PointerWindow {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = parse_hex_pair(s)?;
        if low >= high {
            return Err(RangeParseError::Empty { low, high });
        }
        Ok(PointerWindow { low, high })
    }
}

impl fmt::Display for PointerWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{:#x}", self.low, self.high)
    }
}

/// Exception-code range treated as severe (full report plus termination).
///
/// Bounds are inclusive. Codes outside the range are noted with a single
/// line and the target keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SevereCodeRange {
    pub low: u64,
    pub high: u64,
}

impl SevereCodeRange {
    #[must_use]
    pub fn contains(self, code: u32) -> bool {
        let code = u64::from(code);
        code >= self.low && code <= self.high
    }
}

impl Default for SevereCodeRange {
    fn default() -> Self {
        SevereCodeRange { low: 0xC000_0000, high: 0xCFFF_FFFF }
    }
}

impl FromStr for SevereCodeRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = parse_hex_pair(s)?;
        if low > high {
            return Err(RangeParseError::Empty { low, high });
        }
        Ok(SevereCodeRange { low, high })
    }
}

impl fmt::Display for SevereCodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{:#x}", self.low, self.high)
    }
}

/// Parse `LOW:HIGH` where both bounds are hex, `0x` prefix optional.
fn parse_hex_pair(s: &str) -> Result<(u64, u64), RangeParseError> {
    let (low, high) = s
        .split_once(':')
        .ok_or_else(|| RangeParseError::MissingSeparator(s.to_string()))?;
    Ok((parse_hex_bound(low)?, parse_hex_bound(high)?))
}

fn parse_hex_bound(s: &str) -> Result<u64, RangeParseError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| RangeParseError::InvalidBound(s.to_string()))
}

/// Runtime knobs for one capture session.
#[derive(Debug, Clone, Copy)]
pub struct TraceConfig {
    /// Capture allocate/reallocate/virtual-reserve calls. When off, the
    /// three allocation-style probes are ignored entirely: no lines, no
    /// chunk tracking, no attach announcements.
    pub log_alloc: bool,

    /// Capture frees. Same contract as `log_alloc`.
    pub log_free: bool,

    /// Prefix each operation line with a wall-clock timestamp.
    pub show_timestamp: bool,

    /// Suppress all primary-log output. Capture, the registries, and fault
    /// reports still run.
    pub silent: bool,

    pub window: PointerWindow,
    pub severity: SevereCodeRange,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            log_alloc: true,
            log_free: true,
            show_timestamp: false,
            silent: false,
            window: PointerWindow::default(),
            severity: SevereCodeRange::default(),
        }
    }
}
