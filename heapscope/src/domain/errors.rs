//! Structured error types for heapscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The capture and annotation paths are total over their inputs and report
//! degraded values instead of errors; only script handling and CLI parsing
//! can fail.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("script line {line}: {source}")]
    Script {
        line: usize,
        source: serde_json::Error,
    },

    #[error("script must start with a target declaration")]
    MissingTarget,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RangeParseError {
    #[error("expected LOW:HIGH, got \"{0}\"")]
    MissingSeparator(String),

    #[error("invalid hex bound \"{0}\"")]
    InvalidBound(String),

    #[error("empty range: {low:#x} does not precede {high:#x}")]
    Empty { low: u64, high: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_error_display() {
        let err = ReplayError::MissingTarget;
        assert_eq!(err.to_string(), "script must start with a target declaration");
    }

    #[test]
    fn test_range_error_display() {
        let err = RangeParseError::Empty { low: 0x2000, high: 0x1000 };
        assert!(err.to_string().contains("0x2000"));
        assert!(err.to_string().contains("0x1000"));
    }
}
