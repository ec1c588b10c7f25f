//! Error types for clock synthesis and device setup.
//!
//! Every error that can surface from the solver or the device port is
//! collected here as a single [`DigiError`] enum so callers have one
//! result channel to match against.

use thiserror::Error;

/// Primary error type for this crate.
#[derive(Debug, Error)]
pub enum DigiError {
    /// An ioctl (register read/write or control command) failed.
    #[error("device I/O error on {op} (offset 0x{offset:x}): {source}")]
    DeviceIo {
        op: &'static str,
        offset: u32,
        #[source]
        source: std::io::Error,
    },

    /// Firmware reports a capability bit that this setup cannot run under.
    #[error("unsupported firmware: {message} (version 0x{version:04x})")]
    BadFirmware { message: String, version: u16 },

    /// The Si5326 reports no valid reference clock after reset and free-run test.
    #[error("Si5326 reports no valid reference clock")]
    NoReference,

    /// The Si5326 did not reach lock within the retry budget after calibration.
    #[error("Si5326 failed to lock after {retries} retries")]
    NotLocked { retries: u32 },

    /// A user-supplied coefficient, channel selector, or sample count is invalid.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The solver exhausted its search without finding a legal coefficient set.
    #[error("no legal PLL configuration found for fout = {fout} Hz")]
    NotSolvable { fout: u64 },

    /// The derived digitizer clock would exceed the ADC's rated maximum.
    #[error("digitizer clock {clock} Hz exceeds ADC maximum {max} Hz for grade {grade}")]
    OverClocked { clock: u64, max: u64, grade: u8 },

    /// A SPI-like state machine remained busy beyond its retry budget.
    #[error("{machine} SPI state machine timed out after {retries} retries")]
    Timeout { machine: &'static str, retries: u32 },
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, DigiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DigiError::NotLocked { retries: 10 };
        assert!(err.to_string().contains('1'));
        assert!(err.to_string().contains("lock"));
    }

    #[test]
    fn test_not_solvable_carries_frequency() {
        let err = DigiError::NotSolvable { fout: 109_000_000 };
        let msg = err.to_string();
        assert!(msg.contains("109000000"));
    }
}
