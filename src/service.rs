use std::fmt;
use std::time::Duration;

use btleplug::api::ScanFilter;

use crate::DeliveryTarget;

/// Status code reported by a scanning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    /// No error has been reported yet.
    pub const NONE: ErrorCode = ErrorCode(-1);
    pub const ALREADY_STARTED: ErrorCode = ErrorCode(1);
    pub const APPLICATION_REGISTRATION_FAILED: ErrorCode = ErrorCode(2);
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode(3);
    pub const FEATURE_UNSUPPORTED: ErrorCode = ErrorCode(4);
    pub const OUT_OF_HARDWARE_RESOURCES: ErrorCode = ErrorCode(5);
    pub const SCANNING_TOO_FREQUENTLY: ErrorCode = ErrorCode(6);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::NONE
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            ErrorCode::NONE => "no error",
            ErrorCode::ALREADY_STARTED => "already started",
            ErrorCode::APPLICATION_REGISTRATION_FAILED => "application registration failed",
            ErrorCode::INTERNAL_ERROR => "internal error",
            ErrorCode::FEATURE_UNSUPPORTED => "feature unsupported",
            ErrorCode::OUT_OF_HARDWARE_RESOURCES => "out of hardware resources",
            ErrorCode::SCANNING_TOO_FREQUENTLY => "scanning too frequently",
            _ => return write!(f, "error code {}", self.0),
        };
        write!(f, "{} ({})", name, self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Opportunistic,
    LowPower,
    Balanced,
    LowLatency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackType {
    AllMatches,
    FirstMatch,
    MatchLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Aggressive,
    Sticky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumOfMatches {
    OneAdvertisement,
    FewAdvertisements,
    MaxAdvertisements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phy {
    Le1M,
    LeCoded,
    AllSupported,
}

/// Radio settings handed to the scanning service. Services may ignore
/// settings they do not support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub scan_mode: ScanMode,
    pub callback_type: CallbackType,
    pub match_mode: MatchMode,
    pub num_of_matches: NumOfMatches,
    /// Only report legacy advertisements
    pub legacy: bool,
    pub phy: Phy,
    /// Batch advertisements for this long before delivering them.
    /// Zero delivers immediately.
    pub report_delay: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::LowLatency,
            callback_type: CallbackType::AllMatches,
            match_mode: MatchMode::Aggressive,
            num_of_matches: NumOfMatches::MaxAdvertisements,
            legacy: false,
            phy: Phy::AllSupported,
            report_delay: Duration::ZERO,
        }
    }
}

/// The radio driver that performs the actual scanning.
///
/// `begin` and `halt` are called with the scanner's lock held. An
/// implementation must deliver batches and errors from its own context and
/// never call into the [`DeliveryTarget`] from inside `begin` or `halt`.
pub trait ScanningService: Send + Sync {
    /// Start delivering advertisements to `target`.
    fn begin(
        &self,
        filters: &[ScanFilter],
        settings: &ScanSettings,
        target: DeliveryTarget,
    ) -> Result<(), ErrorCode>;

    /// Stop delivering advertisements to `target`.
    fn halt(&self, target: &DeliveryTarget);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::NONE.to_string(), "no error (-1)");
        assert_eq!(ErrorCode::INTERNAL_ERROR.to_string(), "internal error (3)");
        assert_eq!(ErrorCode::new(133).to_string(), "error code 133");
    }

    #[test]
    fn default_error_code_is_none() {
        assert_eq!(ErrorCode::default(), ErrorCode::NONE);
        assert_eq!(ErrorCode::default().value(), -1);
    }
}
