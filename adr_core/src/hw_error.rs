//! Maps `Box<dyn Error>` from the trait boundaries to typed `ControlError`.
//!
//! The ports in `adr_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `adr_hardware::HwError` downcasting.

use crate::error::ControlError;

/// Map a trait-boundary error to a typed `ControlError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ControlError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<adr_hardware::error::HwError>() {
            return match hw {
                adr_hardware::error::HwError::Timeout => ControlError::Timeout,
                adr_hardware::error::HwError::NotConnected => ControlError::NotConnected,
                other => ControlError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") {
        ControlError::Timeout
    } else if lower.contains("not connected") {
        ControlError::NotConnected
    } else {
        ControlError::Hardware(s)
    }
}
