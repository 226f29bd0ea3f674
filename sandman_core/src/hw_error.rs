//! Maps `Box<dyn Error>` from trait boundaries to typed `SandmanError`.
//!
//! The traits in `sandman_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `sandman_hardware::HwError` downcasting.

use crate::error::SandmanError;

/// Map a trait-boundary error to a typed `SandmanError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SandmanError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<sandman_hardware::error::HwError>() {
            return match hw {
                sandman_hardware::error::HwError::Io(io) => SandmanError::Io(io.to_string()),
                other => SandmanError::HardwareFault(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return SandmanError::Io(io.to_string());
    }
    SandmanError::Hardware(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_io_errors_map_to_io() {
        let e = std::io::Error::other("disk gone");
        assert!(matches!(map_hw_error(&e), SandmanError::Io(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_map_to_fault() {
        let e = sandman_hardware::HwError::PinNotAcquired(4);
        match map_hw_error(&e) {
            SandmanError::HardwareFault(s) => assert!(s.contains("pin 4")),
            other => panic!("expected HardwareFault, got {other:?}"),
        }
    }
}
