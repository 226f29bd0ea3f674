use nix::sys::reboot::{RebootMode, reboot};
use sandman_traits::PowerControl;
use tracing::warn;

use crate::error::HwError;

/// Reboots the host. Needs CAP_SYS_BOOT.
#[derive(Debug, Default)]
pub struct SystemPower;

impl PowerControl for SystemPower {
    fn reboot(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        nix::unistd::sync();
        warn!("rebooting host");
        // Only returns on failure.
        match reboot(RebootMode::RB_AUTOBOOT) {
            Ok(never) => match never {},
            Err(e) => Err(Box::new(HwError::Power(e.to_string()))),
        }
    }
}
