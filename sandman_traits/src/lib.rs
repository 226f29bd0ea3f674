//! Seams between the sandman control core and the outside world.
//!
//! The core never touches GPIO, the speech pipeline, the input device, or the
//! power state directly; it goes through these traits.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Instant;

/// Relay outputs addressed by GPIO pin number.
pub trait OutputPins {
    /// Claim `pin` as an output. Implementations drive it low.
    fn acquire_output(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_high(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_low(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn release(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Spoken (or otherwise announced) notifications, addressed by id.
pub trait Notifier {
    fn notify(&mut self, id: &str);

    /// When the most recent notification finished playing, if any has.
    fn last_finished(&self) -> Option<Instant>;
}

/// Host power control.
pub trait PowerControl {
    fn reboot(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A key or button transition read from an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    /// 0 = release, 1 = press, 2 = autorepeat.
    pub value: i32,
}

/// Connection changes an input source wants announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceNotice {
    Connected,
    /// Only raised for the first failure after a successful open.
    Disconnected,
}

/// A source of key events, polled once per tick.
pub trait InputSource {
    fn poll(&mut self, now: Instant) -> Vec<KeyEvent>;
    fn is_connected(&self) -> bool;

    /// Drain the oldest pending connection notice.
    fn take_notice(&mut self) -> Option<DeviceNotice> {
        None
    }
}
