//! Hardware adapters for the sandman daemon.
//!
//! Simulated implementations are always available; the core tests drive them
//! and the CLI falls back to them when built without the `hardware` feature.
//! The relay GPIO driver needs `hardware`; the input device and power control
//! need Linux.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(target_os = "linux")]
pub mod input;
#[cfg(target_os = "linux")]
pub mod power;

pub use error::HwError;

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::time::Instant;

use sandman_traits::{DeviceNotice, InputSource, KeyEvent, OutputPins, PowerControl};

#[derive(Debug, Default)]
struct PinState {
    levels: HashMap<u8, bool>,
    acquired: BTreeSet<u8>,
    failing: BTreeSet<u8>,
    history: Vec<(u8, bool)>,
}

/// In-memory relay outputs.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// registry owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPins {
    state: Rc<RefCell<PinState>>,
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `pin` fail from now on.
    pub fn fail_on(&self, pin: u8) {
        self.state.borrow_mut().failing.insert(pin);
    }

    pub fn is_high(&self, pin: u8) -> bool {
        self.state.borrow().levels.get(&pin).copied().unwrap_or(false)
    }

    pub fn is_acquired(&self, pin: u8) -> bool {
        self.state.borrow().acquired.contains(&pin)
    }

    /// Every level write in order, as `(pin, high)`.
    pub fn history(&self) -> Vec<(u8, bool)> {
        self.state.borrow().history.clone()
    }

    fn write(
        &mut self,
        pin: u8,
        high: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.state.borrow_mut();
        if st.failing.contains(&pin) {
            return Err(Box::new(HwError::Gpio(format!("simulated failure on pin {pin}"))));
        }
        if !st.acquired.contains(&pin) {
            return Err(Box::new(HwError::PinNotAcquired(pin)));
        }
        st.levels.insert(pin, high);
        st.history.push((pin, high));
        Ok(())
    }
}

impl OutputPins for SimulatedPins {
    fn acquire_output(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.state.borrow_mut();
        if st.failing.contains(&pin) {
            return Err(Box::new(HwError::Gpio(format!("simulated failure on pin {pin}"))));
        }
        if !st.acquired.insert(pin) {
            return Err(Box::new(HwError::PinAlreadyAcquired(pin)));
        }
        st.levels.insert(pin, false);
        tracing::debug!(pin, "simulated output acquired");
        Ok(())
    }

    fn set_high(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(pin, true)
    }

    fn set_low(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(pin, false)
    }

    fn release(&mut self, pin: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.state.borrow_mut();
        if !st.acquired.remove(&pin) {
            return Err(Box::new(HwError::PinNotAcquired(pin)));
        }
        st.levels.insert(pin, false);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InputState {
    pending: VecDeque<KeyEvent>,
    connected: bool,
    notices: VecDeque<DeviceNotice>,
}

/// Scripted key source.
#[derive(Debug, Clone)]
pub struct SimulatedInput {
    state: Rc<RefCell<InputState>>,
}

impl Default for SimulatedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInput {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(InputState {
                connected: true,
                ..InputState::default()
            })),
        }
    }

    /// Queue an event for the next poll.
    pub fn push(&self, code: u16, value: i32) {
        self.state.borrow_mut().pending.push_back(KeyEvent { code, value });
    }

    pub fn set_connected(&self, connected: bool) {
        let mut st = self.state.borrow_mut();
        if st.connected != connected {
            st.notices.push_back(if connected {
                DeviceNotice::Connected
            } else {
                DeviceNotice::Disconnected
            });
        }
        st.connected = connected;
    }
}

impl InputSource for SimulatedInput {
    fn poll(&mut self, _now: Instant) -> Vec<KeyEvent> {
        let mut st = self.state.borrow_mut();
        if !st.connected {
            st.pending.clear();
            return Vec::new();
        }
        st.pending.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn take_notice(&mut self) -> Option<DeviceNotice> {
        self.state.borrow_mut().notices.pop_front()
    }
}

/// Counts reboot requests instead of rebooting.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPower {
    reboots: Rc<RefCell<u32>>,
}

impl SimulatedPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reboots(&self) -> u32 {
        *self.reboots.borrow()
    }
}

impl PowerControl for SimulatedPower {
    fn reboot(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        *self.reboots.borrow_mut() += 1;
        tracing::info!("reboot requested (simulated)");
        Ok(())
    }
}
