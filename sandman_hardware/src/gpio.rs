//! Relay outputs on the Raspberry Pi header via rppal.

use std::collections::HashMap;

use rppal::gpio::{Gpio, OutputPin};
use sandman_traits::OutputPins;
use tracing::debug;

use crate::error::{HwError, Result};

pub struct GpioPins {
    gpio: Gpio,
    outputs: HashMap<u8, OutputPin>,
}

impl GpioPins {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            gpio,
            outputs: HashMap::new(),
        })
    }

    fn output(&mut self, pin: u8) -> Result<&mut OutputPin> {
        self.outputs
            .get_mut(&pin)
            .ok_or(HwError::PinNotAcquired(pin))
    }
}

impl OutputPins for GpioPins {
    fn acquire_output(
        &mut self,
        pin: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.outputs.contains_key(&pin) {
            return Err(Box::new(HwError::PinAlreadyAcquired(pin)));
        }
        let out = self
            .gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))?
            .into_output_low();
        debug!(pin, "gpio output acquired");
        self.outputs.insert(pin, out);
        Ok(())
    }

    fn set_high(
        &mut self,
        pin: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.output(pin)?.set_high();
        Ok(())
    }

    fn set_low(
        &mut self,
        pin: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.output(pin)?.set_low();
        Ok(())
    }

    fn release(
        &mut self,
        pin: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Dropping the OutputPin resets it to its prior mode.
        match self.outputs.remove(&pin) {
            Some(mut out) => {
                out.set_low();
                Ok(())
            }
            None => Err(Box::new(HwError::PinNotAcquired(pin))),
        }
    }
}
