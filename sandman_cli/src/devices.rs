//! Pick real or simulated hardware for this build.

use sandman_config::Config;
use sandman_traits::{InputSource, OutputPins, PowerControl};

pub struct Devices {
    pub pins: Box<dyn OutputPins>,
    pub input: Option<Box<dyn InputSource>>,
    pub power: Box<dyn PowerControl>,
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn relays() -> eyre::Result<(Box<dyn OutputPins>, Box<dyn PowerControl>)> {
    let pins = sandman_hardware::gpio::GpioPins::new().map_err(eyre::Report::new)?;
    Ok((Box::new(pins), Box::new(sandman_hardware::power::SystemPower)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn relays() -> eyre::Result<(Box<dyn OutputPins>, Box<dyn PowerControl>)> {
    tracing::info!("built without hardware support; relays and reboot are simulated");
    Ok((
        Box::new(sandman_hardware::SimulatedPins::new()),
        Box::new(sandman_hardware::SimulatedPower::new()),
    ))
}

#[cfg(target_os = "linux")]
fn input(cfg: &Config) -> Option<Box<dyn InputSource>> {
    cfg.input.device.as_ref().map(|path| {
        tracing::info!(device = ?path, "using input device");
        Box::new(sandman_hardware::input::EventDevice::new(path)) as Box<dyn InputSource>
    })
}

#[cfg(not(target_os = "linux"))]
fn input(cfg: &Config) -> Option<Box<dyn InputSource>> {
    if cfg.input.device.is_some() {
        tracing::warn!("input devices need Linux; ignoring [input] device");
    }
    None
}

pub fn open(cfg: &Config) -> eyre::Result<Devices> {
    let (pins, power) = relays()?;
    Ok(Devices {
        pins,
        input: input(cfg),
        power,
    })
}
