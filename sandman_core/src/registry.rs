//! Named, append-only collection of actuators that owns the relay outputs.
//!
//! Handles are indices into the registry. Nothing is ever removed, so a
//! handle resolved once stays valid for the life of the registry.

use std::time::{Duration, Instant};

use sandman_traits::{Notifier, OutputPins};

use crate::actuator::{
    Action, Actuator, ActuatorConfig, CoolDownPolicy, GlobalSettings, Mode, Transition,
};
use crate::error::RegistryError;
use crate::hw_error::map_hw_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActuatorHandle(u16);

impl ActuatorHandle {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

pub struct ActuatorRegistry {
    actuators: Vec<Actuator>,
    pins: Box<dyn OutputPins>,
    settings: GlobalSettings,
    enabled: bool,
}

impl std::fmt::Debug for ActuatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorRegistry")
            .field("actuators", &self.actuators)
            .field("settings", &self.settings)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl ActuatorRegistry {
    /// Empty, enabled registry.
    pub fn new(pins: Box<dyn OutputPins>, settings: GlobalSettings) -> Self {
        Self {
            actuators: Vec::new(),
            pins,
            settings,
            enabled: true,
        }
    }

    /// Register every config in order. Failures are logged and skipped; the
    /// rejected entries are returned.
    pub fn initialize(&mut self, configs: &[ActuatorConfig], now: Instant) -> Vec<RegistryError> {
        let mut rejected = Vec::new();
        for cfg in configs {
            match self.register(cfg.clone(), now) {
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "actuator skipped");
                    rejected.push(e);
                }
            }
        }
        rejected
    }

    /// Acquire both pins, drive them low, and append the actuator.
    pub fn register(
        &mut self,
        cfg: ActuatorConfig,
        now: Instant,
    ) -> Result<ActuatorHandle, RegistryError> {
        if self.handle(&cfg.name).is_some() {
            return Err(RegistryError::DuplicateName(cfg.name));
        }
        let index = u16::try_from(self.actuators.len()).map_err(|_| RegistryError::Full)?;

        if let Err(e) = self.pins.acquire_output(cfg.up_pin) {
            return Err(RegistryError::PinUnavailable {
                name: cfg.name,
                pin: cfg.up_pin,
                reason: map_hw_error(e.as_ref()).to_string(),
            });
        }
        if let Err(e) = self.pins.acquire_output(cfg.down_pin) {
            let _ = self.pins.release(cfg.up_pin);
            return Err(RegistryError::PinUnavailable {
                name: cfg.name,
                pin: cfg.down_pin,
                reason: map_hw_error(e.as_ref()).to_string(),
            });
        }

        let actuator = Actuator::new(cfg, now);
        actuator.outputs_low(self.pins.as_mut());
        let (up, down) = actuator.pins();
        let duration_ms =
            u64::try_from(actuator.standard_duration().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            actuator = actuator.name(),
            up_pin = up,
            down_pin = down,
            duration_ms,
            "actuator registered"
        );
        self.actuators.push(actuator);
        Ok(ActuatorHandle(index))
    }

    /// Exact, case-sensitive name lookup.
    pub fn handle(&self, name: &str) -> Option<ActuatorHandle> {
        self.actuators
            .iter()
            .position(|a| a.name() == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(ActuatorHandle)
    }

    pub fn get(&self, handle: ActuatorHandle) -> Option<&Actuator> {
        self.actuators.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators.iter()
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Forward a request to one actuator. Returns false when the handle is
    /// stale or the registry is disabled.
    pub fn set_desired_action(
        &mut self,
        handle: ActuatorHandle,
        action: Action,
        mode: Mode,
        percent: u32,
    ) -> bool {
        if !self.enabled {
            tracing::warn!(action = action.as_str(), "actuators disabled; request ignored");
            return false;
        }
        match self.actuators.get_mut(handle.index()) {
            Some(a) => {
                a.set_desired_action(action, mode, percent);
                true
            }
            None => {
                tracing::warn!(index = handle.index(), "unknown actuator handle");
                false
            }
        }
    }

    /// Request Stop in manual mode on every actuator. Moving actuators enter
    /// cool-down on the next tick without an announcement.
    pub fn stop_all(&mut self) {
        for a in &mut self.actuators {
            a.set_desired_action(Action::Stop, Mode::Manual, 100);
        }
        tracing::info!(count = self.actuators.len(), "all actuators stopped");
    }

    /// One tick for every actuator, in registration order.
    pub fn process_all(
        &mut self,
        now: Instant,
        notifier: &mut dyn Notifier,
    ) -> Vec<(ActuatorHandle, Transition)> {
        let mut changes = Vec::new();
        for (i, a) in self.actuators.iter_mut().enumerate() {
            if let Some(t) = a.process(now, &self.settings, self.pins.as_mut(), notifier)
                && let Ok(idx) = u16::try_from(i)
            {
                changes.push((ActuatorHandle(idx), t));
            }
        }
        changes
    }

    /// New global limits. Manual moves pick these up on the next tick; timed
    /// moves keep the duration they were started with.
    pub fn set_global_durations(&mut self, max_moving: Duration, cool_down: Duration) {
        self.settings.max_moving = max_moving;
        self.settings.cool_down = cool_down;
        tracing::info!(
            max_moving_ms = u64::try_from(max_moving.as_millis()).unwrap_or(u64::MAX),
            cool_down_ms = u64::try_from(cool_down.as_millis()).unwrap_or(u64::MAX),
            "global durations set"
        );
    }

    pub fn set_cool_down_policy(&mut self, policy: CoolDownPolicy) {
        self.settings.cool_down_policy = policy;
    }

    /// Disabling stops every actuator and refuses requests until re-enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.stop_all();
        }
        self.enabled = enabled;
        tracing::info!(enabled, "actuators {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Drive every output low, leaving the state machines alone.
    pub fn all_outputs_low(&mut self) {
        for a in &self.actuators {
            a.outputs_low(self.pins.as_mut());
        }
    }

    /// Drive every output low and hand the pins back.
    pub fn release_all(&mut self) {
        for a in &self.actuators {
            a.outputs_low(self.pins.as_mut());
            let (up, down) = a.pins();
            for pin in [up, down] {
                if let Err(e) = self.pins.release(pin) {
                    tracing::warn!(
                        actuator = a.name(),
                        pin,
                        error = %map_hw_error(e.as_ref()),
                        "release failed"
                    );
                }
            }
        }
    }
}
