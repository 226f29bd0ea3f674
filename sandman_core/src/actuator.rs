//! State machine for one motorized bed segment.
//!
//! An actuator drives two relay outputs (up and down). It only changes
//! physical state inside [`Actuator::process`]; [`Actuator::set_desired_action`]
//! records intent for the next tick.
//!
//! ```text
//!          Up/Down            Stop or time up
//!   Idle ───────────► Moving ───────────────► CoolingDown
//!    ▲                 │  ▲                        │
//!    │                 └──┘ opposite direction     │
//!    └─────────────────────────────────────────────┘
//!                      cool-down elapsed
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use sandman_config::{ActionSetting, CoolDownPolicySetting};
use sandman_traits::{Notifier, OutputPins};

use crate::hw_error::map_hw_error;
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    MovingUp,
    MovingDown,
    CoolingDown,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::MovingUp => "moving up",
            Self::MovingDown => "moving down",
            Self::CoolingDown => "cool down",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Stop,
    Up,
    Down,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Stop => Self::Stop,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl From<ActionSetting> for Action {
    fn from(a: ActionSetting) -> Self {
        match a {
            ActionSetting::Stop => Self::Stop,
            ActionSetting::Up => Self::Up,
            ActionSetting::Down => Self::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Held from a controller; runs until released or the global maximum.
    Manual,
    /// Commanded; runs for a share of the standard duration.
    Timed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoolDownPolicy {
    /// Requests during cool-down are dropped.
    #[default]
    Hold,
    /// A request during cool-down restarts the cool-down timer.
    RearmOnInput,
}

impl From<CoolDownPolicySetting> for CoolDownPolicy {
    fn from(p: CoolDownPolicySetting) -> Self {
        match p {
            CoolDownPolicySetting::Hold => Self::Hold,
            CoolDownPolicySetting::RearmOnInput => Self::RearmOnInput,
        }
    }
}

/// Settings shared by every actuator in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSettings {
    pub max_moving: Duration,
    pub cool_down: Duration,
    pub cool_down_policy: CoolDownPolicy,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            max_moving: Duration::from_secs(100),
            cool_down: Duration::from_secs(50),
            cool_down_policy: CoolDownPolicy::Hold,
        }
    }
}

impl From<&sandman_config::ControlsCfg> for GlobalSettings {
    fn from(c: &sandman_config::ControlsCfg) -> Self {
        Self {
            max_moving: Duration::from_millis(c.max_moving_duration_ms),
            cool_down: Duration::from_millis(c.cool_down_duration_ms),
            cool_down_policy: c.cool_down_policy.into(),
        }
    }
}

/// How long a move may run before the actuator stops itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveLimit {
    /// Fixed when the action was requested.
    Timed(Duration),
    /// Read from the global settings on every tick.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorConfig {
    pub name: String,
    pub up_pin: u8,
    pub down_pin: u8,
    pub standard_duration: Duration,
}

impl From<&sandman_config::ActuatorCfg> for ActuatorConfig {
    fn from(c: &sandman_config::ActuatorCfg) -> Self {
        Self {
            name: c.name.clone(),
            up_pin: c.up_pin,
            down_pin: c.down_pin,
            standard_duration: Duration::from_millis(c.moving_duration_ms),
        }
    }
}

/// A state change made by one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub to: State,
}

#[derive(Debug)]
pub struct Actuator {
    name: String,
    up_pin: u8,
    down_pin: u8,
    standard_duration: Duration,
    state: State,
    desired: Action,
    mode: Mode,
    limit: MoveLimit,
    since: Timer,
}

/// `standard * min(percent, 100) / 100`, truncated to whole milliseconds.
pub fn scaled_duration(standard: Duration, percent: u32) -> Duration {
    let pct = u128::from(percent.min(100));
    let ms = standard.as_millis() * pct / 100;
    Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
}

impl Actuator {
    pub fn new(config: ActuatorConfig, now: Instant) -> Self {
        Self {
            name: config.name,
            up_pin: config.up_pin,
            down_pin: config.down_pin,
            standard_duration: config.standard_duration,
            state: State::Idle,
            desired: Action::Stop,
            mode: Mode::Manual,
            limit: MoveLimit::Manual,
            since: Timer::started_at(now),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pins(&self) -> (u8, u8) {
        (self.up_pin, self.down_pin)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn desired_action(&self) -> Action {
        self.desired
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn standard_duration(&self) -> Duration {
        self.standard_duration
    }

    /// When the current state was entered.
    pub fn state_entered(&self) -> Instant {
        self.since.started()
    }

    /// The limit the current or next move runs under.
    pub fn moving_limit(&self, settings: &GlobalSettings) -> Duration {
        match self.limit {
            MoveLimit::Timed(d) => d,
            MoveLimit::Manual => settings.max_moving,
        }
    }

    /// Record what the next `process` call should do. `percent` only matters
    /// in timed mode and is clamped to 100.
    pub fn set_desired_action(&mut self, action: Action, mode: Mode, percent: u32) {
        self.desired = action;
        self.mode = mode;
        self.limit = match mode {
            Mode::Timed => MoveLimit::Timed(scaled_duration(self.standard_duration, percent)),
            Mode::Manual => MoveLimit::Manual,
        };
        tracing::debug!(
            actuator = %self.name,
            action = action.as_str(),
            ?mode,
            limit = ?self.limit,
            "desired action set"
        );
    }

    /// Advance the state machine by one tick.
    pub fn process(
        &mut self,
        now: Instant,
        settings: &GlobalSettings,
        pins: &mut dyn OutputPins,
        notifier: &mut dyn Notifier,
    ) -> Option<Transition> {
        let from = self.state;
        match self.state {
            State::Idle => match self.desired {
                Action::Stop => return None,
                Action::Up => {
                    self.state = State::MovingUp;
                    self.drive(pins, Some(self.up_pin));
                }
                Action::Down => {
                    self.state = State::MovingDown;
                    self.drive(pins, Some(self.down_pin));
                }
            },
            State::MovingUp | State::MovingDown => {
                let current = if self.state == State::MovingUp {
                    Action::Up
                } else {
                    Action::Down
                };
                let elapsed = self.since.elapsed(now);
                if self.desired == current && elapsed < self.moving_limit(settings) {
                    return None;
                }
                if self.desired == current.opposite() {
                    let (state, pin) = match self.desired {
                        Action::Up => (State::MovingUp, self.up_pin),
                        _ => (State::MovingDown, self.down_pin),
                    };
                    self.state = state;
                    self.drive(pins, Some(pin));
                } else {
                    self.state = State::CoolingDown;
                    self.desired = Action::Stop;
                    self.drive(pins, None);
                }
            }
            State::CoolingDown => {
                let requested = self.desired != Action::Stop;
                self.desired = Action::Stop;
                if requested && settings.cool_down_policy == CoolDownPolicy::RearmOnInput {
                    tracing::debug!(actuator = %self.name, "cool-down restarted by new request");
                    self.since.restart(now);
                    return None;
                }
                if self.since.elapsed(now) < settings.cool_down {
                    return None;
                }
                self.state = State::Idle;
                self.drive(pins, None);
                self.since.restart(now);
                tracing::info!(
                    actuator = %self.name,
                    from = %from,
                    to = %self.state,
                    "state transition"
                );
                return Some(Transition { from, to: self.state });
            }
        }

        self.since.restart(now);
        self.announce(notifier);
        tracing::info!(actuator = %self.name, from = %from, to = %self.state, "state transition");
        Some(Transition { from, to: self.state })
    }

    /// Force both outputs low without touching the state machine.
    pub(crate) fn outputs_low(&self, pins: &mut dyn OutputPins) {
        self.drive(pins, None);
    }

    // Sets `on` high after the other pin is low; `None` clears both.
    fn drive(&self, pins: &mut dyn OutputPins, on: Option<u8>) {
        for pin in [self.up_pin, self.down_pin] {
            if Some(pin) == on {
                continue;
            }
            if let Err(e) = pins.set_low(pin) {
                tracing::warn!(
                    actuator = %self.name,
                    pin,
                    error = %map_hw_error(e.as_ref()),
                    "set_low failed"
                );
            }
        }
        if let Some(pin) = on
            && let Err(e) = pins.set_high(pin)
        {
            tracing::warn!(
                actuator = %self.name,
                pin,
                error = %map_hw_error(e.as_ref()),
                "set_high failed"
            );
        }
    }

    fn announce(&self, notifier: &mut dyn Notifier) {
        if self.mode == Mode::Manual {
            return;
        }
        let suffix = match self.state {
            State::MovingUp => "moving_up",
            State::MovingDown => "moving_down",
            State::CoolingDown => "stop",
            State::Idle => return,
        };
        notifier.notify(&format!("{}_{suffix}", self.name));
    }
}
