#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the sandman daemon.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Routine files are JSON; a malformed step is skipped, not fatal.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::Deserializer;

/// Longest actuator name accepted, in bytes.
pub const MAX_NAME_LEN: usize = 31;

/// What a binding or routine step asks an actuator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSetting {
    Stop,
    Up,
    Down,
}

impl ActionSetting {
    /// Match by prefix, so `"upward"` reads as `Up`. Case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("stop") {
            Some(Self::Stop)
        } else if s.starts_with("up") {
            Some(Self::Up)
        } else if s.starts_with("down") {
            Some(Self::Down)
        } else {
            None
        }
    }
}

impl<'de> Deserialize<'de> for ActionSetting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized action '{s}' (want stop|up|down)"))
        })
    }
}

/// Cool-down behaviour when a new move is requested mid-cool-down.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoolDownPolicySetting {
    /// Ignore the request; cool-down always lasts the full duration.
    #[default]
    Hold,
    /// Restart the cool-down timer.
    RearmOnInput,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActuatorCfg {
    pub name: String,
    pub up_pin: u8,
    pub down_pin: u8,
    /// Full-travel time for a timed move at 100%.
    #[serde(default)]
    pub moving_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlsCfg {
    pub max_moving_duration_ms: u64,
    pub cool_down_duration_ms: u64,
    pub cool_down_policy: CoolDownPolicySetting,
    pub actuators: Vec<ActuatorCfg>,
}

impl Default for ControlsCfg {
    fn default() -> Self {
        Self {
            max_moving_duration_ms: 100_000,
            cool_down_duration_ms: 50_000,
            cool_down_policy: CoolDownPolicySetting::Hold,
            actuators: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BindingCfg {
    pub key_code: u16,
    pub control: String,
    pub action: ActionSetting,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct InputCfg {
    /// evdev node, e.g. `/dev/input/event0`. No input device when absent.
    pub device: Option<PathBuf>,
    pub bindings: Vec<BindingCfg>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsCfg {
    /// Holds `routines/` and `reports/`.
    pub data_dir: PathBuf,
    pub socket: PathBuf,
}

impl Default for PathsCfg {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/sandman"),
            socket: PathBuf::from("/tmp/sandman.sock"),
        }
    }
}

impl PathsCfg {
    pub fn routine_file(&self) -> PathBuf {
        self.data_dir.join("routines").join("sandman.rtn")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub controls: ControlsCfg,
    pub input: InputCfg,
    pub paths: PathsCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.controls.max_moving_duration_ms == 0 {
            eyre::bail!("controls.max_moving_duration_ms must be > 0");
        }
        if self.controls.max_moving_duration_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("controls.max_moving_duration_ms is unreasonably large (>24h)");
        }

        for (i, a) in self.controls.actuators.iter().enumerate() {
            if a.name.is_empty() {
                eyre::bail!("controls.actuators[{i}].name must not be empty");
            }
            if a.name.len() > MAX_NAME_LEN {
                eyre::bail!(
                    "controls.actuators[{i}].name '{}' is longer than {MAX_NAME_LEN} bytes",
                    a.name
                );
            }
            if a.up_pin == a.down_pin {
                eyre::bail!(
                    "controls.actuators[{i}] ('{}') uses pin {} for both up and down",
                    a.name,
                    a.up_pin
                );
            }
        }

        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{rot}'");
        }

        // Duplicate actuator names are left to the registry, which skips them.
        Ok(())
    }
}

/// One routine step as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineStepCfg {
    pub delay_sec: u64,
    pub control: String,
    pub action: ActionSetting,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepJson {
    delay_sec: u64,
    control_action: ControlActionJson,
}

#[derive(Deserialize)]
struct ControlActionJson {
    control: String,
    action: ActionSetting,
}

#[derive(Deserialize)]
struct RoutineJson {
    // Older schedule files call the list "events".
    #[serde(alias = "events")]
    steps: Vec<serde_json::Value>,
}

/// Parse a routine document. Steps that fail to parse are logged and
/// skipped; a document without a `steps` array is an error.
pub fn parse_routine(json: &str) -> eyre::Result<Vec<RoutineStepCfg>> {
    let doc: RoutineJson =
        serde_json::from_str(json).map_err(|e| eyre::eyre!("routine is not valid: {e}"))?;
    let mut steps = Vec::with_capacity(doc.steps.len());
    for (idx, raw) in doc.steps.into_iter().enumerate() {
        match serde_json::from_value::<StepJson>(raw) {
            Ok(s) => steps.push(RoutineStepCfg {
                delay_sec: s.delay_sec,
                control: s.control_action.control,
                action: s.control_action.action,
            }),
            Err(e) => tracing::warn!(step = idx, error = %e, "skipping unparsable routine step"),
        }
    }
    Ok(steps)
}

/// Read and parse a routine file. `Ok(None)` when the file does not exist.
pub fn load_routine(path: &Path) -> eyre::Result<Option<Vec<RoutineStepCfg>>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => eyre::bail!("read routine {:?}: {}", path, e),
    };
    parse_routine(&text).map(Some)
}
