use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SandmanError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an actuator named '{0}' already exists")]
    DuplicateName(String),
    #[error("actuator '{name}': could not acquire pin {pin}: {reason}")]
    PinUnavailable {
        name: String,
        pin: u8,
        reason: String,
    },
    #[error("registry is full")]
    Full,
}

#[derive(Debug, Error, Clone)]
pub enum RoutineError {
    #[error("routine file could not be loaded: {0}")]
    Load(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing output pins")]
    MissingPins,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
