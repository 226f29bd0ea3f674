use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("gpio pin {0} was not acquired as an output")]
    PinNotAcquired(u8),
    #[error("gpio pin {0} is already acquired")]
    PinAlreadyAcquired(u8),
    #[error("input device {path}: {reason}")]
    InputDevice { path: String, reason: String },
    #[error("power control: {0}")]
    Power(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
