use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ControlError {
    /// The supply (or another instrument) is unreachable; start commands are
    /// refused and running loops halt rather than command a stale value.
    #[error("power supply not connected")]
    NotConnected,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("instrument call timed out")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing power supply")]
    MissingSupply,
    #[error("missing magnet voltmeter")]
    MissingVoltmeter,
    #[error("missing stage thermometer")]
    MissingThermometer,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
