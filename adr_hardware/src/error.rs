use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("instrument bus error: {0}")]
    Bus(String),
    #[error("instrument timeout")]
    Timeout,
    #[error("instrument not connected")]
    NotConnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
