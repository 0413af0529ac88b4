use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identifier errors
    #[error("Invalid bike id: {0}")]
    InvalidBikeId(String),

    #[error("Invalid card code: {0}")]
    InvalidCardCode(String),

    #[error("Invalid dock id: {0}")]
    InvalidDockId(String),

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, Error>;
