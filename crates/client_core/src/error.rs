use shared::error::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{command} is only available to the session owner")]
    OwnerOnly { command: &'static str },
    #[error("server answered {step} with status {status}")]
    Unsuccessful { step: String, status: String },
    #[error("quiz has no question at index {index}")]
    NoSuchQuestion { index: usize },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
