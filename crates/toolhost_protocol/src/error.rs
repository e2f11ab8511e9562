use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid message format")]
    InvalidFrame,
    #[error("invalid method format: {0}")]
    InvalidMethod(String),
}
