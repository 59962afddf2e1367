use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Session establishment failed. Retried once, then fatal for the session.
    #[error("Connection failed: {0}")]
    Connection(String),
    /// A specific prompt was rejected by the backend. Advisory, non-fatal.
    #[error("Prompt rejected: {0}")]
    InvalidPrompt(String),
    /// A weight was set on a prompt id that does not exist. Fatal to the
    /// call, not to the session.
    #[error("Unknown prompt id: {0}")]
    UnknownPrompt(String),
    /// Mid-stream disconnect. Triggers the single-reconnect policy.
    #[error("Stream interrupted: {0}")]
    TransientStream(String),
    /// Audio output unavailable. Logged, playback degrades to silence.
    #[error("Audio device error: {0}")]
    Device(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
