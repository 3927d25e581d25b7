// ================================================================
// File: vcbot-core/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// The user who invoked a join is not sitting in any voice channel of the guild.
    #[error("User {0} is not in a voice channel")]
    NotInVoiceChannel(String),
}

impl From<songbird::error::JoinError> for Error {
    fn from(e: songbird::error::JoinError) -> Self {
        Error::Voice(e.to_string())
    }
}
