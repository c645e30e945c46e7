use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Symbol out of range: {0}")]
    InvalidSymbol(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tone playback failed: {0}")]
    Playback(String),

    #[error("Audio input unavailable: {0}")]
    AudioDevice(String),

    #[error("Spectrum analysis error: {0}")]
    Spectrum(String),

    #[error("Metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Session already running")]
    AlreadyRunning,

    #[error("Session not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, ModemError>;
