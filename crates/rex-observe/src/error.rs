use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log format {0:?} (expected text, json or journald)")]
    InvalidFormat(String),

    #[error("invalid log time zone {0:?} (expected utc or local)")]
    InvalidTimeZone(String),

    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("journald output is only available on Linux")]
    JournaldNotSupported,

    #[error("failed to connect to journald: {0}")]
    Journald(#[source] std::io::Error),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

pub type LogResult<T> = Result<T, LogError>;
