//! Logging setup for the remote execution frontend.
//!
//! [`init_logging`] installs the global `tracing` subscriber described by a
//! [`LogConfig`]: an `EnvFilter` plus text, JSON or journald output.
mod config;
mod error;
mod format;
mod level;
mod timer;

pub use config::LogConfig;
pub use error::{LogError, LogResult};
pub use format::LogFormat;
pub use level::LogLevel;
pub use timer::{LogTimeZone, init_local_offset};

use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::timer::Rfc3339Timer;

/// Install the global subscriber.
///
/// Call [`init_local_offset`] first when `time_zone` is `local`.
/// Fails with [`LogError::AlreadyInitialized`] on a second call.
///
/// ```no_run
/// use rex_observe::{LogConfig, init_logging};
///
/// init_logging(&LogConfig::default()).expect("logger");
/// tracing::info!("ready");
/// ```
pub fn init_logging(cfg: &LogConfig) -> LogResult<()> {
    let filter = cfg.level.to_env_filter();
    let timer = Rfc3339Timer::new(cfg.time_zone);

    match cfg.format {
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_ansi(cfg.use_ansi())
                .with_target(cfg.with_targets)
                .with_timer(timer);
            install(tracing_subscriber::registry().with(filter).with(layer))
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(cfg.with_targets)
                .with_timer(timer);
            install(tracing_subscriber::registry().with(filter).with(layer))
        }
        LogFormat::Journald => journald(filter),
    }
}

#[cfg(target_os = "linux")]
fn journald(filter: tracing_subscriber::EnvFilter) -> LogResult<()> {
    let layer = tracing_journald::layer().map_err(LogError::Journald)?;
    install(tracing_subscriber::registry().with(filter).with(layer))
}

#[cfg(not(target_os = "linux"))]
fn journald(_filter: tracing_subscriber::EnvFilter) -> LogResult<()> {
    Err(LogError::JournaldNotSupported)
}

fn install<S>(subscriber: S) -> LogResult<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}
