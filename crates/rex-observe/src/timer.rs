use std::{fmt, str::FromStr, sync::OnceLock};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::error::LogError;

/// Local UTC offset captured by [`init_local_offset`].
static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Time zone used for log timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTimeZone {
    #[default]
    Utc,
    /// Offset captured by [`init_local_offset`]; UTC if it was never captured.
    Local,
}

impl FromStr for LogTimeZone {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            _ => Err(LogError::InvalidTimeZone(s.to_string())),
        }
    }
}

impl fmt::Display for LogTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogTimeZone::Utc => "utc",
            LogTimeZone::Local => "local",
        })
    }
}

/// Capture the local UTC offset for [`LogTimeZone::Local`] timestamps.
///
/// Must run in `main` before the tokio runtime (or any other thread) starts: most
/// Unix platforms refuse to read the offset once the process is multi-threaded.
/// Falls back to UTC when detection fails. Later calls are no-ops.
///
/// ```no_run
/// fn main() {
///     rex_observe::init_local_offset();
///     // start the async runtime afterwards
/// }
/// ```
pub fn init_local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// RFC 3339 timestamps at a fixed offset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rfc3339Timer {
    offset: UtcOffset,
}

impl Rfc3339Timer {
    pub(crate) fn new(tz: LogTimeZone) -> Self {
        let offset = match tz {
            LogTimeZone::Utc => UtcOffset::UTC,
            LogTimeZone::Local => LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC),
        };
        Self { offset }
    }
}

impl FormatTime for Rfc3339Timer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        match now.format(&Rfc3339) {
            Ok(ts) => write!(w, "{ts}"),
            Err(_) => w.write_str("<invalid-time>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_zones() {
        assert_eq!("UTC".parse::<LogTimeZone>().unwrap(), LogTimeZone::Utc);
        assert_eq!("local".parse::<LogTimeZone>().unwrap(), LogTimeZone::Local);
        assert!("pst".parse::<LogTimeZone>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&LogTimeZone::Local).unwrap(), r#""local""#);
        let tz: LogTimeZone = serde_json::from_str(r#""utc""#).unwrap();
        assert_eq!(tz, LogTimeZone::Utc);
    }

    #[test]
    fn utc_timer_ignores_local_offset() {
        assert_eq!(Rfc3339Timer::new(LogTimeZone::Utc).offset, UtcOffset::UTC);
    }

    #[test]
    fn local_offset_is_stable_once_captured() {
        let first = init_local_offset();
        assert_eq!(init_local_offset(), first);
        assert_eq!(Rfc3339Timer::new(LogTimeZone::Local).offset, first);
    }

    #[test]
    fn writes_rfc3339() {
        let mut out = String::new();
        Rfc3339Timer::new(LogTimeZone::Utc)
            .format_time(&mut Writer::new(&mut out))
            .unwrap();

        assert!(OffsetDateTime::parse(&out, &Rfc3339).is_ok(), "{out}");
        assert!(out.ends_with('Z'), "{out}");
    }
}
