use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::{format::LogFormat, level::LogLevel, timer::LogTimeZone};

/// Logger section of the frontend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives.
    pub level: LogLevel,
    pub time_zone: LogTimeZone,
    /// Include the emitting module in each record.
    pub with_targets: bool,
    /// ANSI colors for text output; only honoured when stdout is a terminal.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: LogLevel::default(),
            time_zone: LogTimeZone::Utc,
            with_targets: true,
            color: true,
        }
    }
}

impl LogConfig {
    pub(crate) fn use_ansi(&self) -> bool {
        self.color && std::io::stdout().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, LogConfig::default());
    }

    #[test]
    fn reads_camel_case_keys() {
        let cfg: LogConfig = serde_json::from_str(
            r#"{ "format": "json", "level": "rex_core=debug,info", "timeZone": "local", "withTargets": false }"#,
        )
        .unwrap();

        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level.as_str(), "rex_core=debug,info");
        assert_eq!(cfg.time_zone, LogTimeZone::Local);
        assert!(!cfg.with_targets);
        assert!(cfg.color);
    }

    #[test]
    fn bad_level_is_a_config_error() {
        assert!(serde_json::from_str::<LogConfig>(r#"{ "level": "rex_core=everything" }"#).is_err());
    }

    #[test]
    fn color_off_disables_ansi() {
        let cfg = LogConfig {
            color: false,
            ..Default::default()
        };
        assert!(!cfg.use_ansi());
    }
}
