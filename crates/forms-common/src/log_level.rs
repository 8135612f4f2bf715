//! Rule engine log level, selected per page through the context URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Query parameter that selects the log level on a form page.
pub const LOG_LEVEL_PARAM: &str = "afLogLevel";

/// Log level shared by the rule engine runtime and the worker's own tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Derive the level from the page URL the worker was started for.
    ///
    /// Missing, unknown or unparsable values fall back to the default.
    pub fn from_url(url: &str) -> Self {
        let Ok(url) = Url::parse(url) else {
            return Self::default();
        };
        url.query_pairs()
            .find(|(key, _)| key == LOG_LEVEL_PARAM)
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or_default()
    }

    /// Name understood by the rule engine runtime.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(UnknownLogLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLogLevel(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_query_param() {
        assert_eq!(
            LogLevel::from_url("https://forms.example/content/form.html?afLogLevel=debug"),
            LogLevel::Debug
        );
    }

    #[test]
    fn test_level_param_is_case_insensitive() {
        assert_eq!(
            LogLevel::from_url("https://forms.example/?a=1&afLogLevel=WARN"),
            LogLevel::Warn
        );
    }

    #[test]
    fn test_level_defaults() {
        assert_eq!(LogLevel::from_url("https://forms.example/"), LogLevel::Error);
        assert_eq!(
            LogLevel::from_url("https://forms.example/?afLogLevel=verbose"),
            LogLevel::Error
        );
        assert_eq!(LogLevel::from_url("not a url"), LogLevel::Error);
    }

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(LogLevel::Off.to_filter(), LevelFilter::OFF);
        assert_eq!(LogLevel::Info.to_filter(), LevelFilter::INFO);
    }

    #[test]
    fn test_level_serde_lowercase() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
    }
}
