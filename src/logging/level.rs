//! Severity levels
//!
//! Levels are totally ordered and carry the numeric values used by the
//! file-logging presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Log severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Level {
    /// Database-level tracing, below debug
    Db,
    Debug,
    /// Regular informational message
    #[default]
    Message,
    Warning,
    Error,
}

/// All levels in ascending order
pub const ALL_LEVELS: [Level; 5] = [
    Level::Db,
    Level::Debug,
    Level::Message,
    Level::Warning,
    Level::Error,
];

/// Error returned for an unrecognized level preset
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level preset '{0}' (expected one of ERROR, WARNING, INFO, DEBUG, DB)")]
pub struct ParseLevelError(pub String);

impl Level {
    /// Numeric value of this level
    pub fn value(self) -> u8 {
        match self {
            Level::Db => 5,
            Level::Debug => 10,
            Level::Message => 20,
            Level::Warning => 30,
            Level::Error => 40,
        }
    }

    /// Look up a level by its exact numeric value
    pub fn from_value(value: u8) -> Option<Self> {
        ALL_LEVELS.into_iter().find(|l| l.value() == value)
    }

    /// Name written into log lines and accepted as a preset
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Db => "DB",
            Level::Debug => "DEBUG",
            Level::Message => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so width/alignment specifiers apply
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_LEVELS
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

impl TryFrom<String> for Level {
    type Error = ParseLevelError;

    fn try_from(value: String) -> Result<Self, ParseLevelError> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Db,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Message,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Db < Level::Debug);
        assert!(Level::Debug < Level::Message);
        assert!(Level::Message < Level::Warning);
        assert!(Level::Warning < Level::Error);
    }

    #[test]
    fn test_preset_names_map_to_values() {
        let expected = [("ERROR", 40), ("WARNING", 30), ("INFO", 20), ("DEBUG", 10), ("DB", 5)];
        for (name, value) in expected {
            let level: Level = name.parse().unwrap();
            assert_eq!(level.value(), value);
        }
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!("info".parse::<Level>().is_err());
        assert!("TRACE".parse::<Level>().is_err());
        assert_eq!(
            "VERBOSE".parse::<Level>(),
            Err(ParseLevelError("VERBOSE".to_string()))
        );
    }

    #[test]
    fn test_try_from_string() {
        assert_eq!(Level::try_from("WARNING".to_string()), Ok(Level::Warning));
        assert_eq!(
            Level::try_from("LOUD".to_string()),
            Err(ParseLevelError("LOUD".to_string()))
        );
        assert_eq!(String::from(Level::Db), "DB");
    }

    #[test]
    fn test_from_value() {
        assert_eq!(Level::from_value(20), Some(Level::Message));
        assert_eq!(Level::from_value(5), Some(Level::Db));
        assert_eq!(Level::from_value(15), None);
    }

    #[test]
    fn test_display_honours_width() {
        assert_eq!(format!("{:<8}|", Level::Message), "INFO    |");
        assert_eq!(format!("{}", Level::Warning), "WARNING");
    }
}
