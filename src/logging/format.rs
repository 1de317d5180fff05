//! Per-source line formats
//!
//! Each logical source gets its own line format. Formats are resolved once,
//! when a source is attached to a destination, and then stored on the
//! attachment itself.

use std::collections::HashMap;
use std::sync::Arc;

use super::record::LogRecord;

/// Time pattern used on the console
const SIMPLE_TIME_FORMAT: &str = "%H:%M:%S";
/// Time pattern used in the log file
const FULL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Width the level name is padded to in the log file
const FILE_LEVEL_WIDTH: usize = 8;

/// A resolved line layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    /// strftime pattern for the timestamp, `None` to omit it
    time_format: Option<String>,
    /// Level column, `Some(0)` for unpadded, `None` to omit it
    level_width: Option<usize>,
    /// Source tag including its ` :: ` suffix, empty for untagged sources
    tag: String,
}

impl LineFormat {
    /// Format that renders only the message text
    pub fn message_only() -> Self {
        Self {
            time_format: None,
            level_width: None,
            tag: String::new(),
        }
    }

    /// Format for a source with the given tag
    pub fn for_source(simple: bool, tag: impl Into<String>) -> Self {
        let (time_format, level_width) = if simple {
            (SIMPLE_TIME_FORMAT, 0)
        } else {
            (FULL_TIME_FORMAT, FILE_LEVEL_WIDTH)
        };
        Self {
            time_format: Some(time_format.to_string()),
            level_width: Some(level_width),
            tag: tag.into(),
        }
    }

    #[cfg(test)]
    fn tag(&self) -> &str {
        &self.tag
    }

    /// Render a record as a single line, without the trailing newline
    pub fn format(&self, record: &LogRecord) -> String {
        let mut line = String::with_capacity(record.message.len() + 48);
        if let Some(pattern) = &self.time_format {
            line.push_str(&record.timestamp.format(pattern).to_string());
            line.push(' ');
        }
        if let Some(width) = self.level_width {
            line.push_str(&format!("{:<width$} ", record.level, width = width));
        }
        line.push_str(&self.tag);
        line.push_str(&record.message);
        line
    }
}

/// Derive the tag printed in front of a dependency source's lines
///
/// The name is cut after the first three word characters of its last
/// dotted segment that has at least three, then upper-cased:
/// `axum.server` becomes `AXUM.SER :: `.
pub fn source_tag(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let is_word = |c: &char| c.is_alphanumeric() || *c == '_';

    let cut = (0..chars.len())
        .rev()
        .filter(|&i| chars[i] == '.')
        .find(|&i| chars.len() > i + 3 && chars[i + 1..=i + 3].iter().all(is_word))
        .map(|i| i + 4)
        .unwrap_or(chars.len());

    let short: String = chars[..cut].iter().collect();
    format!("{} :: ", short.to_uppercase())
}

/// Maps logical source names to their line formats
#[derive(Debug, Clone)]
pub struct FormatterRegistry {
    /// The application's own source, printed without a tag
    primary: String,
    /// Every declared source, primary included
    sources: Vec<String>,
}

impl FormatterRegistry {
    /// Create a registry for the primary source and its dependency sources
    pub fn new(primary: impl Into<String>, dependencies: &[String]) -> Self {
        let primary = primary.into();
        let mut sources = vec![primary.clone()];
        for name in dependencies {
            if !sources.contains(name) {
                sources.push(name.clone());
            }
        }
        Self { primary, sources }
    }

    /// Every declared source, primary first
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Format used for sources without an entry
    pub fn default_format() -> Arc<LineFormat> {
        Arc::new(LineFormat::message_only())
    }

    /// Formats for every declared source
    ///
    /// `simple` selects the console layout (time only, unpadded level);
    /// otherwise the file layout with full date and padded level is used.
    pub fn formatters_for(&self, simple: bool) -> HashMap<String, Arc<LineFormat>> {
        self.sources
            .iter()
            .map(|name| {
                let tag = if *name == self.primary {
                    String::new()
                } else {
                    source_tag(name)
                };
                (name.clone(), Arc::new(LineFormat::for_source(simple, tag)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Level;
    use chrono::{Local, TimeZone};

    fn record(source: &str, level: Level, message: &str) -> LogRecord {
        let timestamp = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        LogRecord::new(timestamp, level, source, message)
    }

    fn registry() -> FormatterRegistry {
        FormatterRegistry::new(
            "app",
            &["axum.server".to_string(), "reqwest".to_string()],
        )
    }

    #[test]
    fn test_source_tag() {
        assert_eq!(source_tag("axum.server"), "AXUM.SER :: ");
        assert_eq!(source_tag("tornado.general"), "TORNADO.GEN :: ");
        assert_eq!(source_tag("reqwest"), "REQWEST :: ");
        assert_eq!(source_tag("hyper.io"), "HYPER.IO :: ");
        assert_eq!(source_tag("a.bcde.fg"), "A.BCD :: ");
    }

    #[test]
    fn test_file_format_pads_level() {
        let formats = registry().formatters_for(false);
        let line = formats["axum.server"].format(&record("axum.server", Level::Warning, "slow"));
        assert_eq!(line, "2026-03-04 05:06:07 WARNING  AXUM.SER :: slow");
    }

    #[test]
    fn test_console_format_omits_date() {
        let formats = registry().formatters_for(true);
        let line = formats["reqwest"].format(&record("reqwest", Level::Message, "GET /"));
        assert_eq!(line, "05:06:07 INFO REQWEST :: GET /");
    }

    #[test]
    fn test_primary_source_has_no_tag() {
        let formats = registry().formatters_for(false);
        assert_eq!(formats["app"].tag(), "");
        let line = formats["app"].format(&record("app", Level::Db, "query"));
        assert_eq!(line, "2026-03-04 05:06:07 DB       query");
    }

    #[test]
    fn test_unregistered_source_falls_back_to_default() {
        assert!(!registry().formatters_for(false).contains_key("unknown.lib"));
        let format = FormatterRegistry::default_format();
        assert_eq!(format.tag(), "");
        let line = format.format(&record("unknown.lib", Level::Error, "boom"));
        assert_eq!(line, "boom");
    }

    #[test]
    fn test_every_declared_source_has_entry() {
        let formats = registry().formatters_for(true);
        assert_eq!(formats.len(), 3);
        assert!(formats.contains_key("app"));
    }
}
