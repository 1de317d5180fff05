//! Most recent lines of a log file, filtered by level

use std::io;
use std::path::Path;

use chrono::NaiveDateTime;

use super::reverse::reverse_lines;
use crate::logging::Level;

/// Length of the `YYYY-MM-DD HH:MM:SS` prefix written to log files
const TIMESTAMP_LEN: usize = 19;

/// Level of a log file line, or `None` for continuation lines
///
/// Expects the file layout: `2026-01-21 14:30:45 WARNING  message`.
pub fn parse_line_level(line: &str) -> Option<Level> {
    let timestamp = line.get(..TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").ok()?;
    line[TIMESTAMP_LEN..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Up to `count` most recent lines at or above `min_level`, oldest first
///
/// Lines without a level (wrapped messages, tracebacks) belong to the record
/// above them and are kept or dropped with it. Lines before the first record
/// are treated as INFO.
pub fn tail(path: &Path, count: usize, min_level: Level) -> io::Result<Vec<String>> {
    let mut collected = Vec::new();
    let mut continuation = Vec::new();

    for line in reverse_lines(path)? {
        if collected.len() >= count {
            break;
        }
        let line = line?.trim_end_matches('\n').to_string();
        match parse_line_level(&line) {
            Some(level) => {
                if level >= min_level {
                    collected.append(&mut continuation);
                    collected.push(line);
                } else {
                    continuation.clear();
                }
            }
            None => continuation.push(line),
        }
    }

    if Level::Message >= min_level {
        collected.append(&mut continuation);
    }

    collected.truncate(count);
    collected.reverse();
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LOG: &str = "\
2026-01-21 14:30:45 INFO     app started
2026-01-21 14:30:46 DEBUG    loading plugins
2026-01-21 14:30:47 ERROR    plugin failed
  caused by: missing symbol
2026-01-21 14:30:48 WARNING  REQWEST :: retrying
2026-01-21 14:30:49 DB       select 1
";

    fn write_log(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("app.log");
        std::fs::write(&path, LOG).unwrap();
        path
    }

    #[test]
    fn test_parse_line_level() {
        assert_eq!(
            parse_line_level("2026-01-21 14:30:45 WARNING  slow"),
            Some(Level::Warning)
        );
        assert_eq!(parse_line_level("2026-01-21 14:30:45 INFO     x"), Some(Level::Message));
        assert_eq!(parse_line_level("  caused by: missing symbol"), None);
        assert_eq!(parse_line_level("2026-01-21 14:30:45 LOUD x"), None);
        assert_eq!(parse_line_level(""), None);
    }

    #[test]
    fn test_tail_all_levels() {
        let temp_dir = TempDir::new().unwrap();
        let lines = tail(&write_log(&temp_dir), 100, Level::Db).unwrap();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "2026-01-21 14:30:45 INFO     app started");
        assert_eq!(lines[5], "2026-01-21 14:30:49 DB       select 1");
    }

    #[test]
    fn test_tail_filters_and_keeps_continuations() {
        let temp_dir = TempDir::new().unwrap();
        let lines = tail(&write_log(&temp_dir), 100, Level::Warning).unwrap();
        assert_eq!(
            lines,
            vec![
                "2026-01-21 14:30:47 ERROR    plugin failed",
                "  caused by: missing symbol",
                "2026-01-21 14:30:48 WARNING  REQWEST :: retrying",
            ]
        );
    }

    #[test]
    fn test_tail_limits_count() {
        let temp_dir = TempDir::new().unwrap();
        let lines = tail(&write_log(&temp_dir), 2, Level::Db).unwrap();
        assert_eq!(
            lines,
            vec![
                "2026-01-21 14:30:48 WARNING  REQWEST :: retrying",
                "2026-01-21 14:30:49 DB       select 1",
            ]
        );
    }

    #[test]
    fn test_tail_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.log");
        std::fs::write(&path, "").unwrap();
        assert!(tail(&path, 10, Level::Db).unwrap().is_empty());
    }
}
