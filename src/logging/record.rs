//! A single log record

use chrono::{DateTime, Local};

use super::level::Level;

/// One log call, captured before formatting
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// When the call was made
    pub timestamp: DateTime<Local>,
    pub level: Level,
    /// Logical source the record was logged through
    pub source: String,
    /// Name of the thread that made the call
    pub worker: String,
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the given time and the current thread
    pub fn new(
        timestamp: DateTime<Local>,
        level: Level,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            source: source.into(),
            worker: current_worker(),
            message: message.into(),
        }
    }
}

/// Name of the calling thread, or its id when unnamed
pub fn current_worker() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_captures_named_thread() {
        let handle = std::thread::Builder::new()
            .name("SEARCHQUEUE-DAILY".to_string())
            .spawn(|| LogRecord::new(Local::now(), Level::Message, "app", "hello"))
            .unwrap();
        let record = handle.join().unwrap();
        assert_eq!(record.worker, "SEARCHQUEUE-DAILY");
        assert_eq!(record.source, "app");
        assert_eq!(record.message, "hello");
    }

    #[test]
    fn test_unnamed_thread_uses_id() {
        let worker = std::thread::spawn(current_worker).join().unwrap();
        assert!(worker.starts_with("ThreadId("));
    }
}
