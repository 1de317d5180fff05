//! UI error list
//!
//! ERROR-level messages are forwarded to an [`ErrorSink`] so a front end can
//! show them. [`ErrorViewer`] is a bounded in-memory implementation.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Local};

/// Receives error-level messages from the router
pub trait ErrorSink: Send + Sync {
    fn add_error(&self, timestamp: DateTime<Local>, message: &str);
}

/// An error shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

/// Thread-safe list of the most recent errors
pub struct ErrorViewer {
    errors: RwLock<VecDeque<UiError>>,
    /// Maximum errors to keep
    max_errors: usize,
}

impl ErrorViewer {
    /// Create a viewer keeping at most `max_errors` entries
    pub fn new(max_errors: usize) -> Self {
        Self {
            errors: RwLock::new(VecDeque::with_capacity(max_errors)),
            max_errors,
        }
    }

    /// All errors, oldest first
    pub fn errors(&self) -> Vec<UiError> {
        self.errors
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of errors held
    pub fn len(&self) -> usize {
        self.errors.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all errors (after they've been acknowledged)
    pub fn clear(&self) {
        if let Ok(mut errors) = self.errors.write() {
            errors.clear();
        }
    }
}

impl Default for ErrorViewer {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ErrorSink for ErrorViewer {
    fn add_error(&self, timestamp: DateTime<Local>, message: &str) {
        if self.max_errors == 0 {
            return;
        }
        if let Ok(mut errors) = self.errors.write() {
            if errors.len() >= self.max_errors {
                errors.pop_front();
            }
            errors.push_back(UiError {
                timestamp,
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let viewer = ErrorViewer::new(10);
        viewer.add_error(Local::now(), "first");
        viewer.add_error(Local::now(), "second");

        let errors = viewer.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "first");
        assert_eq!(errors[1].message, "second");
    }

    #[test]
    fn test_capacity() {
        let viewer = ErrorViewer::new(2);
        for i in 0..5 {
            viewer.add_error(Local::now(), &format!("error {}", i));
        }
        let errors = viewer.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "error 3");
        assert_eq!(errors[1].message, "error 4");
    }

    #[test]
    fn test_clear() {
        let viewer = ErrorViewer::default();
        viewer.add_error(Local::now(), "oops");
        assert!(!viewer.is_empty());
        viewer.clear();
        assert!(viewer.is_empty());
    }
}
