//! logrouter - Thread-safe leveled logging with per-source formats and rotating archives
//!
//! This library provides the log router, its configuration, and readers for
//! the files it writes.

pub mod config;
pub mod logging;
pub mod viewer;
