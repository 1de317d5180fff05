//! The log router
//!
//! [`LogRouter`] owns every destination and the rotation state behind one
//! lock. A log call formats the record for each destination its source is
//! attached to and writes it while holding the lock. When a write reaches the
//! file destination after the rotation deadline, the rotation runs inline
//! before the write, so no other thread can log between the rename of the
//! live file and the opening of its replacement.

use std::cell::Cell;
use std::fs;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};

use crate::config::{friendly_io_error_message, LogConfig};

use super::clock::{Clock, SystemClock};
use super::destination::{Destination, DestinationId, FileSink, OpenMode, Target};
use super::errors::ErrorSink;
use super::format::{FormatterRegistry, LineFormat};
use super::level::{Level, ParseLevelError};
use super::record::{current_worker, LogRecord};
use super::retention::{DefaultRemover, FileRemover};
use super::rotation::RotationState;

/// A source attached to one destination, with the format resolved for it
#[derive(Debug, Clone)]
struct Attachment {
    destination: DestinationId,
    format: Arc<LineFormat>,
}

/// A named logical source
#[derive(Debug, Clone)]
struct Source {
    name: String,
    /// Records below this level are dropped before reaching any destination
    level: Level,
    attachments: Vec<Attachment>,
}

/// Everything guarded by the router lock
struct RouterState {
    config: LogConfig,
    console_enabled: bool,
    /// Process-owned console stream, flushed but never closed
    console_out: Box<dyn Write + Send>,
    console: Option<Destination>,
    file: Option<Destination>,
    sources: Vec<Source>,
    rotation: Option<RotationState>,
}

thread_local! {
    /// Set while the current thread holds a router lock
    static HOLDING_LOCK: Cell<bool> = const { Cell::new(false) };
}

/// Router state borrowed under the lock
///
/// Marks the current thread for as long as it is held, so code running
/// inside the router (removers, rotation) can be told apart from callers.
struct Locked<'a> {
    guard: MutexGuard<'a, RouterState>,
    was_holding: bool,
}

impl Deref for Locked<'_> {
    type Target = RouterState;

    fn deref(&self) -> &RouterState {
        &self.guard
    }
}

impl DerefMut for Locked<'_> {
    fn deref_mut(&mut self) -> &mut RouterState {
        &mut self.guard
    }
}

impl Drop for Locked<'_> {
    fn drop(&mut self) {
        HOLDING_LOCK.with(|holding| holding.set(self.was_holding));
    }
}

/// Thread-safe dispatcher for leveled log records
///
/// Construct one per process, share it as an `Arc<LogRouter>`, call
/// [`initialize`](Self::initialize) once configuration is known and
/// [`close`](Self::close) at shutdown.
pub struct LogRouter {
    state: Mutex<RouterState>,
    clock: Arc<dyn Clock>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    remover: Option<Arc<dyn FileRemover>>,
}

impl LogRouter {
    /// Create an uninitialized router; nothing is written until
    /// [`initialize`](Self::initialize) is called
    pub fn new(config: LogConfig) -> Self {
        Self {
            state: Mutex::new(RouterState {
                config,
                console_enabled: false,
                console_out: Box::new(io::stderr()),
                console: None,
                file: None,
                sources: Vec::new(),
                rotation: None,
            }),
            clock: Arc::new(SystemClock),
            error_sink: None,
            remover: None,
        }
    }

    /// Forward ERROR-level messages from [`log`](Self::log) to `sink`
    ///
    /// The sink is called after the router lock is released.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Use `clock` for timestamps and rotation deadlines
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delete rotated files through `remover` instead of the configured policy
    pub fn with_remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    /// Write console output to `writer` instead of stderr
    pub fn with_console_writer(self, writer: Box<dyn Write + Send>) -> Self {
        self.lock().console_out = writer;
        self
    }

    fn lock(&self) -> Locked<'_> {
        // a panic while logging must not disable logging for everyone else
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let was_holding = HOLDING_LOCK.with(|holding| holding.replace(true));
        Locked { guard, was_holding }
    }

    /// Whether the calling thread is currently inside a router
    ///
    /// Anything that feeds records back into a router (such as
    /// [`RouterLayer`](super::RouterLayer)) must drop them when this is true;
    /// the router lock is not reentrant.
    pub fn holds_lock_on_current_thread() -> bool {
        HOLDING_LOCK.with(Cell::get)
    }

    /// Run `f` under the lock with the active remover and the current time
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut RouterState, &dyn FileRemover, DateTime<Local>) -> R,
    ) -> R {
        let now = self.clock.now();
        let mut state = self.lock();
        let default_remover = DefaultRemover::new(state.config.trash_rotated_logs);
        let remover: &dyn FileRemover = match &self.remover {
            Some(remover) => remover.as_ref(),
            None => &default_remover,
        };
        f(&mut *state, remover, now)
    }

    /// Build destinations and attach them to every declared source
    ///
    /// The console flag accumulates: once enabled it stays enabled. Calling
    /// this again (for example after a configuration change) installs fresh
    /// destinations first and closes the previous ones afterwards, so no line
    /// is lost during the switch. Sources are never attached twice.
    pub fn initialize(&self, console_enabled: bool) -> Result<()> {
        self.with_state(|state, _, now| state.install(console_enabled, OpenMode::Append, now))
    }

    /// Replace the configuration and re-initialize
    pub fn apply_config(&self, config: LogConfig) -> Result<()> {
        self.with_state(|state, _, now| {
            state.config = config;
            state.install(false, OpenMode::Append, now)
        })
    }

    /// Log `message` through the primary source
    ///
    /// The message is prefixed with the calling thread's name. ERROR-level
    /// messages are also passed to the error sink. Never fails.
    pub fn log(&self, message: &str, level: Level) {
        let line = format!("{} :: {}", current_worker(), message);

        let timestamp = self.with_state(|state, remover, now| {
            let record = LogRecord::new(now, level, state.config.primary_source.clone(), line.as_str());
            state.dispatch(&record, remover, now);
            now
        });

        if level == Level::Error {
            if let Some(sink) = &self.error_sink {
                sink.add_error(timestamp, &line);
            }
        }
    }

    /// Log with a numeric level; values that are not a known level are ignored
    pub fn log_value(&self, message: &str, value: u8) {
        if let Some(level) = Level::from_value(value) {
            self.log(message, level);
        }
    }

    /// Log through a named source without the thread prefix
    ///
    /// Undeclared sources are ignored.
    pub fn log_source(&self, source: &str, level: Level, message: &str) {
        self.with_state(|state, remover, now| {
            let record = LogRecord::new(now, level, source, message);
            state.dispatch(&record, remover, now);
        });
    }

    /// Log `message` at ERROR and terminate the process
    ///
    /// Without a console the (encoded) message is printed to stderr as the
    /// exit payload. The exit code is 1 in both cases.
    pub fn log_and_exit(&self, message: &str) -> ! {
        self.log(message, Level::Error);
        let payload = self.exit_payload(message);
        self.close();
        if let Some(payload) = payload {
            eprintln!("{}", payload);
        }
        std::process::exit(1)
    }

    /// Text printed on exit, or `None` when a console is attached
    pub fn exit_payload(&self, message: &str) -> Option<String> {
        let state = self.lock();
        if state.console_enabled {
            None
        } else {
            Some(encode_exit_payload(message, &state.config.encoding))
        }
    }

    /// Detach and close every destination
    pub fn close(&self) {
        self.close_destinations(&[DestinationId::Console, DestinationId::File]);
    }

    /// Detach and close the given destinations from every source
    ///
    /// The console is flushed but its stream stays open.
    pub fn close_destinations(&self, destinations: &[DestinationId]) {
        self.lock().close(destinations);
    }

    /// Change the file threshold to a preset name (ERROR, WARNING, INFO, DEBUG, DB)
    pub fn set_file_level(&self, preset: &str) -> Result<(), ParseLevelError> {
        let level: Level = preset.parse()?;
        let mut state = self.lock();
        state.config.file_logging_preset = level;
        if let Some(file) = state.file.as_mut() {
            file.threshold = level;
        }
        Ok(())
    }

    /// Path of the live log file for the current configuration
    pub fn current_log_file_path(&self) -> PathBuf {
        self.lock().config.log_file_path()
    }

    /// Whether a console destination has been requested
    pub fn console_enabled(&self) -> bool {
        self.lock().console_enabled
    }

    /// Next rotation deadline, once initialized
    pub fn rotation_deadline(&self) -> Option<DateTime<Local>> {
        self.lock().rotation.as_ref().map(RotationState::deadline)
    }

    /// Names of every declared and silenced source
    pub fn source_names(&self) -> Vec<String> {
        self.lock().sources.iter().map(|s| s.name.clone()).collect()
    }

    /// Rotate the live file now, regardless of the deadline
    pub fn force_rotation(&self) {
        self.with_state(|state, remover, now| state.rotate(remover, now));
    }
}

impl RouterState {
    fn install(&mut self, console: bool, mode: OpenMode, now: DateTime<Local>) -> Result<()> {
        self.console_enabled |= console;

        let dir = self.config.resolved_log_dir();
        let path = self.config.log_file_path();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        // decided before the file is opened, opening may create it
        let rotation = match &self.rotation {
            Some(current)
                if current.base_path() == path && current.schedule() == self.config.rotation =>
            {
                let mut kept = current.clone();
                kept.retention = self.config.retention;
                kept.legacy_names = self.config.legacy_base_names.clone();
                kept
            }
            _ => RotationState::new(
                &path,
                self.config.rotation,
                self.config.retention,
                self.config.legacy_base_names.clone(),
                now,
            )?,
        };

        let sink = FileSink::open(&path, mode).map_err(|e| {
            anyhow!(friendly_io_error_message(
                &e,
                &format!("Failed to open log file {}", path.display())
            ))
        })?;

        let console_threshold = if self.config.debug { Level::Debug } else { Level::Message };
        let console = self
            .console_enabled
            .then(|| Destination::console(console_threshold));
        let file = Destination::file(sink, self.config.file_logging_preset);

        let old_console = std::mem::replace(&mut self.console, console);
        let old_file = self.file.replace(file);
        self.sources = build_sources(&self.config, self.console_enabled);
        self.rotation = Some(rotation);

        // the new destinations are live, the old ones can go
        for mut old in old_file.into_iter().chain(old_console) {
            if let Err(e) = old.close(self.console_out.as_mut()) {
                tracing::debug!("Failed to close previous destination: {}", e);
            }
        }
        Ok(())
    }

    fn close(&mut self, destinations: &[DestinationId]) {
        for source in &mut self.sources {
            source
                .attachments
                .retain(|a| !destinations.contains(&a.destination));
        }

        for id in destinations {
            let slot = match id {
                DestinationId::Console => self.console.take(),
                DestinationId::File => self.file.take(),
                DestinationId::Discard => None,
            };
            if let Some(mut destination) = slot {
                if let Err(e) = destination.close(self.console_out.as_mut()) {
                    tracing::debug!("Failed to close {:?} destination: {}", id, e);
                }
            }
        }
    }

    fn dispatch(&mut self, record: &LogRecord, remover: &dyn FileRemover, now: DateTime<Local>) {
        let Some(source) = self.sources.iter().find(|s| s.name == record.source) else {
            return;
        };
        if record.level < source.level {
            return;
        }

        let lines: Vec<(DestinationId, String)> = source
            .attachments
            .iter()
            .filter(|a| a.destination != DestinationId::Discard)
            .map(|a| (a.destination, a.format.format(record)))
            .collect();

        for (destination, line) in lines {
            match destination {
                DestinationId::Console => {
                    if self.console.as_ref().is_some_and(|c| c.accepts(record.level)) {
                        let _ = writeln!(self.console_out, "{}", line);
                        let _ = self.console_out.flush();
                    }
                }
                DestinationId::File => {
                    if !self.file.as_ref().is_some_and(|f| f.accepts(record.level)) {
                        continue;
                    }
                    if self.rotation.as_ref().is_some_and(|r| r.is_due(now)) {
                        self.rotate(remover, now);
                    }
                    if let Some(Destination { target: Target::File(sink), .. }) = self.file.as_mut() {
                        if let Err(e) = sink.write_line(&line) {
                            tracing::debug!("Failed to write to {}: {}", sink.path().display(), e);
                        }
                    }
                }
                DestinationId::Discard => {}
            }
        }
    }

    /// Archive the live file and start a new one
    ///
    /// If the rename fails the live file is reopened truncated, losing what
    /// it held.
    fn rotate(&mut self, remover: &dyn FileRemover, now: DateTime<Local>) {
        let Some(rotation) = self.rotation.clone() else {
            return;
        };

        let archive_log = rotation.archive_log_path();
        if let Err(e) = remover.remove_or_trash(&archive_log) {
            tracing::debug!("Failed to remove stale {}: {}", archive_log.display(), e);
        }

        // drops every handle to the live file, including our own
        self.close(&[DestinationId::Console, DestinationId::File]);

        if let Err(e) = fs::rename(rotation.base_path(), &archive_log) {
            tracing::debug!(
                "Failed to rename {} to {}: {}",
                rotation.base_path().display(),
                archive_log.display(),
                e
            );
        }

        if let Err(e) = self.install(false, OpenMode::Truncate, now) {
            tracing::debug!("Failed to reopen log file after rotation: {:#}", e);
        }

        rotation.finish_archive(&archive_log, remover);

        if let Some(Err(e)) = self.rotation.as_mut().map(RotationState::advance) {
            // no later deadline exists, so stop rotating
            tracing::debug!("Rotation disabled: {}", e);
            self.rotation = None;
        }
    }
}

fn build_sources(config: &LogConfig, console_enabled: bool) -> Vec<Source> {
    let registry = FormatterRegistry::new(config.primary_source.clone(), &config.sources);
    let console_formats = registry.formatters_for(true);
    let file_formats = registry.formatters_for(false);
    let dependency_level = if config.debug { Level::Debug } else { Level::Warning };

    let resolve = |formats: &std::collections::HashMap<String, Arc<LineFormat>>, name: &str| {
        formats
            .get(name)
            .cloned()
            .unwrap_or_else(FormatterRegistry::default_format)
    };

    let mut sources: Vec<Source> = registry
        .sources()
        .iter()
        .map(|name| {
            let mut attachments = Vec::with_capacity(2);
            if console_enabled {
                attachments.push(Attachment {
                    destination: DestinationId::Console,
                    format: resolve(&console_formats, name.as_str()),
                });
            }
            attachments.push(Attachment {
                destination: DestinationId::File,
                format: resolve(&file_formats, name.as_str()),
            });
            Source {
                name: name.clone(),
                level: if *name == config.primary_source {
                    Level::Db
                } else {
                    dependency_level
                },
                attachments,
            }
        })
        .collect();

    for name in &config.silenced_sources {
        if sources.iter().any(|s| &s.name == name) {
            continue;
        }
        sources.push(Source {
            name: name.clone(),
            level: Level::Db,
            attachments: vec![Attachment {
                destination: DestinationId::Discard,
                format: FormatterRegistry::default_format(),
            }],
        });
    }

    sources
}

/// Encode an exit message for the process encoding
///
/// Characters the encoding cannot represent become XML character
/// references (`&#233;`). Unknown encodings are treated as UTF-8.
pub fn encode_exit_payload(message: &str, encoding: &str) -> String {
    let normalized: String = encoding
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    let max = match normalized.as_str() {
        "ascii" | "usascii" | "646" => 0x7f,
        "latin1" | "iso88591" | "l1" => 0xff,
        _ => return message.to_string(),
    };

    message
        .chars()
        .map(|c| {
            if (c as u32) <= max {
                c.to_string()
            } else {
                format!("&#{};", c as u32)
            }
        })
        .collect()
}
