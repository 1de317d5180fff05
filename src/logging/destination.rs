//! Log destinations
//!
//! A destination is a live sink with a minimum level. The console writer is
//! owned by the process and is only ever flushed; the file sink owns its
//! handle and closes it when the destination is torn down.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::level::Level;

/// Identifies a destination slot in the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationId {
    Console,
    File,
    /// Accepts and drops everything, used to silence noisy sources
    Discard,
}

/// How the live log file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Keep existing contents
    Append,
    /// Start from an empty file
    Truncate,
}

/// Open handle to the live log file
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Open (creating if needed) the file at `path`
    pub fn open(path: &Path, mode: OpenMode) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            OpenMode::Append => options.append(true),
            OpenMode::Truncate => options.write(true).truncate(true),
        };
        let file = options.open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Path this sink writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Write one line and flush it to disk
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "log file is closed"));
        };
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Flush and release the handle; closing twice is a no-op
    pub fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// What a destination writes to
#[derive(Debug)]
pub enum Target {
    /// The router's shared console writer
    Console,
    File(FileSink),
}

/// A live destination with its minimum level
#[derive(Debug)]
pub struct Destination {
    pub threshold: Level,
    pub target: Target,
}

impl Destination {
    /// Console destination accepting `threshold` and above
    pub fn console(threshold: Level) -> Self {
        Self {
            threshold,
            target: Target::Console,
        }
    }

    /// File destination accepting `threshold` and above
    pub fn file(sink: FileSink, threshold: Level) -> Self {
        Self {
            threshold,
            target: Target::File(sink),
        }
    }

    /// Whether a record at `level` passes this destination's threshold
    pub fn accepts(&self, level: Level) -> bool {
        level >= self.threshold
    }

    /// Flush and close; the console is flushed through `console` and left open
    pub fn close(&mut self, console: &mut dyn Write) -> io::Result<()> {
        match &mut self.target {
            Target::Console => console.flush(),
            Target::File(sink) => sink.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_appends_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        std::fs::write(&path, "existing\n").unwrap();

        let mut sink = FileSink::open(&path, OpenMode::Append).unwrap();
        sink.write_line("one").unwrap();
        sink.write_line("two").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "existing\none\ntwo\n");
    }

    #[test]
    fn test_file_sink_truncate_discards_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        std::fs::write(&path, "old contents\n").unwrap();

        let mut sink = FileSink::open(&path, OpenMode::Truncate).unwrap();
        sink.write_line("fresh").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = FileSink::open(&temp_dir.path().join("a.log"), OpenMode::Append).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert!(sink.write_line("late").is_err());
    }

    #[test]
    fn test_threshold() {
        let dest = Destination::console(Level::Message);
        assert!(dest.accepts(Level::Error));
        assert!(dest.accepts(Level::Message));
        assert!(!dest.accepts(Level::Debug));
    }

    #[test]
    fn test_console_close_only_flushes() {
        let mut console: Vec<u8> = Vec::new();
        let mut dest = Destination::console(Level::Db);
        dest.close(&mut console).unwrap();
        // still usable afterwards
        console.write_all(b"after close").unwrap();
        assert_eq!(console, b"after close");
    }
}
