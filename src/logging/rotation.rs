//! Time-based rotation of the live log file
//!
//! The router checks [`RotationState::is_due`] on every write that reaches
//! the file destination. When due, the live file is renamed to an archive
//! named for the start of the period that just ended, compressed into a zip,
//! and the oldest archive is pruned.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::retention::{self, FileRemover};

/// Timestamp pattern embedded in archive names
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// When the live file is rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum RotationSchedule {
    /// Every day at local midnight
    #[default]
    Midnight,
    /// Every `seconds` seconds
    Interval { seconds: u64 },
}

/// Error for a schedule whose deadlines cannot be represented
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rotation interval of {0} seconds is out of range")]
pub struct IntervalOutOfRange(pub u64);

impl RotationSchedule {
    /// Length of one rotation period
    pub fn interval(&self) -> Result<Duration, IntervalOutOfRange> {
        match self {
            RotationSchedule::Midnight => Ok(Duration::days(1)),
            RotationSchedule::Interval { seconds } => i64::try_from((*seconds).max(1))
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or(IntervalOutOfRange(*seconds)),
        }
    }

    /// First deadline for a period that started at `from`
    pub fn first_deadline(
        &self,
        from: DateTime<Local>,
    ) -> Result<DateTime<Local>, IntervalOutOfRange> {
        match self {
            RotationSchedule::Midnight => Ok(next_midnight(from)),
            RotationSchedule::Interval { seconds } => from
                .checked_add_signed(self.interval()?)
                .ok_or(IntervalOutOfRange(*seconds)),
        }
    }

    fn out_of_range(&self) -> IntervalOutOfRange {
        match self {
            RotationSchedule::Midnight => IntervalOutOfRange(86_400),
            RotationSchedule::Interval { seconds } => IntervalOutOfRange(*seconds),
        }
    }
}

fn next_midnight(t: DateTime<Local>) -> DateTime<Local> {
    t.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or_else(|| t + Duration::days(1))
}

/// Rotation bookkeeping for one live log file
#[derive(Debug, Clone)]
pub struct RotationState {
    base_path: PathBuf,
    schedule: RotationSchedule,
    deadline: DateTime<Local>,
    interval: Duration,
    pub retention: usize,
    pub legacy_names: Vec<String>,
}

impl RotationState {
    /// Schedule rotation for `base_path`
    ///
    /// If the live file already exists, the first period is taken to have
    /// started at its last modification, so a file left over from an earlier
    /// period is rotated on the first write.
    pub fn new(
        base_path: &Path,
        schedule: RotationSchedule,
        retention: usize,
        legacy_names: Vec<String>,
        now: DateTime<Local>,
    ) -> Result<Self, IntervalOutOfRange> {
        let from = fs::metadata(base_path)
            .and_then(|m| m.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or(now);
        Self::starting_at(base_path, schedule, retention, legacy_names, from)
    }

    /// Schedule rotation with the first period starting at `from`
    pub fn starting_at(
        base_path: &Path,
        schedule: RotationSchedule,
        retention: usize,
        legacy_names: Vec<String>,
        from: DateTime<Local>,
    ) -> Result<Self, IntervalOutOfRange> {
        Ok(Self {
            base_path: base_path.to_path_buf(),
            schedule,
            deadline: schedule.first_deadline(from)?,
            interval: schedule.interval()?,
            retention,
            legacy_names,
        })
    }

    /// Path of the live log file
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn schedule(&self) -> RotationSchedule {
        self.schedule
    }

    /// Next rotation deadline
    pub fn deadline(&self) -> DateTime<Local> {
        self.deadline
    }

    /// Whether a write at `now` must rotate first
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        now >= self.deadline
    }

    /// Start of the period that ends at the current deadline
    pub fn period_start(&self) -> DateTime<Local> {
        self.deadline
            .checked_sub_signed(self.interval)
            .unwrap_or(self.deadline)
    }

    /// Live file name without its extension, e.g. `app` for `app.log`
    pub fn base_name(&self) -> String {
        self.base_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the live file and its archives
    pub fn dir(&self) -> &Path {
        self.base_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Uncompressed archive path for the current period
    pub fn archive_log_path(&self) -> PathBuf {
        let stamp = self.period_start().format(ARCHIVE_TIMESTAMP_FORMAT);
        self.dir().join(format!("{}_{}.log", self.base_name(), stamp))
    }

    /// Move the deadline forward by exactly one interval
    ///
    /// The deadline is not reset relative to the current time, so a late
    /// rotation does not shift later ones. The deadline is left unchanged
    /// when the next one cannot be represented.
    pub fn advance(&mut self) -> Result<(), IntervalOutOfRange> {
        self.deadline = self
            .deadline
            .checked_add_signed(self.interval)
            .ok_or_else(|| self.schedule.out_of_range())?;
        Ok(())
    }

    /// Compress a renamed archive and prune old ones
    ///
    /// Failures are logged and otherwise ignored.
    pub fn finish_archive(&self, archive_log: &Path, remover: &dyn FileRemover) {
        let zip_path = archive_log.with_extension("zip");
        if let Err(e) = remover.remove_or_trash(&zip_path) {
            tracing::debug!("Failed to remove stale archive {}: {}", zip_path.display(), e);
        }

        match compress_archive(archive_log, &zip_path) {
            Ok(()) => {
                if let Err(e) = remover.remove_or_trash(archive_log) {
                    tracing::debug!("Failed to remove {}: {}", archive_log.display(), e);
                }
            }
            Err(e) => {
                tracing::debug!("Failed to compress {}: {}", archive_log.display(), e);
            }
        }

        match retention::prune_oldest(
            self.dir(),
            &self.base_name(),
            &self.legacy_names,
            self.retention,
            remover,
        ) {
            Ok(Some(removed)) => tracing::debug!("Pruned old archive {}", removed.display()),
            Ok(None) => {}
            Err(e) => tracing::debug!("Failed to prune archives: {}", e),
        }
    }
}

/// Write `source` into a new deflate-compressed zip at `zip_path`
///
/// The entry is stored under the source's file name.
pub fn compress_archive(source: &Path, zip_path: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let entry_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry_name, options).map_err(zip_error)?;
    io::copy(&mut input, &mut zip)?;
    zip.finish().map_err(zip_error)?;
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::retention::DefaultRemover;
    use std::io::Read;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_midnight_first_deadline() {
        let from = at(2026, 1, 1, 10, 30, 0);
        assert_eq!(
            RotationSchedule::Midnight.first_deadline(from),
            Ok(at(2026, 1, 2, 0, 0, 0))
        );
    }

    #[test]
    fn test_interval_first_deadline() {
        let from = at(2026, 1, 1, 10, 30, 0);
        let schedule = RotationSchedule::Interval { seconds: 120 };
        assert_eq!(schedule.first_deadline(from), Ok(at(2026, 1, 1, 10, 32, 0)));
    }

    #[test]
    fn test_huge_interval_is_rejected() {
        let from = at(2026, 1, 1, 10, 30, 0);
        let schedule = RotationSchedule::Interval {
            seconds: 9_000_000_000_000_000,
        };
        assert_eq!(
            schedule.first_deadline(from),
            Err(IntervalOutOfRange(9_000_000_000_000_000))
        );
        assert!(RotationSchedule::Interval { seconds: u64::MAX }.interval().is_err());
        assert!(RotationState::starting_at(
            Path::new("/tmp/logs/app.log"),
            schedule,
            16,
            Vec::new(),
            from,
        )
        .is_err());
    }

    #[test]
    fn test_advance_past_representable_range_keeps_deadline() {
        let seconds = 200_000 * 365 * 86_400;
        let mut state = RotationState::starting_at(
            Path::new("/tmp/logs/app.log"),
            RotationSchedule::Interval { seconds },
            16,
            Vec::new(),
            at(2026, 1, 1, 0, 0, 0),
        )
        .unwrap();
        let deadline = state.deadline();
        assert!(state.advance().is_err());
        assert_eq!(state.deadline(), deadline);
    }

    #[test]
    fn test_late_rotation_advances_one_interval() {
        let state_path = Path::new("/tmp/logs/app.log");
        let mut state = RotationState::starting_at(
            state_path,
            RotationSchedule::Interval { seconds: 86_400 },
            16,
            Vec::new(),
            at(2026, 1, 1, 0, 0, 0),
        )
        .unwrap();
        let old_deadline = state.deadline();
        let three_days_late = old_deadline + Duration::days(3);
        assert!(state.is_due(three_days_late));

        state.advance().unwrap();
        assert_eq!(state.deadline(), old_deadline + Duration::days(1));
        assert_ne!(state.deadline(), three_days_late + Duration::days(1));
    }

    #[test]
    fn test_archive_named_for_period_start() {
        let state = RotationState::starting_at(
            Path::new("/var/log/app/app.log"),
            RotationSchedule::Midnight,
            16,
            Vec::new(),
            at(2026, 5, 6, 15, 0, 0),
        )
        .unwrap();
        assert_eq!(
            state.archive_log_path(),
            PathBuf::from("/var/log/app/app_2026-05-06_00-00-00.log")
        );
    }

    #[test]
    fn test_existing_file_uses_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        std::fs::write(&path, "old\n").unwrap();

        let far_future = Local::now() + Duration::days(30);
        let state = RotationState::new(
            &path,
            RotationSchedule::Interval { seconds: 60 },
            16,
            Vec::new(),
            far_future,
        )
        .unwrap();
        // period started at the file's mtime, not at `far_future`
        assert!(state.deadline() < far_future);
    }

    #[test]
    fn test_compress_archive_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("app_2026-01-01_00-00-00.log");
        std::fs::write(&source, "line one\nline two\n").unwrap();
        let zip_path = source.with_extension("zip");

        compress_archive(&source, &zip_path).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "app_2026-01-01_00-00-00.log");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "line one\nline two\n");
    }

    #[test]
    fn test_compress_missing_source_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("missing.log");
        let zip_path = source.with_extension("zip");
        assert!(compress_archive(&source, &zip_path).is_err());
        assert!(!zip_path.exists());
    }

    #[test]
    fn test_finish_archive_replaces_log_with_zip() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("app.log");
        let state = RotationState::starting_at(
            &base,
            RotationSchedule::Midnight,
            16,
            Vec::new(),
            at(2026, 1, 1, 12, 0, 0),
        )
        .unwrap();
        let archive_log = state.archive_log_path();
        std::fs::write(&archive_log, "rotated\n").unwrap();

        state.finish_archive(&archive_log, &DefaultRemover::new(false));

        assert!(!archive_log.exists());
        assert!(temp_dir.path().join("app_2026-01-01_00-00-00.zip").exists());
    }
}
