//! Logging system for logrouter
//!
//! Routes leveled records from named sources to a console and a rotating
//! log file, compresses and prunes rotated archives, and bridges `tracing`
//! events from dependencies into the same files.

mod clock;
mod destination;
mod errors;
mod format;
mod layer;
mod level;
mod record;
mod retention;
mod rotation;
mod router;

pub use clock::{Clock, SystemClock};
pub use destination::{Destination, DestinationId, FileSink, OpenMode, Target};
pub use errors::{ErrorSink, ErrorViewer, UiError};
pub use format::{source_tag, FormatterRegistry, LineFormat};
pub use layer::{match_source, target_to_source, RouterLayer};
pub use level::{Level, ParseLevelError, ALL_LEVELS};
pub use record::{current_worker, LogRecord};
pub use retention::{list_archives, prune_oldest, DefaultRemover, FileRemover, DEFAULT_RETENTION};
pub use rotation::{
    compress_archive, IntervalOutOfRange, RotationSchedule, RotationState, ARCHIVE_TIMESTAMP_FORMAT,
};
pub use router::{encode_exit_payload, LogRouter};
