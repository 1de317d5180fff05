//! Reading log files back for display
//!
//! Log files can grow large, so they are read from the end in fixed-size
//! chunks rather than loaded whole.

mod reverse;
mod tail;

pub use reverse::{reverse_lines, reverse_lines_with_buffer, ReverseLines, DEFAULT_BUFFER_SIZE};
pub use tail::{parse_line_level, tail};
