//! Reverse line iteration over a file
//!
//! [`ReverseLines`] yields the lines of a file last to first. Memory use is
//! bounded by the buffer size plus the longest line.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Chunk size used by [`reverse_lines`]
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Iterate over the lines of `path`, last line first
pub fn reverse_lines(path: &Path) -> io::Result<ReverseLines> {
    reverse_lines_with_buffer(path, DEFAULT_BUFFER_SIZE)
}

/// Like [`reverse_lines`] with an explicit chunk size (at least 1)
pub fn reverse_lines_with_buffer(path: &Path, buffer_size: usize) -> io::Result<ReverseLines> {
    let file = File::open(path)?;
    let position = file.metadata()?.len();
    Ok(ReverseLines {
        file,
        position,
        buffer_size: buffer_size.max(1),
        carry: Vec::new(),
        ready: VecDeque::new(),
        done: false,
    })
}

/// Lazy iterator over a file's lines in reverse order
///
/// Every line is yielded with a single trailing `\n`, including a final line
/// that had none in the file. `\r\n` endings are normalized to `\n`.
pub struct ReverseLines {
    file: File,
    /// Offset of the first byte not yet read
    position: u64,
    buffer_size: usize,
    /// Start of a line whose beginning lies before `position`, stored
    /// back to front so earlier bytes are appended
    carry: Vec<u8>,
    ready: VecDeque<String>,
    done: bool,
}

impl ReverseLines {
    /// Read the chunk before `position` and queue every line it completes
    fn read_chunk(&mut self) -> io::Result<()> {
        let len = (self.buffer_size as u64).min(self.position);
        let start = self.position - len;

        let mut chunk = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut chunk)?;
        self.position = start;

        // only the fresh bytes are scanned, the carried fragment never is
        let breaks: Vec<usize> = chunk
            .iter()
            .enumerate()
            .filter(|(_, byte)| **byte == b'\n')
            .map(|(i, _)| i)
            .collect();

        let Some(&last) = breaks.last() else {
            self.carry.extend(chunk.iter().rev());
            if self.position == 0 {
                let line: Vec<u8> = self.carry.drain(..).rev().collect();
                self.ready.push_back(normalize(&line));
            }
            return Ok(());
        };

        // the newest line is the chunk's tail joined to the carried fragment
        let mut newest = chunk[last + 1..].to_vec();
        newest.extend(self.carry.drain(..).rev());
        if !newest.is_empty() {
            self.ready.push_back(normalize(&newest));
        }

        for pair in breaks.windows(2).rev() {
            self.ready.push_back(normalize(&chunk[pair[0] + 1..=pair[1]]));
        }

        // the first piece may continue further back unless we hit the start
        let first = &chunk[..=breaks[0]];
        if self.position == 0 {
            self.ready.push_back(normalize(first));
        } else {
            self.carry.extend(first.iter().rev());
        }
        Ok(())
    }
}

fn normalize(piece: &[u8]) -> String {
    let mut line = piece;
    if let Some(stripped) = line.strip_suffix(b"\n") {
        line = stripped;
    }
    if let Some(stripped) = line.strip_suffix(b"\r") {
        line = stripped;
    }
    let mut text = String::from_utf8_lossy(line).into_owned();
    text.push('\n');
    text
}

impl Iterator for ReverseLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.done || self.position == 0 {
                self.done = true;
                return None;
            }
            if let Err(e) = self.read_chunk() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
