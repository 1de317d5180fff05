//! Archive retention
//!
//! Finds rotated archives next to the live log and removes the oldest one
//! once more than the configured number exist.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default number of archives kept
pub const DEFAULT_RETENTION: usize = 16;

/// Removes files on behalf of rotation
pub trait FileRemover: Send + Sync {
    /// Remove `path`, or move it to the trash, depending on policy
    ///
    /// A missing file is not an error.
    fn remove_or_trash(&self, path: &Path) -> io::Result<()>;
}

/// Deletes permanently or moves to the desktop trash
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRemover {
    use_trash: bool,
}

impl DefaultRemover {
    /// Create a remover; `use_trash` selects the recoverable trash
    pub fn new(use_trash: bool) -> Self {
        Self { use_trash }
    }
}

impl FileRemover for DefaultRemover {
    fn remove_or_trash(&self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            return Ok(());
        }
        if self.use_trash {
            trash::delete(path).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
        } else {
            fs::remove_file(path)
        }
    }
}

/// List archives for `base_name` and any legacy names, oldest first
///
/// Archives are any files in `dir` named `<name>_*`. Their names embed the
/// rotation timestamp, so lexicographic order is chronological order.
pub fn list_archives(dir: &Path, base_name: &str, legacy_names: &[String]) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let prefixes: Vec<String> = std::iter::once(base_name)
        .chain(legacy_names.iter().map(String::as_str))
        .map(|name| format!("{}_", name))
        .collect();

    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            continue;
        }
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            archives.push(path);
        }
    }

    archives.sort();
    Ok(archives)
}

/// Delete the single oldest archive if there are more than `retention`
///
/// A retention of zero keeps everything. Returns the path that was removed.
pub fn prune_oldest(
    dir: &Path,
    base_name: &str,
    legacy_names: &[String],
    retention: usize,
    remover: &dyn FileRemover,
) -> io::Result<Option<PathBuf>> {
    if retention == 0 {
        return Ok(None);
    }

    let archives = list_archives(dir, base_name, legacy_names)?;
    if archives.len() <= retention {
        return Ok(None);
    }

    let oldest = archives[0].clone();
    remover.remove_or_trash(&oldest)?;
    Ok(Some(oldest))
}
