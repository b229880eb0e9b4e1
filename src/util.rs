//! Shared helpers: path resolution, recursive copy, duration strings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Resolve `value` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(value)
    }
}

/// Copy a file or directory tree, creating parent directories as needed.
/// Permissions are preserved for regular files.
pub fn copy_path(source: &Path, destination: &Path) -> Result<()> {
    let meta = std::fs::metadata(source)?;
    if meta.is_dir() {
        copy_dir(source, destination)
    } else {
        copy_file(source, destination)
    }
}

fn copy_dir(source: &Path, destination: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(source) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .expect("walk stays under source");
        let target = destination.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, destination)?;
    Ok(())
}

/// Parse a duration string like `10s`, `500ms`, `2m`. Bare numbers are
/// seconds. Returns `None` when the string does not parse.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (number, scale_ms) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1000.0)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60_000.0)
    } else if let Some(n) = value.strip_suffix('h') {
        (n, 3_600_000.0)
    } else {
        (value, 1000.0)
    };
    let n: f64 = number.trim().parse().ok()?;
    if n < 0.0 {
        return None;
    }
    Some(Duration::from_millis((n * scale_ms) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/base");
        assert_eq!(resolve_path(base, "rel/file"), PathBuf::from("/base/rel/file"));
        assert_eq!(resolve_path(base, "/abs/file"), PathBuf::from("/abs/file"));
    }

    #[test]
    fn test_copy_path_file_and_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("a.txt"), "a").unwrap();
        std::fs::write(src.join("nested/b.txt"), "b").unwrap();

        let dst = tmp.path().join("dst");
        copy_path(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(
            std::fs::read_to_string(dst.join("nested/b.txt")).unwrap(),
            "b"
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("junk"), None);
        assert_eq!(parse_duration(""), None);
    }
}
