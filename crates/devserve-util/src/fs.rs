use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Last modification time of a file, in milliseconds since the Unix epoch.
///
/// Filesystems that report a time before the epoch yield `0`.
///
/// # Errors
/// Returns an error if the file metadata cannot be read.
#[allow(clippy::cast_possible_truncation)]
pub fn modified_millis(path: &Path) -> io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_valid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        // Valid start, then invalid continuation bytes
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_to_string_lossy_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_to_string_lossy(&dir.path().join("nope.js")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_modified_millis() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, "x").unwrap();

        let mtime = modified_millis(&path).unwrap();
        assert!(mtime > 0);
        assert!(mtime <= now_ms() + 1_000);
    }
}
