// src/storage/offset_file.rs
//
// Durable storage for the active offset source: one text file, replaced
// atomically so a crash can never leave a torn file as the current source.
use std::fs;
use std::io;
use std::path::Path;

/// Reads the persisted source, or None when the file does not exist yet.
pub fn read_source(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Writes `source` through a sibling temp file and renames it into place.
/// The rename is the commit point; a failure before it leaves the prior
/// file contents intact.
pub fn write_source_atomic(path: &Path, source: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, source)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.rhai");
        assert!(read_source(&path).unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("offset.rhai");
        write_source_atomic(&path, "fn offset(a, b) { #{} }\n").unwrap();
        assert_eq!(
            read_source(&path).unwrap().unwrap(),
            "fn offset(a, b) { #{} }\n"
        );
    }

    #[test]
    fn rewrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.rhai");
        write_source_atomic(&path, "first, much longer content here\n").unwrap();
        write_source_atomic(&path, "second\n").unwrap();
        assert_eq!(read_source(&path).unwrap().unwrap(), "second\n");
        assert!(!path.with_extension("tmp").exists());
    }
}
