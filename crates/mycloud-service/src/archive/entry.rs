//! Archive entry names and the pre-extraction scan.

use std::io::{Read, Seek};

use tracing::warn;
use zip::ZipArchive;

use mycloud_core::config::ArchiveConfig;
use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;

/// Why an entry name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeName {
    /// A `..` component.
    ParentTraversal,
    /// A Windows drive prefix such as `C:`.
    DrivePrefix,
    /// A NUL byte.
    Nul,
}

/// Split a raw entry name into safe path segments.
///
/// Both `/` and `\` separate segments; leading separators, `.` and empty
/// segments are dropped. Names that try to climb out of the destination
/// are refused. An `Ok` with no segments means the entry names nothing.
pub fn sanitize_entry_name(raw: &str) -> Result<Vec<String>, UnsafeName> {
    if raw.contains('\0') {
        return Err(UnsafeName::Nul);
    }
    let mut segments: Vec<String> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment.trim() {
            "" | "." => {}
            ".." => return Err(UnsafeName::ParentTraversal),
            s if segments.is_empty() && has_drive_prefix(s) => {
                return Err(UnsafeName::DrivePrefix);
            }
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}

fn has_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// One usable entry found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    /// Index inside the archive.
    pub index: usize,
    /// Sanitized path segments; the last one is the file name for files.
    pub segments: Vec<String>,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Uncompressed size from the entry header.
    pub declared_size: u64,
}

impl PlannedEntry {
    /// Directory segments leading to this entry (all segments for a directory).
    pub fn directories(&self) -> &[String] {
        if self.is_dir {
            &self.segments
        } else {
            &self.segments[..self.segments.len().saturating_sub(1)]
        }
    }

    /// File name of a file entry.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_dir {
            None
        } else {
            self.segments.last().map(String::as_str)
        }
    }
}

/// The result of scanning an archive's central directory.
#[derive(Debug, Clone, Default)]
pub struct ArchivePlan {
    /// Entries to materialize, in archive order.
    pub entries: Vec<PlannedEntry>,
    /// Sum of declared sizes of the file entries.
    pub declared_total: u64,
    /// Entries skipped because their names were unsafe.
    pub skipped: usize,
}

impl ArchivePlan {
    /// Number of file entries.
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_dir).count()
    }
}

/// Map a zip error onto the application taxonomy.
pub fn zip_error(e: zip::result::ZipError) -> AppError {
    match e {
        zip::result::ZipError::Io(io) => {
            AppError::with_source(ErrorKind::Storage, "Failed to read archive", io)
        }
        other => AppError::with_source(ErrorKind::NotAnArchive, "File is not a readable zip archive", other),
    }
}

/// Open `reader` as a zip archive and plan its extraction.
///
/// Enforces the entry-count and declared-size ceilings from `limits`.
pub fn scan<R: Read + Seek>(reader: R, limits: &ArchiveConfig) -> AppResult<ArchivePlan> {
    let mut archive = ZipArchive::new(reader).map_err(zip_error)?;
    if archive.len() > limits.max_entries {
        return Err(AppError::validation(format!(
            "Archive has {} entries; the limit is {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut plan = ArchivePlan::default();
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(zip_error)?;
        let raw_name = entry.name().to_string();
        let is_dir = entry.is_dir() || raw_name.ends_with('\\');

        let segments = match sanitize_entry_name(&raw_name) {
            Ok(segments) if !segments.is_empty() => segments,
            Ok(_) => continue,
            Err(reason) => {
                warn!(entry = %raw_name, reason = ?reason, "Skipping unsafe archive entry");
                plan.skipped += 1;
                continue;
            }
        };

        if !is_dir {
            plan.declared_total = plan.declared_total.saturating_add(entry.size());
        }
        plan.entries.push(PlannedEntry {
            index,
            segments,
            is_dir,
            declared_size: if is_dir { 0 } else { entry.size() },
        });
    }

    if plan.declared_total > limits.max_extracted_bytes {
        return Err(AppError::validation(format!(
            "Archive expands to {} bytes; the limit is {}",
            plan.declared_total, limits.max_extracted_bytes
        )));
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    /// Build a zip in memory. Names ending in `/` become directories; files
    /// are filled with `size` bytes.
    fn zip_of(entries: &[(&str, usize)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for &(name, size) in entries {
            if name.ends_with('/') {
                writer.add_directory(name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(name, SimpleFileOptions::default()).unwrap();
                writer.write_all(&vec![b'x'; size]).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_sanitize_plain_and_nested() {
        assert_eq!(sanitize_entry_name("a.txt").unwrap(), vec!["a.txt"]);
        assert_eq!(
            sanitize_entry_name("sub/deep/c.txt").unwrap(),
            vec!["sub", "deep", "c.txt"]
        );
        assert_eq!(sanitize_entry_name("sub/").unwrap(), vec!["sub"]);
    }

    #[test]
    fn test_sanitize_normalises_separators() {
        assert_eq!(sanitize_entry_name("/etc/passwd").unwrap(), vec!["etc", "passwd"]);
        assert_eq!(sanitize_entry_name("win\\dir\\f.txt").unwrap(), vec!["win", "dir", "f.txt"]);
        assert_eq!(sanitize_entry_name("./a//./b").unwrap(), vec!["a", "b"]);
        assert!(sanitize_entry_name("/").unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert_eq!(sanitize_entry_name("../../evil"), Err(UnsafeName::ParentTraversal));
        assert_eq!(sanitize_entry_name("a/../../b"), Err(UnsafeName::ParentTraversal));
        assert_eq!(sanitize_entry_name("a\\..\\b"), Err(UnsafeName::ParentTraversal));
        assert_eq!(sanitize_entry_name("C:\\Windows\\x"), Err(UnsafeName::DrivePrefix));
        assert_eq!(sanitize_entry_name("d:evil.txt"), Err(UnsafeName::DrivePrefix));
        assert_eq!(sanitize_entry_name(" .. /x"), Err(UnsafeName::ParentTraversal));
        assert_eq!(sanitize_entry_name("a\0b"), Err(UnsafeName::Nul));
    }

    #[test]
    fn test_scan_sums_declared_sizes_and_skips_unsafe() {
        let bytes = zip_of(&[
            ("a.txt", 10),
            ("sub/", 0),
            ("sub/b.txt", 20),
            ("sub/deep/c.txt", 30),
            ("../../evil", 5),
        ]);

        let plan = scan(Cursor::new(bytes), &ArchiveConfig::default()).unwrap();
        assert_eq!(plan.declared_total, 60);
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.file_count(), 3);
        assert_eq!(plan.entries.len(), 4);

        let deep = plan.entries.iter().find(|e| e.file_name() == Some("c.txt")).unwrap();
        assert_eq!(deep.directories(), ["sub".to_string(), "deep".to_string()]);
        let dir = plan.entries.iter().find(|e| e.is_dir).unwrap();
        assert_eq!(dir.directories(), ["sub".to_string()]);
    }

    #[test]
    fn test_scan_empty_archive() {
        let plan = scan(Cursor::new(zip_of(&[])), &ArchiveConfig::default()).unwrap();
        assert!(plan.entries.is_empty());
        assert_eq!(plan.declared_total, 0);
    }

    #[test]
    fn test_scan_enforces_limits() {
        let bytes = zip_of(&[("a", 1), ("b", 1), ("c", 3)]);

        let few = ArchiveConfig {
            max_entries: 2,
            ..ArchiveConfig::default()
        };
        let err = scan(Cursor::new(bytes.clone()), &few).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let small = ArchiveConfig {
            max_extracted_bytes: 4,
            ..ArchiveConfig::default()
        };
        let err = scan(Cursor::new(bytes), &small).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_scan_rejects_non_zip() {
        let err = scan(Cursor::new(b"definitely not a zip".to_vec()), &ArchiveConfig::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAnArchive);
    }
}
