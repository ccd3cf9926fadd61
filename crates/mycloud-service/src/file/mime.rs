//! MIME type inference from file names.

/// MIME types treated as zip archives.
const ARCHIVE_MIME_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip",
    "application/x-zip-compressed",
];

/// Guess a MIME type from the extension of `name`.
pub fn guess_mime(name: &str) -> Option<String> {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Whether a file looks like a zip archive by content type or extension.
pub fn is_archive(mime_type: Option<&str>, name: &str) -> bool {
    let by_mime = mime_type.is_some_and(|m| ARCHIVE_MIME_TYPES.contains(&m));
    by_mime || archive_stem(name).is_some()
}

/// `name` with a trailing `.zip` (any case) removed, if it has one.
pub fn archive_stem(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(4)?;
    let (stem, ext) = (name.get(..split)?, name.get(split..)?);
    (ext.eq_ignore_ascii_case(".zip") && !stem.is_empty()).then_some(stem)
}
