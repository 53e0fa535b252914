//! Safe resume: detect a remote resource that changed since progress was recorded.
//!
//! On resume the session prefetches the URL and compares the result with the
//! validators stored on the entry. Ranges written against a different file are
//! useless, so a changed remote restarts the download from scratch.

use std::fmt;

use crate::engine::UrlInfo;
use crate::entry::DownloadEntry;

/// The remote ETag, Last-Modified, or size no longer match the stored values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChanged {
    pub etag_changed: bool,
    pub last_modified_changed: bool,
    pub size_changed: bool,
}

impl fmt::Display for RemoteChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut what = Vec::with_capacity(3);
        if self.etag_changed {
            what.push("ETag");
        }
        if self.last_modified_changed {
            what.push("Last-Modified");
        }
        if self.size_changed {
            what.push("size");
        }
        write!(f, "remote resource changed ({})", what.join(", "))
    }
}

impl std::error::Error for RemoteChanged {}

fn differs(stored: &Option<String>, fresh: &Option<String>) -> bool {
    match (stored, fresh) {
        (None, None) => false,
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

/// Returns Ok(()) if the entry's progress still applies to the remote resource.
///
/// An entry that never recorded validators (no size, ETag, or Last-Modified)
/// is always accepted.
pub fn validate_for_resume(entry: &DownloadEntry, info: &UrlInfo) -> Result<(), RemoteChanged> {
    let has_stored =
        entry.file_size > 0 || entry.etag.is_some() || entry.last_modified.is_some();
    if !has_stored {
        return Ok(());
    }

    let etag_changed = differs(&entry.etag, &info.etag);
    let last_modified_changed = differs(&entry.last_modified, &info.last_modified);
    let size_changed = entry.file_size != info.size;

    if etag_changed || last_modified_changed || size_changed {
        return Err(RemoteChanged {
            etag_changed,
            last_modified_changed,
            size_changed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryId;
    use std::path::PathBuf;

    const LM: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

    fn entry(size: u64, etag: Option<&str>, lm: Option<&str>) -> DownloadEntry {
        let mut e = DownloadEntry::new(
            EntryId(1),
            "https://example.com/file.bin",
            PathBuf::from("/tmp/file.bin"),
        );
        e.file_size = size;
        e.etag = etag.map(String::from);
        e.last_modified = lm.map(String::from);
        e
    }

    fn info(size: u64, etag: Option<&str>, lm: Option<&str>) -> UrlInfo {
        UrlInfo {
            size,
            name: "file.bin".into(),
            supports_range: true,
            fast_download: true,
            final_url: "https://cdn.example.com/file.bin".into(),
            etag: etag.map(String::from),
            last_modified: lm.map(String::from),
        }
    }

    #[test]
    fn no_stored_validators_ok() {
        let e = entry(0, None, None);
        assert!(validate_for_resume(&e, &info(1000, Some("e1"), Some(LM))).is_ok());
    }

    #[test]
    fn unchanged_ok() {
        let e = entry(1000, Some("e1"), Some(LM));
        assert!(validate_for_resume(&e, &info(1000, Some("e1"), Some(LM))).is_ok());
    }

    #[test]
    fn etag_changed() {
        let e = entry(1000, Some("e1"), Some(LM));
        let err = validate_for_resume(&e, &info(1000, Some("e2"), Some(LM))).unwrap_err();
        assert!(err.etag_changed);
        assert!(!err.size_changed);
        assert_eq!(err.to_string(), "remote resource changed (ETag)");
    }

    #[test]
    fn size_and_last_modified_changed() {
        let e = entry(1000, None, Some(LM));
        let err = validate_for_resume(&e, &info(2000, None, None)).unwrap_err();
        assert!(err.size_changed);
        assert!(err.last_modified_changed);
        assert_eq!(err.to_string(), "remote resource changed (Last-Modified, size)");
    }
}
