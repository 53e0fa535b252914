//! Persist the session (JSON under XDG state dir) so tasks survive a restart.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::entry::DownloadEntry;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to rebuild a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: u32,
    pub max_concurrent_tasks: usize,
    pub next_id: u64,
    pub entries: Vec<DownloadEntry>,
}

/// Snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location: `~/.local/state/fdm/session.json`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("fdm")?;
        Ok(xdg_dirs.get_state_home().join("fdm").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot next to the target and renames it into place.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(snapshot).context("serialize session")?;
        let tmp = self.path.with_extension("json.part");
        std::fs::write(&tmp, json).with_context(|| format!("write session: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace session: {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), entries = snapshot.entries.len(), "session saved");
        Ok(())
    }

    /// Loads the snapshot. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<SessionSnapshot>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read session: {}", self.path.display()))
            }
        };
        let snapshot: SessionSnapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse session: {}", self.path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "unsupported session version {} in {}",
                snapshot.version,
                self.path.display()
            );
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{DownloadStatus, EntryId};
    use crate::interval::Interval;

    fn snapshot() -> SessionSnapshot {
        let mut e = DownloadEntry::new(
            EntryId(7),
            "https://example.com/a.iso",
            PathBuf::from("/data/a.iso"),
        );
        e.file_size = 4096;
        e.downloaded = 1024;
        e.write_progress = vec![vec![Interval::new(0, 1024)]];
        e.status = DownloadStatus::Paused;
        e.attempt = 3;
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            max_concurrent_tasks: 2,
            next_id: 8,
            entries: vec![e],
        }
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));
        store.save(&snapshot()).unwrap();
        assert!(!store.path().with_extension("json.part").exists());

        let back = store.load().unwrap().unwrap();
        assert_eq!(back.next_id, 8);
        assert_eq!(back.max_concurrent_tasks, 2);
        let e = &back.entries[0];
        assert_eq!(e.id, EntryId(7));
        assert_eq!(e.attempt, 3);
        assert_eq!(e.write_progress, vec![vec![Interval::new(0, 1024)]]);
    }

    #[test]
    fn unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let mut snap = snapshot();
        snap.version = 99;
        store.save(&snap).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("unsupported session version 99"));
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(SessionStore::new(path).load().is_err());
    }
}
