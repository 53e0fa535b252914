//! Download entries and the ordered collection the session keeps them in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::ConfigOverride;
use crate::interval::{merge_all, Interval};
use crate::stats::ProgressStats;

/// Stable, monotonically assigned entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling state of an entry.
///
/// Completed and failed tasks are `Paused`; a finished one has
/// `downloaded >= file_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Waiting for a concurrency slot or for its prefetch.
    Pending,
    Downloading,
    Paused,
}

/// One tracked file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadEntry {
    pub id: EntryId,
    /// URL as given by the user.
    pub url: String,
    /// URL after redirects, once known.
    pub final_url: Option<String>,
    /// Absolute save path; unique among entries.
    pub file_path: PathBuf,
    pub file_name: String,
    /// Total size in bytes (0 until a prefetch reports it).
    pub file_size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Bytes fetched, per worker.
    pub read_progress: Vec<Vec<Interval>>,
    /// Bytes durably written, per worker.
    pub write_progress: Vec<Vec<Interval>>,
    /// Cumulative byte count reported by the engine.
    pub downloaded: u64,
    /// Download time of finished runs.
    pub elapsed_ms: u64,
    pub status: DownloadStatus,
    /// Attempt token. Bumped by every action that starts, stops, or discards
    /// the entry; an async result tagged with an older value is ignored.
    pub attempt: u64,
    pub config: Option<ConfigOverride>,

    /// Attempt whose engine stream may still update this entry.
    #[serde(skip)]
    pub(crate) stream_attempt: Option<u64>,
    /// Attempt whose prefetch is in flight.
    #[serde(skip)]
    pub(crate) prefetching: Option<u64>,
    #[serde(skip)]
    pub(crate) running_since: Option<Instant>,
}

impl DownloadEntry {
    pub fn new(id: EntryId, url: &str, file_path: PathBuf) -> Self {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id,
            url: url.to_string(),
            final_url: None,
            file_path,
            file_name,
            file_size: 0,
            etag: None,
            last_modified: None,
            read_progress: Vec::new(),
            write_progress: Vec::new(),
            downloaded: 0,
            elapsed_ms: 0,
            status: DownloadStatus::Paused,
            attempt: 0,
            config: None,
            stream_attempt: None,
            prefetching: None,
            running_since: None,
        }
    }

    /// Paused with every byte accounted for.
    pub fn is_finished(&self) -> bool {
        self.status == DownloadStatus::Paused && self.downloaded >= self.file_size
    }

    /// Engine-side state may exist for this entry.
    pub fn is_live(&self) -> bool {
        self.status == DownloadStatus::Downloading || self.stream_attempt.is_some()
    }

    /// Write coverage across all workers as a single coverage set.
    pub fn write_coverage(&self) -> Vec<Interval> {
        merge_all(&self.write_progress)
    }

    /// Total download time, including the current run.
    pub fn elapsed(&self) -> Duration {
        let running = self.running_since.map(|t| t.elapsed()).unwrap_or_default();
        Duration::from_millis(self.elapsed_ms) + running
    }

    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            bytes_done: self.downloaded,
            total_bytes: self.file_size,
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }

    /// Marks the entry downloading with the stream of `attempt` bound to it.
    pub(crate) fn begin_run(&mut self, attempt: u64) {
        self.status = DownloadStatus::Downloading;
        self.stream_attempt = Some(attempt);
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Unbinds the engine stream and parks the entry. An entry already moved
    /// back to pending stays queued.
    pub(crate) fn end_run(&mut self) {
        if self.status != DownloadStatus::Pending {
            self.status = DownloadStatus::Paused;
        }
        self.stream_attempt = None;
        self.fold_elapsed();
    }

    /// Takes a downloading entry out of the running set and queues it again.
    /// The stream stays bound until it ends, so its last progress still lands.
    pub(crate) fn requeue(&mut self) {
        self.status = DownloadStatus::Pending;
        self.fold_elapsed();
    }

    fn fold_elapsed(&mut self) {
        if let Some(since) = self.running_since.take() {
            let ms = u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.elapsed_ms = self.elapsed_ms.saturating_add(ms);
        }
    }
}

/// Aggregate status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    pub running: usize,
    pub pending: usize,
    pub paused: usize,
}

/// Entries in list order; new entries go to the front.
#[derive(Debug, Clone, Default)]
pub struct EntryList {
    entries: Vec<DownloadEntry>,
}

impl EntryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_vec(entries: Vec<DownloadEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DownloadEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[DownloadEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&DownloadEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&DownloadEntry> {
        self.entries.iter().find(|e| e.file_path == path)
    }

    pub fn running_count(&self) -> usize {
        self.count_status(DownloadStatus::Downloading)
    }

    pub fn pending_count(&self) -> usize {
        self.count_status(DownloadStatus::Pending)
    }

    /// Everything neither running nor pending.
    pub fn paused_count(&self) -> usize {
        self.len() - self.running_count() - self.pending_count()
    }

    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            running: self.running_count(),
            pending: self.pending_count(),
            paused: self.paused_count(),
        }
    }

    /// First pending entry in list order.
    pub fn first_pending(&self) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|e| e.status == DownloadStatus::Pending)
            .map(|e| e.id)
    }

    fn count_status(&self, status: DownloadStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut DownloadEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DownloadEntry> {
        self.entries.iter_mut()
    }

    pub(crate) fn push_front(&mut self, entry: DownloadEntry) {
        self.entries.insert(0, entry);
    }

    pub(crate) fn remove(&mut self, id: EntryId) -> Option<DownloadEntry> {
        let i = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(i))
    }

    /// Removes and returns every entry matching `pred`, keeping the order of the rest.
    pub(crate) fn remove_where<F>(&mut self, mut pred: F) -> Vec<DownloadEntry>
    where
        F: FnMut(&DownloadEntry) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| pred(e));
        self.entries = kept;
        removed
    }
}
