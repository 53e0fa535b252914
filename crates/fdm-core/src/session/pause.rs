//! Pausing tasks.

use std::path::PathBuf;

use tracing::{debug, warn};

use super::{Session, SessionError};
use crate::entry::{DownloadStatus, EntryId};

impl Session {
    /// Pauses one entry.
    ///
    /// Bumps the attempt token so in-flight results for the entry are
    /// discarded. A pending entry is parked locally; a downloading one is
    /// asked to stop and parks when the engine reports the end of the run.
    pub async fn pause(&self, id: EntryId) -> Result<(), SessionError> {
        let stop = self.with_state(|st| {
            let e = st.entries.get_mut(id)?;
            e.attempt += 1;
            match e.status {
                DownloadStatus::Pending => {
                    e.status = DownloadStatus::Paused;
                    debug!(id = %id, "pending entry paused");
                    None
                }
                DownloadStatus::Downloading => Some(e.file_path.clone()),
                DownloadStatus::Paused => None,
            }
        });

        match stop {
            Some(path) => self.request_stop(id, path).await,
            None => Ok(()),
        }
    }

    /// Pauses every entry. All stop requests are sent; the first failure is returned.
    pub async fn pause_all(&self) -> Result<(), SessionError> {
        let live: Vec<(EntryId, PathBuf)> = self.with_state(|st| {
            let mut live = Vec::new();
            for e in st.entries.iter_mut() {
                e.attempt += 1;
                match e.status {
                    DownloadStatus::Pending => e.status = DownloadStatus::Paused,
                    DownloadStatus::Downloading => live.push((e.id, e.file_path.clone())),
                    DownloadStatus::Paused => {}
                }
            }
            live
        });
        debug!(stopping = live.len(), "pausing all entries");
        self.stop_each(live).await
    }

    /// Sends a stop for every `(id, path)` in turn; the first failure is returned.
    pub(crate) async fn stop_each(&self, live: Vec<(EntryId, PathBuf)>) -> Result<(), SessionError> {
        let mut first_err = None;
        for (id, path) in live {
            if let Err(e) = self.request_stop(id, path).await {
                warn!(id = %id, error = %e, "stop failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Asks the engine to stop `path`. If the request itself fails the run is
    /// ended locally so the entry does not stay downloading forever.
    async fn request_stop(&self, id: EntryId, path: PathBuf) -> Result<(), SessionError> {
        match self.engine().stop(&path).await {
            Ok(()) => Ok(()),
            Err(cause) => {
                self.with_state(|st| {
                    if let Some(e) = st.entries.get_mut(id) {
                        if e.is_live() {
                            e.end_run();
                        }
                    }
                });
                Err(SessionError::Stop { path, cause })
            }
        }
    }
}
