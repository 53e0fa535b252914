//! Removing tasks.

use tracing::{debug, warn};

use super::{Session, SessionError};
use crate::entry::{DownloadEntry, EntryId};

impl Session {
    /// Removes an entry, stopping its transfer if one may be running.
    pub async fn remove(&self, id: EntryId) -> Result<(), SessionError> {
        let removed = self.with_state(|st| {
            let mut e = st.entries.remove(id)?;
            e.attempt += 1;
            Some(e)
        });
        match removed {
            Some(e) => self.stop_removed(&e).await,
            None => Ok(()),
        }
    }

    /// Clears finished entries (paused with every byte fetched). Anything
    /// else stays. Returns how many were removed.
    pub async fn remove_all(&self) -> Result<usize, SessionError> {
        let removed = self.with_state(|st| {
            let mut gone = st.entries.remove_where(DownloadEntry::is_finished);
            for e in &mut gone {
                e.attempt += 1;
            }
            gone
        });
        debug!(count = removed.len(), "cleared finished entries");

        let mut first_err = None;
        for e in &removed {
            if let Err(err) = self.stop_removed(e).await {
                warn!(id = %e.id, error = %err, "stop after removal failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(removed.len()), Err)
    }

    async fn stop_removed(&self, e: &DownloadEntry) -> Result<(), SessionError> {
        debug!(id = %e.id, path = %e.file_path.display(), "entry removed");
        if !e.is_live() {
            return Ok(());
        }
        self.engine()
            .stop(&e.file_path)
            .await
            .map_err(|cause| SessionError::Stop {
                path: e.file_path.clone(),
                cause,
            })
    }
}
