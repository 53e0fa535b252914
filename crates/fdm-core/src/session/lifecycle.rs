//! Snapshot, restore, restart, and quit.

use tracing::{error, info, warn};

use super::{Session, SessionDeps, SessionError, SessionState};
use crate::config::FdmConfig;
use crate::entry::{DownloadStatus, EntryList};
use crate::store::{SessionSnapshot, SNAPSHOT_VERSION};

impl Session {
    /// Rebuilds a session from a saved snapshot.
    ///
    /// Transfers do not survive a restart: entries that were downloading come
    /// back paused. Pending entries are promoted as slots allow.
    pub fn restore(deps: SessionDeps, config: &FdmConfig, snapshot: SessionSnapshot) -> Self {
        let mut entries = snapshot.entries;
        for e in &mut entries {
            if e.status == DownloadStatus::Downloading {
                e.status = DownloadStatus::Paused;
            }
        }
        let next_id = entries
            .iter()
            .map(|e| e.id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(snapshot.next_id);
        info!(entries = entries.len(), "session restored");

        let state = SessionState::new(
            EntryList::from_vec(entries),
            config,
            snapshot.max_concurrent_tasks,
            next_id,
        );
        let session = Self::from_state(deps, state);
        session.with_state(|_| ());
        session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read_state(|st| SessionSnapshot {
            version: SNAPSHOT_VERSION,
            max_concurrent_tasks: st.max_concurrent_tasks,
            next_id: st.next_id,
            entries: st.entries.as_slice().to_vec(),
        })
    }

    /// Writes the snapshot to the configured store, if any.
    pub fn save(&self) -> Result<(), SessionError> {
        let Some(store) = &self.inner.store else {
            return Ok(());
        };
        store
            .save(&self.snapshot())
            .map_err(|cause| SessionError::Persist { cause })
    }

    /// Pauses everything, saves, and asks the shell to relaunch.
    pub async fn restart(&self) -> Result<(), SessionError> {
        self.wind_down().await;
        self.inner
            .shell
            .relaunch()
            .await
            .map_err(|cause| SessionError::Shell {
                action: "relaunch",
                cause,
            })
    }

    /// Pauses everything, saves, and asks the shell to exit.
    pub async fn quit(&self) -> Result<(), SessionError> {
        self.wind_down().await;
        self.inner
            .shell
            .exit(0)
            .await
            .map_err(|cause| SessionError::Shell {
                action: "exit",
                cause,
            })
    }

    /// Failures here must not keep the application from going down.
    async fn wind_down(&self) {
        if let Err(e) = self.pause_all().await {
            warn!(error = %e, "pause before shutdown incomplete");
        }
        if let Err(e) = self.save() {
            error!(error = %e, "session not saved");
        }
    }
}
