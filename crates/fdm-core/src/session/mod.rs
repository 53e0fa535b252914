//! Session orchestrator: the download list and every transition on it.
//!
//! Entry state lives behind a short `std::sync::Mutex` section that is never
//! held across an `.await`. Engine calls cannot be cancelled, so every async
//! step captures the entry's attempt token and re-checks it when the call
//! returns; a mismatch means the result belongs to a superseded attempt and is
//! dropped. After each mutation the admission controller is consulted and may
//! spawn a promotion.
//!
//! Operations are split by concern: `add`, `resume`, `pause`, `remove`,
//! stream handling in `reducer`, and `restart`/`quit`/persistence in
//! `lifecycle`.

mod add;
mod error;
mod lifecycle;
mod pause;
mod reducer;
mod remove;
mod resume;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::{DownloadConfig, FdmConfig};
use crate::controller::AdmissionController;
use crate::creation_lock::CreationLock;
use crate::engine::FetchEngine;
use crate::entry::{DownloadEntry, DownloadStatus, EntryId, EntryList, SessionCounts};
use crate::paths::PathAllocator;
use crate::shell::AppShell;
use crate::store::SessionStore;

pub use add::AddOptions;
pub use error::SessionError;

/// Collaborators a session drives.
#[derive(Clone)]
pub struct SessionDeps {
    pub engine: Arc<dyn FetchEngine>,
    pub paths: Arc<dyn PathAllocator>,
    pub shell: Arc<dyn AppShell>,
    /// Where `restart`/`quit` save the session; `None` disables persistence.
    pub store: Option<SessionStore>,
}

pub(crate) struct SessionState {
    pub(crate) entries: EntryList,
    pub(crate) global: DownloadConfig,
    pub(crate) max_concurrent_tasks: usize,
    pub(crate) next_id: u64,
    pub(crate) auto_start: bool,
    admission: AdmissionController,
}

impl SessionState {
    fn new(entries: EntryList, config: &FdmConfig, max: usize, next_id: u64) -> Self {
        Self {
            entries,
            global: config.download.clone(),
            max_concurrent_tasks: max.max(1),
            next_id,
            auto_start: config.auto_start,
            admission: AdmissionController::new(),
        }
    }

    pub(crate) fn has_free_slot(&self) -> bool {
        self.entries.running_count() < self.max_concurrent_tasks
    }

    pub(crate) fn alloc_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}

struct Inner {
    engine: Arc<dyn FetchEngine>,
    paths: Arc<dyn PathAllocator>,
    shell: Arc<dyn AppShell>,
    store: Option<SessionStore>,
    state: Mutex<SessionState>,
    creation: CreationLock,
}

/// Handle to a download session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Empty session using the limits and defaults from `config`.
    pub fn new(deps: SessionDeps, config: &FdmConfig) -> Self {
        let state = SessionState::new(EntryList::new(), config, config.max_concurrent_tasks, 1);
        Self::from_state(deps, state)
    }

    fn from_state(deps: SessionDeps, state: SessionState) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine: deps.engine,
                paths: deps.paths,
                shell: deps.shell,
                store: deps.store,
                state: Mutex::new(state),
                creation: CreationLock::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the session state, then lets the admission controller react.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (out, promote) = {
            let mut guard = self.lock_state();
            let st = &mut *guard;
            let out = f(st);
            let promote = st.admission.observe(&st.entries, st.max_concurrent_tasks);
            (out, promote)
        };
        if let Some(id) = promote {
            self.spawn_promotion(id);
        }
        out
    }

    /// Read-only access without triggering admission.
    fn read_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.lock_state())
    }

    fn spawn_promotion(&self, id: EntryId) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(id = %id, "no async runtime; pending entry not promoted");
            return;
        };
        debug!(id = %id, "promoting pending entry");
        let session = self.clone();
        handle.spawn(async move {
            if let Err(e) = session.resume(id).await {
                warn!(id = %id, error = %e, "promotion failed");
            }
        });
    }

    pub(crate) fn engine(&self) -> &dyn FetchEngine {
        self.inner.engine.as_ref()
    }

    /// Sends a second stop when the entry was paused or removed while its
    /// transfer was being started; the first stop may have reached the engine
    /// before the transfer existed.
    pub(crate) async fn stop_if_superseded(&self, id: EntryId, attempt: u64, path: &Path) {
        let superseded = self.read_state(|st| match st.entries.get(id) {
            Some(e) => e.attempt != attempt,
            // Removed: unless the path already belongs to a newer entry.
            None => st.entries.find_by_path(path).is_none(),
        });
        if superseded {
            debug!(id = %id, "attempt superseded during start; stopping again");
            if let Err(e) = self.engine().stop(path).await {
                warn!(id = %id, error = %e, "repeat stop failed");
            }
        }
    }

    /// Snapshot of every entry in list order.
    pub fn entries(&self) -> Vec<DownloadEntry> {
        self.read_state(|st| st.entries.as_slice().to_vec())
    }

    pub fn entry(&self, id: EntryId) -> Option<DownloadEntry> {
        self.read_state(|st| st.entries.get(id).cloned())
    }

    pub fn id_for_path(&self, path: &Path) -> Option<EntryId> {
        self.read_state(|st| st.entries.find_by_path(path).map(|e| e.id))
    }

    pub fn counts(&self) -> SessionCounts {
        self.read_state(|st| st.entries.counts())
    }

    pub fn global_config(&self) -> DownloadConfig {
        self.read_state(|st| st.global.clone())
    }

    /// Replaces the global defaults. Affects operations started afterwards.
    pub fn set_global_config(&self, config: DownloadConfig) {
        self.with_state(|st| st.global = config);
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.read_state(|st| st.max_concurrent_tasks)
    }

    /// Changes the concurrency limit (at least 1).
    ///
    /// Raising it promotes pending entries. Lowering it below the running
    /// count moves the newest running entries back to pending and asks the
    /// engine to stop them; they are promoted again as slots free up.
    pub async fn set_max_concurrent_tasks(&self, max: usize) -> Result<(), SessionError> {
        let max = max.max(1);
        let requeued: Vec<(EntryId, PathBuf)> = self.with_state(|st| {
            st.max_concurrent_tasks = max;
            let excess = st.entries.running_count().saturating_sub(max);
            st.entries
                .iter_mut()
                .filter(|e| e.status == DownloadStatus::Downloading)
                .take(excess)
                .map(|e| {
                    e.attempt += 1;
                    e.requeue();
                    (e.id, e.file_path.clone())
                })
                .collect()
        });
        debug!(max, requeued = requeued.len(), "concurrency limit changed");
        self.stop_each(requeued).await
    }

    /// Whether the application starts with the system.
    pub fn auto_start(&self) -> bool {
        self.read_state(|st| st.auto_start)
    }

    /// Turns start-with-system on or off. The shell is only called when the
    /// value changes; if it fails the old value is kept.
    pub async fn set_auto_start(&self, enabled: bool) -> Result<(), SessionError> {
        let changed = self.with_state(|st| std::mem::replace(&mut st.auto_start, enabled) != enabled);
        if !changed {
            return Ok(());
        }
        debug!(enabled, "auto start changed");
        if let Err(cause) = self.inner.shell.set_auto_start(enabled).await {
            self.with_state(|st| st.auto_start = !enabled);
            return Err(SessionError::Shell {
                action: "auto start",
                cause,
            });
        }
        Ok(())
    }
}
