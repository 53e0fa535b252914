//! Creating tasks.

use tracing::{debug, info, warn};
use url::Url;

use super::{Session, SessionError};
use crate::config::ConfigOverride;
use crate::engine::{MultiDownloadRequest, PrefetchRequest, SingleDownloadRequest, UrlInfo};
use crate::entry::{DownloadEntry, DownloadStatus, EntryId};

/// Options for [`Session::add`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Already resolved URL metadata; skips the prefetch.
    pub url_info: Option<UrlInfo>,
    /// Insert without starting.
    pub paused: bool,
    /// Per-task settings over the global config.
    pub config: Option<ConfigOverride>,
    /// Save under this name instead of the one the server suggests.
    pub file_name: Option<String>,
}

impl Session {
    /// Adds a download to the front of the list and starts it if a slot is free.
    ///
    /// Creation is serialized: concurrent calls resolve their save paths and
    /// insert one at a time, in call order. An existing entry with the same
    /// resolved path is evicted first.
    pub async fn add(&self, url: &str, opts: AddOptions) -> Result<EntryId, SessionError> {
        Url::parse(url).map_err(|source| SessionError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let _creation = self.inner.creation.lock().await;

        let cfg = self.read_state(|st| st.global.merged(opts.config.as_ref()));

        let info = match opts.url_info {
            Some(info) => info,
            None => self
                .engine()
                .prefetch(PrefetchRequest::new(url, &cfg))
                .await
                .map_err(|cause| SessionError::Prefetch {
                    url: url.to_string(),
                    cause,
                })?,
        };

        let name = opts.file_name.as_deref().unwrap_or(&info.name);
        let target = self
            .inner
            .paths
            .unique_path(&cfg.save_dir, name)
            .map_err(|cause| SessionError::PathAllocation {
                dir: cfg.save_dir.clone(),
                cause,
            })?;

        let evicted = self.with_state(|st| {
            let old = st.entries.find_by_path(&target.path)?.id;
            let mut e = st.entries.remove(old)?;
            e.attempt += 1;
            Some(e)
        });
        if let Some(old) = evicted {
            debug!(id = %old.id, path = %old.file_path.display(), "evicting entry at same path");
            if old.is_live() {
                self.engine()
                    .stop(&old.file_path)
                    .await
                    .map_err(|cause| SessionError::Stop {
                        path: old.file_path.clone(),
                        cause,
                    })?;
            }
        }

        let (id, attempt, start) = self.with_state(|st| {
            let id = st.alloc_id();
            let mut e = DownloadEntry::new(id, url, target.path.clone());
            e.file_name = target.name.clone();
            e.final_url = Some(info.final_url.clone());
            e.file_size = info.size;
            e.etag = info.etag.clone();
            e.last_modified = info.last_modified.clone();
            e.config = opts.config.clone();

            let start = !opts.paused && st.has_free_slot();
            if start {
                e.begin_run(e.attempt);
            } else if opts.paused {
                e.status = DownloadStatus::Paused;
            } else {
                e.status = DownloadStatus::Pending;
            }
            let attempt = e.attempt;
            debug!(id = %id, path = %e.file_path.display(), status = ?e.status, "entry added");
            st.entries.push_front(e);
            (id, attempt, start)
        });
        info!(id = %id, url, path = %target.path.display(), "download added");

        self.notify_added(target.name.clone());

        if !start {
            return Ok(id);
        }

        let issued = if info.fast_download {
            let req =
                MultiDownloadRequest::fresh(&info.final_url, target.path.clone(), info.size, &cfg);
            self.engine().download_multi(req).await
        } else {
            let req = SingleDownloadRequest::new(&info.final_url, target.path.clone(), &cfg);
            self.engine().download_single(req).await
        };

        match issued {
            Ok(events) => {
                self.spawn_reducer(id, attempt, events);
                self.stop_if_superseded(id, attempt, &target.path).await;
                Ok(id)
            }
            Err(cause) => {
                self.abandon_run(id, attempt);
                Err(SessionError::Engine {
                    path: target.path,
                    cause,
                })
            }
        }
    }

    /// Parks the entry if the run of `attempt` is still the one bound to it.
    pub(crate) fn abandon_run(&self, id: EntryId, attempt: u64) {
        self.with_state(|st| {
            if let Some(e) = st.entries.get_mut(id) {
                if e.stream_attempt == Some(attempt) {
                    e.end_run();
                }
            }
        });
    }

    /// Posts a "task added" notification unless the window has focus.
    fn notify_added(&self, file_name: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let shell = self.inner.shell.clone();
        handle.spawn(async move {
            let focused = match shell.is_focused().await {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, "focus query failed");
                    false
                }
            };
            if focused {
                return;
            }
            if let Err(e) = shell.notify("Task added", &file_name).await {
                warn!(error = %e, "notification failed");
            }
        });
    }
}
