//! Resuming tasks.

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{AddOptions, Session, SessionError};
use crate::config::{ConfigOverride, DownloadConfig};
use crate::engine::{MultiDownloadRequest, PrefetchRequest, UrlInfo};
use crate::entry::{DownloadStatus, EntryId};
use crate::interval::invert_progress;
use crate::validate::validate_for_resume;

/// State captured before the prefetch.
struct Prepared {
    attempt: u64,
    url: String,
    cfg: DownloadConfig,
}

/// Outcome of re-examining the entry once the prefetch returned.
enum Next {
    /// Result belongs to a superseded attempt, or the entry is gone.
    Stale,
    /// No free slot any more; stays pending.
    Deferred,
    /// Progress is unusable; start over as a fresh add.
    Restart {
        url: String,
        config: Option<ConfigOverride>,
    },
    Launch(MultiDownloadRequest),
}

impl Session {
    /// Resumes a paused or pending entry.
    ///
    /// A no-op for entries already downloading. Without a free slot the entry
    /// becomes pending and is promoted later. Otherwise the URL is prefetched
    /// and the ranges not yet written are requested from the engine.
    pub async fn resume(&self, id: EntryId) -> Result<(), SessionError> {
        let Some(prep) = self.with_state(|st| {
            let free = st.has_free_slot();
            let global = st.global.clone();
            let e = st.entries.get_mut(id)?;
            if e.status == DownloadStatus::Downloading {
                return None;
            }
            e.status = DownloadStatus::Pending;
            if !free {
                e.prefetching = None;
                debug!(id = %id, "no free slot; entry queued");
                return None;
            }
            e.attempt += 1;
            e.prefetching = Some(e.attempt);
            Some(Prepared {
                attempt: e.attempt,
                url: e.url.clone(),
                cfg: global.merged(e.config.as_ref()),
            })
        }) else {
            return Ok(());
        };
        let attempt = prep.attempt;

        let info = match self
            .engine()
            .prefetch(PrefetchRequest::new(&prep.url, &prep.cfg))
            .await
        {
            Ok(info) => info,
            Err(cause) => {
                self.with_state(|st| {
                    if let Some(e) = st.entries.get_mut(id) {
                        if e.prefetching == Some(attempt) {
                            e.prefetching = None;
                        }
                        if e.attempt == attempt && e.status == DownloadStatus::Pending {
                            e.status = DownloadStatus::Paused;
                        }
                    }
                });
                return Err(SessionError::Prefetch {
                    url: prep.url,
                    cause,
                });
            }
        };

        match self.with_state(|st| plan_after_prefetch(st, id, attempt, &info, &prep.cfg)) {
            Next::Stale => {
                debug!(id = %id, attempt, "discarding stale prefetch result");
                Ok(())
            }
            Next::Deferred => {
                debug!(id = %id, "slots filled during prefetch; entry queued");
                Ok(())
            }
            Next::Restart { url, config } => {
                let opts = AddOptions {
                    url_info: Some(info),
                    config,
                    ..AddOptions::default()
                };
                self.add(&url, opts).await.map(|_| ())
            }
            Next::Launch(req) => {
                let path = req.file_path.clone();
                match self.engine().download_multi(req).await {
                    Ok(events) => {
                        self.spawn_reducer(id, attempt, events);
                        self.stop_if_superseded(id, attempt, &path).await;
                        Ok(())
                    }
                    Err(cause) => {
                        self.abandon_run(id, attempt);
                        Err(SessionError::Engine { path, cause })
                    }
                }
            }
        }
    }

    /// Resumes every paused entry that has bytes left to fetch.
    ///
    /// Entries are resumed concurrently; the first error is returned after all finish.
    pub async fn resume_all(&self) -> Result<(), SessionError> {
        let ids: Vec<EntryId> = self.read_state(|st| {
            st.entries
                .iter()
                .filter(|e| e.status == DownloadStatus::Paused && e.downloaded < e.file_size)
                .map(|e| e.id)
                .collect()
        });

        let mut set = JoinSet::new();
        for id in ids {
            let session = self.clone();
            set.spawn(async move { session.resume(id).await });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "resume failed");
                    first_err.get_or_insert(e);
                }
                Err(e) => warn!(error = %e, "resume task aborted"),
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn plan_after_prefetch(
    st: &mut super::SessionState,
    id: EntryId,
    attempt: u64,
    info: &UrlInfo,
    cfg: &DownloadConfig,
) -> Next {
    let free = st.has_free_slot();
    let Some(e) = st.entries.get_mut(id) else {
        return Next::Stale;
    };

    if e.attempt != attempt {
        // Only revert a pending state this attempt created itself.
        if e.prefetching == Some(attempt) {
            e.prefetching = None;
            if e.status == DownloadStatus::Pending {
                e.status = DownloadStatus::Paused;
            }
        }
        return Next::Stale;
    }
    e.prefetching = None;

    if !free {
        return Next::Deferred;
    }

    let unusable = if !info.fast_download {
        Some("server does not support ranged download".to_string())
    } else if e.downloaded >= info.size {
        Some("nothing left to fetch".to_string())
    } else {
        validate_for_resume(e, info).err().map(|c| c.to_string())
    };
    if let Some(reason) = unusable {
        info!(id = %id, reason = %reason, "restarting download as a new task");
        e.status = DownloadStatus::Paused;
        return Next::Restart {
            url: e.url.clone(),
            config: e.config.clone(),
        };
    }

    e.final_url = Some(info.final_url.clone());
    e.file_size = info.size;
    e.begin_run(attempt);

    let chunks = invert_progress(&e.write_coverage(), info.size);
    debug!(id = %id, missing = chunks.len(), "resuming transfer");
    Next::Launch(MultiDownloadRequest::resume(
        &info.final_url,
        e.file_path.clone(),
        info.size,
        chunks,
        e.write_progress.clone(),
        e.downloaded,
        cfg,
    ))
}
