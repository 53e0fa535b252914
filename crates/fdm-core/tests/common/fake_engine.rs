//! Scripted fetch engine for session tests.
//!
//! Records every request. Prefetches answer immediately from a per-URL table,
//! or can be held open until the test releases them in arrival order. Each
//! started transfer keeps its event sender so the test can push events; a stop
//! request ends the stream with `AllFinished`, like the real engine.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fdm_core::engine::{
    DownloadEvent, EventReceiver, FetchEngine, MultiDownloadRequest, PrefetchRequest,
    SingleDownloadRequest, UrlInfo,
};
use tokio::sync::{mpsc, oneshot};

pub const DEFAULT_SIZE: u64 = 1000;

#[derive(Default)]
struct State {
    infos: HashMap<String, UrlInfo>,
    failing_prefetch: HashSet<String>,
    fail_downloads: bool,
    hold_prefetch: bool,
    held: VecDeque<oneshot::Sender<()>>,
    prefetches: Vec<String>,
    multi: Vec<MultiDownloadRequest>,
    single: Vec<SingleDownloadRequest>,
    stops: Vec<PathBuf>,
    streams: HashMap<PathBuf, mpsc::UnboundedSender<DownloadEvent>>,
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<State>,
}

/// Info a prefetch reports for `url` unless overridden.
pub fn default_info(url: &str) -> UrlInfo {
    let name = url.rsplit('/').next().unwrap_or("file").to_string();
    UrlInfo {
        size: DEFAULT_SIZE,
        name,
        supports_range: true,
        fast_download: true,
        final_url: url.to_string(),
        etag: Some("v1".into()),
        last_modified: None,
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_info(&self, url: &str, info: UrlInfo) {
        self.state().infos.insert(url.to_string(), info);
    }

    pub fn info_for(&self, url: &str) -> UrlInfo {
        self.state()
            .infos
            .get(url)
            .cloned()
            .unwrap_or_else(|| default_info(url))
    }

    pub fn fail_prefetch(&self, url: &str, fail: bool) {
        let mut st = self.state();
        if fail {
            st.failing_prefetch.insert(url.to_string());
        } else {
            st.failing_prefetch.remove(url);
        }
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.state().fail_downloads = fail;
    }

    /// While set, prefetches wait for [`FakeEngine::release_prefetch`].
    pub fn hold_prefetches(&self, hold: bool) {
        self.state().hold_prefetch = hold;
    }

    pub fn held_prefetches(&self) -> usize {
        self.state().held.len()
    }

    /// Lets the oldest held prefetch complete.
    pub fn release_prefetch(&self) {
        if let Some(tx) = self.state().held.pop_front() {
            let _ = tx.send(());
        }
    }

    pub fn prefetch_count(&self) -> usize {
        self.state().prefetches.len()
    }

    /// URLs prefetched so far, in call order.
    pub fn prefetched_urls(&self) -> Vec<String> {
        self.state().prefetches.clone()
    }

    pub fn multi_requests(&self) -> Vec<MultiDownloadRequest> {
        self.state().multi.clone()
    }

    pub fn single_requests(&self) -> Vec<SingleDownloadRequest> {
        self.state().single.clone()
    }

    pub fn stops(&self) -> Vec<PathBuf> {
        self.state().stops.clone()
    }

    pub fn is_streaming(&self, path: &Path) -> bool {
        self.state().streams.contains_key(path)
    }

    /// Pushes an event on the live stream for `path`.
    pub fn emit(&self, path: &Path, event: DownloadEvent) {
        let st = self.state();
        let tx = st.streams.get(path).expect("no live stream for path");
        tx.send(event).expect("stream receiver dropped");
    }

    /// Ends the transfer for `path` with `AllFinished`.
    pub fn finish(&self, path: &Path) {
        if let Some(tx) = self.state().streams.remove(path) {
            let _ = tx.send(DownloadEvent::AllFinished);
        }
    }

    /// Drops the stream for `path` without a final event.
    pub fn hang_up(&self, path: &Path) {
        self.state().streams.remove(path);
    }

    fn open_stream(&self, path: PathBuf) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().streams.insert(path, tx);
        rx
    }
}

#[async_trait]
impl FetchEngine for FakeEngine {
    async fn prefetch(&self, req: PrefetchRequest) -> Result<UrlInfo> {
        let gate = {
            let mut st = self.state();
            st.prefetches.push(req.url.clone());
            if st.hold_prefetch {
                let (tx, rx) = oneshot::channel();
                st.held.push_back(tx);
                Some(rx)
            } else {
                None
            }
        };
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if self.state().failing_prefetch.contains(&req.url) {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.info_for(&req.url))
    }

    async fn download_multi(&self, req: MultiDownloadRequest) -> Result<EventReceiver> {
        let path = req.file_path.clone();
        {
            let mut st = self.state();
            st.multi.push(req);
            if st.fail_downloads {
                return Err(anyhow!("disk full"));
            }
        }
        Ok(self.open_stream(path))
    }

    async fn download_single(&self, req: SingleDownloadRequest) -> Result<EventReceiver> {
        let path = req.file_path.clone();
        {
            let mut st = self.state();
            st.single.push(req);
            if st.fail_downloads {
                return Err(anyhow!("disk full"));
            }
        }
        Ok(self.open_stream(path))
    }

    async fn stop(&self, file_path: &Path) -> Result<()> {
        let tx = {
            let mut st = self.state();
            st.stops.push(file_path.to_path_buf());
            st.streams.remove(file_path)
        };
        if let Some(tx) = tx {
            let _ = tx.send(DownloadEvent::AllFinished);
        }
        Ok(())
    }
}
