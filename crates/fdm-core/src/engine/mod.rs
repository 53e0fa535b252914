//! Contract of the external fetch engine.
//!
//! The engine performs the actual HTTP work (ranged multi-worker retrieval,
//! disk writes, retries, TLS and proxy handling). The session only decides
//! which ranges to request and when; results come back as a stream of
//! [`DownloadEvent`]s.

mod event;
mod request;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::mpsc;

pub use event::{DownloadEvent, WorkerId};
pub use request::{MultiDownloadRequest, PrefetchRequest, SingleDownloadRequest};

/// Receiving half of an engine event stream. The stream ends when the sender is dropped.
pub type EventReceiver = mpsc::UnboundedReceiver<DownloadEvent>;

/// Certificate and hostname validation switches forwarded to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    pub accept_invalid_certs: bool,
    pub accept_invalid_hostnames: bool,
}

/// What a prefetch learned about a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlInfo {
    pub size: u64,
    /// Suggested file name (from Content-Disposition or the URL path).
    pub name: String,
    pub supports_range: bool,
    /// Server allows several ranged workers at once.
    pub fast_download: bool,
    /// URL after redirects.
    pub final_url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Network-facing operations the session delegates.
///
/// None of these calls can be cancelled once issued. A download call returns
/// as soon as the transfer is started; progress arrives on the returned
/// receiver.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Resolves redirects, size and range capability of a URL.
    async fn prefetch(&self, req: PrefetchRequest) -> Result<UrlInfo>;

    /// Starts a ranged transfer of the given plan.
    async fn download_multi(&self, req: MultiDownloadRequest) -> Result<EventReceiver>;

    /// Starts a plain single-stream transfer.
    async fn download_single(&self, req: SingleDownloadRequest) -> Result<EventReceiver>;

    /// Asks the transfer writing to `file_path` to halt. Idempotent.
    async fn stop(&self, file_path: &Path) -> Result<()>;
}
