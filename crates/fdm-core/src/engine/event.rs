//! Events streamed by a running transfer.

use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// Index of an engine worker within one transfer.
pub type WorkerId = usize;

/// One progress report from the engine.
///
/// Progress events carry the full per-worker range lists, not deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum DownloadEvent {
    Pulling(WorkerId),
    PullError(WorkerId, String),
    /// Read ranges per worker plus the cumulative byte count.
    PullProgress(Vec<Vec<Interval>>, u64),
    PushError(WorkerId, String),
    /// Ranges durably written, per worker.
    PushProgress(Vec<Vec<Interval>>),
    FlushError(String),
    Finished(WorkerId),
    AllFinished,
}
