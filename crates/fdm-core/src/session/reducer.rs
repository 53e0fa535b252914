//! Folding engine events into entries.

use tracing::{debug, error, warn};

use super::Session;
use crate::engine::{DownloadEvent, EventReceiver};
use crate::entry::{EntryId, EntryList};

/// What the stream loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamFlow {
    Continue,
    /// The run is over; stop reading.
    Done,
    /// The entry is gone or bound to another attempt; stop reading.
    Detached,
}

/// Applies one event from the stream of `attempt` to entry `id`.
///
/// Only the stream currently bound to the entry may change it. `AllFinished`
/// parks the entry; progress events replace the stored range lists wholesale;
/// worker-level events are logged only.
pub(crate) fn apply_event(
    entries: &mut EntryList,
    id: EntryId,
    attempt: u64,
    event: DownloadEvent,
) -> StreamFlow {
    let Some(e) = entries.get_mut(id) else {
        return StreamFlow::Detached;
    };
    if e.stream_attempt != Some(attempt) {
        return StreamFlow::Detached;
    }

    match event {
        DownloadEvent::AllFinished => {
            e.end_run();
            debug!(id = %id, downloaded = e.downloaded, size = e.file_size, "transfer finished");
            return StreamFlow::Done;
        }
        DownloadEvent::PullProgress(read, downloaded) => {
            e.read_progress = read;
            e.downloaded = downloaded;
        }
        DownloadEvent::PushProgress(written) => {
            e.write_progress = written;
        }
        DownloadEvent::Pulling(worker) => {
            debug!(id = %id, worker, "worker pulling");
        }
        DownloadEvent::Finished(worker) => {
            debug!(id = %id, worker, "worker finished");
        }
        DownloadEvent::PullError(worker, msg) => {
            warn!(id = %id, worker, error = %msg, "pull error");
        }
        DownloadEvent::PushError(worker, msg) => {
            warn!(id = %id, worker, error = %msg, "push error");
        }
        DownloadEvent::FlushError(msg) => {
            error!(id = %id, error = %msg, "flush error");
        }
    }
    StreamFlow::Continue
}

impl Session {
    /// Drains `events` for the run of `attempt` in the background.
    pub(crate) fn spawn_reducer(&self, id: EntryId, attempt: u64, events: EventReceiver) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(id = %id, "no async runtime; transfer events dropped");
            self.abandon_run(id, attempt);
            return;
        };
        let session = self.clone();
        handle.spawn(async move { session.drain_events(id, attempt, events).await });
    }

    async fn drain_events(&self, id: EntryId, attempt: u64, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            let flow = self.with_state(|st| apply_event(&mut st.entries, id, attempt, event));
            match flow {
                StreamFlow::Continue => {}
                StreamFlow::Done => return,
                StreamFlow::Detached => {
                    debug!(id = %id, attempt, "stream detached; ignoring the rest");
                    return;
                }
            }
        }
        // Closed without AllFinished: the run still ends.
        debug!(id = %id, attempt, "event stream closed");
        self.abandon_run(id, attempt);
    }
}
