//! Concurrency admission.
//!
//! The session calls [`AdmissionController::observe`] after every state
//! mutation. When the `(running, max)` pair differs from the last one seen and
//! a slot is free, the first pending entry in list order is returned for
//! promotion. One entry per change: the promoted entry starting to download
//! is itself a change, which lets the next pending entry through.

use crate::entry::{EntryId, EntryList};

#[derive(Debug, Default)]
pub struct AdmissionController {
    last_seen: Option<(usize, usize)>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry to promote, if any.
    pub fn observe(&mut self, entries: &EntryList, max_concurrent: usize) -> Option<EntryId> {
        let pair = (entries.running_count(), max_concurrent);
        if self.last_seen == Some(pair) {
            return None;
        }
        self.last_seen = Some(pair);
        if pair.0 >= pair.1 {
            return None;
        }
        entries.first_pending()
    }
}
