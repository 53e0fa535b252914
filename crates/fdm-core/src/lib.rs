pub mod config;
pub mod logging;

// Range bookkeeping and the entry model
pub mod entry;
pub mod interval;
pub mod stats;

// Scheduling
pub mod controller;
pub mod creation_lock;
pub mod session;

// Collaborator contracts and helpers
pub mod engine;
pub mod headers;
pub mod paths;
pub mod shell;
pub mod store;
pub mod validate;

pub use entry::{DownloadEntry, DownloadStatus, EntryId, SessionCounts};
pub use session::{AddOptions, Session, SessionDeps, SessionError};
