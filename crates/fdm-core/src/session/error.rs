//! Errors surfaced by session operations.

use std::path::PathBuf;

/// Failure of a session operation. The affected entry is always left in a
/// consistent state (usually `paused`) before one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("prefetch of {url} failed: {cause:#}")]
    Prefetch { url: String, cause: anyhow::Error },

    #[error("no save path in {}: {cause:#}", .dir.display())]
    PathAllocation { dir: PathBuf, cause: anyhow::Error },

    #[error("engine refused transfer to {}: {cause:#}", .path.display())]
    Engine { path: PathBuf, cause: anyhow::Error },

    #[error("stop request for {} failed: {cause:#}", .path.display())]
    Stop { path: PathBuf, cause: anyhow::Error },

    #[error("{action} failed: {cause:#}")]
    Shell {
        action: &'static str,
        cause: anyhow::Error,
    },

    #[error("session persistence failed: {cause:#}")]
    Persist { cause: anyhow::Error },
}
