//! Load errors surfaced by a run session.

use thiserror::Error;

/// Terminal errors a run load can end in.
///
/// Classification and projection never produce these; only fetching and the
/// run-level consistency check do.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The backend reported that the named resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other fetch failure.
    #[error("server error: {0}")]
    ServerError(String),

    /// The run failed and carries no task-run data to show.
    #[error("{0}")]
    InconsistentState(String),
}

impl LoadError {
    /// Short label for the run header.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not Found",
            Self::ServerError(_) => "Error",
            Self::InconsistentState(_) => "Failed",
        }
    }
}
