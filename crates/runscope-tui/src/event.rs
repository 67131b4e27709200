//! Event types for communication between the backend and the UI.

use runscope_core::{LoadEvent, LoadTicket};

use crate::state::{PipelineListing, RunListing};

/// Reachability of the dashboard API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Unreachable,
}

/// Events sent from the backend to the UI thread.
#[derive(Debug)]
pub enum UiEvent {
    /// A fetch phase of some run load settled.
    Load(LoadEvent),

    /// The pipeline list was refreshed.
    PipelinesListed(Vec<PipelineListing>),

    /// The run picker list was refreshed for `pipeline`.
    RunsListed {
        pipeline: Option<String>,
        runs: Vec<RunListing>,
    },

    /// An error not tied to a run load.
    Error(String),

    /// Connection state changed.
    ConnectionStateChanged(ConnectionState),
}

/// Commands sent from the UI to the backend.
#[derive(Debug)]
pub enum BackendCommand {
    /// Fetch everything for this ticket.
    Load(LoadTicket),

    /// Refresh the pipeline list.
    ListPipelines,

    /// Refresh the run picker, optionally only runs of one pipeline.
    ListRuns(Option<String>),

    /// Quit the application.
    Quit,
}
