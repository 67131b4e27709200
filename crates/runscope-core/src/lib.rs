//! Runscope Core Domain Types
//!
//! This crate contains the run-state projection engine with no dependencies on:
//! - Network/HTTP
//! - Async runtimes
//! - Terminal rendering
//!
//! Raw pipeline, task and task-run resources go in; a normalized, renderable
//! view model comes out. The [`session::RunSession`] state machine owns one
//! loaded run at a time and discards results from superseded loads.

pub mod condition;
pub mod error;
pub mod ids;
pub mod projection;
pub mod resource;
pub mod selection;
pub mod session;
pub mod time;

// Re-export commonly used types
pub use condition::{classify, Condition, ConditionStatus, Conditioned, RunPhase, StatusSummary};
pub use error::LoadError;
pub use ids::{StepId, TaskRunId};
pub use projection::{project_steps, project_task_run, StepPhase, StepView, TaskRunView};
pub use resource::{
    Pipeline, PipelineRun, PipelineTaskRunStatus, ResourceList, StepDefinition, StepStatus, Task,
    TaskRun,
};
pub use selection::{SelectionState, StepDetail};
pub use session::{
    plan_task_runs, BatchPolicy, LoadEvent, LoadState, LoadTicket, LoadedPhase, RunSession,
    TaskRunFailure, TaskRunFetch,
};
pub use time::{format_duration, format_timestamp};
