//! The fetch seam the loader depends on.

use async_trait::async_trait;

use runscope_core::{PipelineRun, Task, TaskRun};

use crate::error::ClientError;

/// Read-only access to the resources a run load needs.
///
/// [`crate::DashboardClient`] is the production implementation; tests plug in
/// in-memory sources.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Fetch a pipeline run by name.
    async fn fetch_pipeline_run(&self, name: &str) -> Result<PipelineRun, ClientError>;

    /// Fetch every task definition in the namespace.
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ClientError>;

    /// Fetch a task run by name.
    async fn fetch_task_run(&self, name: &str) -> Result<TaskRun, ClientError>;
}
