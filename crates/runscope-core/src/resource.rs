//! Wire model for the resources served by the dashboard API.
//!
//! These mirror the Kubernetes JSON of Tekton pipeline runs, tasks and task
//! runs. Only the fields the projection reads are modelled; everything else is
//! ignored on decode. Optional sections default to empty so that partially
//! populated objects (e.g. a run that has not started yet) still decode.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::condition::{deserialize_conditions, Condition, Conditioned};
use crate::projection::StepPhase;

/// Decode a field that may be absent or `null` as its default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Kubernetes list envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ResourceList<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub items: Vec<T>,
}

/// The subset of object metadata the dashboard uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// Named reference to another resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

// =============================================================================
// Pipeline
// =============================================================================

/// A pipeline definition: an ordered set of tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: PipelineSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<PipelineTask>,
}

/// One task slot of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<ResourceRef>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

// =============================================================================
// PipelineRun
// =============================================================================

/// One execution of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: PipelineRunSpec,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PipelineRunStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunStatus {
    #[serde(default, deserialize_with = "deserialize_conditions")]
    pub conditions: Vec<Condition>,

    /// Task runs keyed by name, in the order the server reported them.
    ///
    /// `None` means the run carries no task-run mapping at all, which is
    /// different from an empty mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_runs: Option<IndexMap<String, PipelineTaskRunStatus>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

/// Per-task-run entry of a pipeline run's status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTaskRunStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pipeline_task_name: String,
}

impl PipelineRun {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Name of the pipeline this run executes, if referenced by name.
    pub fn pipeline_name(&self) -> Option<&str> {
        self.spec.pipeline_ref.as_ref().map(|r| r.name.as_str())
    }

    pub fn task_runs(&self) -> Option<&IndexMap<String, PipelineTaskRunStatus>> {
        self.status.task_runs.as_ref()
    }
}

impl Conditioned for PipelineRun {
    fn conditions(&self) -> &[Condition] {
        &self.status.conditions
    }
}

// =============================================================================
// Task
// =============================================================================

/// Reusable template describing an ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: TaskSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<StepDefinition>,
}

/// A declared step: its name plus whatever else the task author wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl StepDefinition {
    /// Create a step definition with no extra fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Map::new(),
        }
    }

    /// Builder method to add a static field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Container image, when declared.
    pub fn image(&self) -> Option<&str> {
        self.fields.get("image").and_then(Value::as_str)
    }
}

// =============================================================================
// TaskRun
// =============================================================================

/// One execution of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,

    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: TaskRunSpec,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskRunStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<ResourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_conditions")]
    pub conditions: Vec<Condition>,

    /// Runtime status per step, in declared order. Entries are `None` until
    /// the step has been reported.
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<Option<StepStatus>>,
}

impl TaskRun {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Name of the task this run executes, if referenced by name.
    pub fn task_name(&self) -> Option<&str> {
        self.spec.task_ref.as_ref().map(|r| r.name.as_str())
    }
}

impl Conditioned for TaskRun {
    fn conditions(&self) -> &[Condition] {
        &self.status.conditions
    }
}

/// Runtime status of a single step.
///
/// The backend reports at most one of the three states; if it ever sends more
/// than one, `terminated` wins over `running`, which wins over `waiting`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated: Option<TerminatedState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<RunningState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<WaitingState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitingState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepStatus {
    pub fn terminated(reason: impl Into<String>) -> Self {
        Self {
            terminated: Some(TerminatedState {
                reason: Some(reason.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn running() -> Self {
        Self {
            running: Some(RunningState::default()),
            ..Default::default()
        }
    }

    pub fn waiting() -> Self {
        Self {
            waiting: Some(WaitingState::default()),
            ..Default::default()
        }
    }

    /// Which of the three states this status is in, if any.
    pub fn phase(&self) -> Option<StepPhase> {
        if self.terminated.is_some() {
            Some(StepPhase::Terminated)
        } else if self.running.is_some() {
            Some(StepPhase::Running)
        } else if self.waiting.is_some() {
            Some(StepPhase::Waiting)
        } else {
            None
        }
    }
}
