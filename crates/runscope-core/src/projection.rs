//! Projection of raw task runs into renderable views.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::condition::{classify, ConditionStatus};
use crate::ids::{StepId, TaskRunId};
use crate::resource::{PipelineTaskRunStatus, StepDefinition, StepStatus, Task, TaskRun};

/// Classified runtime state of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepPhase {
    Terminated,
    Running,
    Waiting,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Terminated => "terminated",
            Self::Running => "running",
            Self::Waiting => "waiting",
        };
        f.write_str(s)
    }
}

/// One declared step merged with its runtime status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: StepId,
    pub step_name: String,
    /// The step as declared in the task.
    pub definition: StepDefinition,
    /// Raw runtime status; `None` until the step is reported.
    pub step_status: Option<StepStatus>,
    pub status: Option<StepPhase>,
    /// Only set for terminated steps.
    pub reason: Option<String>,
}

impl StepView {
    fn new(definition: &StepDefinition, step_status: Option<StepStatus>) -> Self {
        let status = step_status.as_ref().and_then(StepStatus::phase);
        let reason = match status {
            Some(StepPhase::Terminated) => step_status
                .as_ref()
                .and_then(|s| s.terminated.as_ref())
                .and_then(|t| t.reason.clone()),
            _ => None,
        };

        Self {
            id: StepId::new(definition.name.clone()),
            step_name: definition.name.clone(),
            definition: definition.clone(),
            step_status,
            status,
            reason,
        }
    }

    /// Wall time of a terminated step, when both timestamps were reported.
    pub fn duration(&self) -> Option<Duration> {
        let terminated = self.step_status.as_ref()?.terminated.as_ref()?;
        match (terminated.started_at, terminated.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// One task run of a pipeline run, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunView {
    pub id: TaskRunId,
    pub pipeline_task_name: String,
    pub pod: Option<String>,
    pub reason: Option<String>,
    pub succeeded: Option<ConditionStatus>,
    pub steps: Vec<StepView>,
    pub task_name: Option<String>,
    pub task_run_name: String,
}

impl TaskRunView {
    pub fn step(&self, id: &StepId) -> Option<&StepView> {
        self.steps.iter().find(|s| &s.id == id)
    }
}

/// Merge a task's declared steps with a task run's reported step statuses.
///
/// Steps are paired by position: the i-th declared step belongs to the i-th
/// reported status. The result always has one entry per declared step; steps
/// without a reported status get `status = None`. Without a task definition
/// there is nothing to show and the result is empty.
pub fn project_steps(runtime: &[Option<StepStatus>], task: Option<&Task>) -> Vec<StepView> {
    let Some(task) = task else {
        return Vec::new();
    };

    task.spec
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| StepView::new(step, runtime.get(index).cloned().flatten()))
        .collect()
}

/// The uid identifies a task run; runs reported without one fall back to
/// their name so that ids stay distinct.
fn task_run_id(task_run: &TaskRun) -> TaskRunId {
    match task_run.metadata.uid.as_deref() {
        Some(uid) if !uid.is_empty() => TaskRunId::new(uid),
        _ => TaskRunId::new(task_run.name()),
    }
}

/// Build the view of a single task run.
///
/// A missing task definition only empties the step list; the remaining fields
/// come from the task run itself.
pub fn project_task_run(
    task_run: &TaskRun,
    meta: &PipelineTaskRunStatus,
    tasks: &[Task],
) -> TaskRunView {
    let task_name = task_run.task_name();
    let task = task_name.and_then(|name| tasks.iter().find(|t| t.name() == name));
    let summary = classify(task_run);

    TaskRunView {
        id: task_run_id(task_run),
        pipeline_task_name: meta.pipeline_task_name.clone(),
        pod: task_run.status.pod_name.clone(),
        reason: summary.reason,
        succeeded: summary.status,
        steps: project_steps(&task_run.status.steps, task),
        task_name: task_name.map(str::to_owned),
        task_run_name: task_run.name().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, SUCCEEDED};
    use crate::resource::{ObjectMeta, ResourceRef, TaskRunSpec, TaskRunStatus, TaskSpec};
    use chrono::{TimeZone, Utc};

    fn task(name: &str, steps: &[&str]) -> Task {
        Task {
            metadata: ObjectMeta {
                name: name.to_string(),
                ..Default::default()
            },
            spec: TaskSpec {
                steps: steps.iter().map(|s| StepDefinition::new(*s)).collect(),
            },
        }
    }

    fn task_run(task_ref: Option<&str>, steps: Vec<Option<StepStatus>>) -> TaskRun {
        TaskRun {
            metadata: ObjectMeta {
                name: "tr1".to_string(),
                uid: Some("uid-1".to_string()),
                ..Default::default()
            },
            spec: TaskRunSpec {
                task_ref: task_ref.map(|name| ResourceRef {
                    name: name.to_string(),
                }),
            },
            status: TaskRunStatus {
                pod_name: Some("tr1-pod".to_string()),
                conditions: vec![Condition::new(SUCCEEDED, ConditionStatus::False)
                    .with_reason("Failed")],
                steps,
            },
        }
    }

    #[test]
    fn test_project_steps_count_matches_declared() {
        let def = task("build", &["fetch", "compile", "test"]);
        let reported = [
            Some(StepStatus::terminated("Completed")),
            Some(StepStatus::running()),
            Some(StepStatus::waiting()),
        ];

        for available in 0..=reported.len() {
            let steps = project_steps(&reported[..available], Some(&def));
            assert_eq!(steps.len(), 3, "with {} reported statuses", available);
            assert!(steps[available..].iter().all(|s| s.status.is_none()));
        }
    }

    #[test]
    fn test_project_steps_extra_runtime_statuses_ignored() {
        let def = task("build", &["only"]);
        let reported = vec![Some(StepStatus::running()), Some(StepStatus::running())];
        assert_eq!(project_steps(&reported, Some(&def)).len(), 1);
    }

    #[test]
    fn test_project_steps_classification() {
        let def = task("build", &["a", "b", "c", "d"]);
        let reported = vec![
            Some(StepStatus::terminated("Completed")),
            Some(StepStatus::running()),
            Some(StepStatus::waiting()),
            None,
        ];
        let steps = project_steps(&reported, Some(&def));

        assert_eq!(steps[0].status, Some(StepPhase::Terminated));
        assert_eq!(steps[0].reason.as_deref(), Some("Completed"));
        assert_eq!(steps[1].status, Some(StepPhase::Running));
        assert_eq!(steps[1].reason, None);
        assert_eq!(steps[2].status, Some(StepPhase::Waiting));
        assert_eq!(steps[2].reason, None);
        assert_eq!(steps[3].status, None);
        assert!(steps[3].step_status.is_none());
    }

    #[test]
    fn test_project_steps_ids_are_step_names() {
        let def = task("build", &["compile"]);
        let steps = project_steps(&[], Some(&def));
        assert_eq!(steps[0].id, StepId::new("compile"));
        assert_eq!(steps[0].step_name, "compile");
        assert_eq!(steps[0].definition.name, "compile");
    }

    #[test]
    fn test_project_steps_without_definition() {
        let steps = project_steps(&[Some(StepStatus::running())], None);
        assert!(steps.is_empty());
    }

    #[test]
    fn test_project_task_run() {
        let tasks = vec![task("build", &["compile", "test"])];
        let run = task_run(Some("build"), vec![Some(StepStatus::terminated("Error"))]);
        let meta = PipelineTaskRunStatus {
            pipeline_task_name: "build-step".to_string(),
        };

        let view = project_task_run(&run, &meta, &tasks);
        assert_eq!(view.id, TaskRunId::new("uid-1"));
        assert_eq!(view.pipeline_task_name, "build-step");
        assert_eq!(view.pod.as_deref(), Some("tr1-pod"));
        assert_eq!(view.succeeded, Some(ConditionStatus::False));
        assert_eq!(view.reason.as_deref(), Some("Failed"));
        assert_eq!(view.task_name.as_deref(), Some("build"));
        assert_eq!(view.task_run_name, "tr1");
        assert_eq!(view.steps.len(), 2);
        assert!(view.step(&StepId::new("test")).is_some());
    }

    #[test]
    fn test_project_task_run_missing_definition() {
        let tasks = vec![task("other", &["x"])];
        let meta = PipelineTaskRunStatus::default();

        for task_ref in [Some("renamed"), None] {
            let run = task_run(task_ref, vec![Some(StepStatus::running())]);
            let view = project_task_run(&run, &meta, &tasks);
            assert!(view.steps.is_empty());
            assert_eq!(view.id.as_str(), "uid-1");
            assert_eq!(view.pod.as_deref(), Some("tr1-pod"));
            assert_eq!(view.succeeded, Some(ConditionStatus::False));
        }
    }

    #[test]
    fn test_task_run_id_falls_back_to_name() {
        let tasks = vec![task("build", &["compile"])];
        let meta = PipelineTaskRunStatus::default();

        let mut first = task_run(Some("build"), vec![]);
        first.metadata.uid = None;
        let mut second = first.clone();
        second.metadata.name = "tr2".to_string();
        second.metadata.uid = Some(String::new());

        let views = vec![
            project_task_run(&first, &meta, &tasks),
            project_task_run(&second, &meta, &tasks),
        ];
        assert_eq!(views[0].id, TaskRunId::new("tr1"));
        assert_eq!(views[1].id, TaskRunId::new("tr2"));

        let selection = crate::selection::SelectionState::select(
            TaskRunId::new("tr2"),
            Some(StepId::new("compile")),
        );
        let detail = selection.resolve(&views).unwrap();
        assert_eq!(detail.task_run.task_run_name, "tr2");
    }

    #[test]
    fn test_step_duration() {
        let def = task("build", &["compile"]);
        let mut status = StepStatus::terminated("Completed");
        if let Some(t) = status.terminated.as_mut() {
            t.started_at = Some(Utc.with_ymd_and_hms(2019, 4, 11, 10, 0, 0).unwrap());
            t.finished_at = Some(Utc.with_ymd_and_hms(2019, 4, 11, 10, 1, 30).unwrap());
        }
        let steps = project_steps(&[Some(status)], Some(&def));
        assert_eq!(steps[0].duration(), Some(Duration::seconds(90)));

        let pending = project_steps(&[], Some(&def));
        assert_eq!(pending[0].duration(), None);
    }
}
