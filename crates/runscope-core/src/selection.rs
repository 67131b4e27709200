//! Which task run and step the user is looking at.

use serde::Serialize;

use crate::ids::{StepId, TaskRunId};
use crate::projection::{StepPhase, TaskRunView};
use crate::resource::{StepDefinition, StepStatus};

/// Current selection. Both ids are set together; a step is never selected
/// without its owning task run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub selected_task_id: Option<TaskRunId>,
    pub selected_step_id: Option<StepId>,
}

impl SelectionState {
    /// Selection of a task run and, optionally, one of its steps.
    ///
    /// The ids are not checked against any loaded data.
    pub fn select(task_id: TaskRunId, step_id: Option<StepId>) -> Self {
        Self {
            selected_task_id: Some(task_id),
            selected_step_id: step_id,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.selected_task_id.is_none()
    }

    /// Resolve the selection against live task runs.
    ///
    /// Returns `None` when nothing should be displayed: no step selected, or
    /// the ids no longer match anything.
    pub fn resolve<'a>(&self, task_runs: &'a [TaskRunView]) -> Option<StepDetail<'a>> {
        let task_id = self.selected_task_id.as_ref()?;
        let step_id = self.selected_step_id.as_ref()?;
        let task_run = task_runs.iter().find(|t| &t.id == task_id)?;
        let step = task_run.step(step_id)?;

        Some(StepDetail {
            definition: &step.definition,
            reason: step.reason.as_deref(),
            step_name: &step.step_name,
            step_status: step.step_status.as_ref(),
            status: step.status,
            task_run,
        })
    }
}

/// Everything the detail pane shows for the selected step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDetail<'a> {
    pub definition: &'a StepDefinition,
    pub reason: Option<&'a str>,
    pub step_name: &'a str,
    pub step_status: Option<&'a StepStatus>,
    pub status: Option<StepPhase>,
    pub task_run: &'a TaskRunView,
}
