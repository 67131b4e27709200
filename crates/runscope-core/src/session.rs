//! Run session state machine.
//!
//! A session observes one pipeline run at a time:
//!
//! ```text
//! Idle -> Loading -> Loaded(TaskRunsPending) -> Loaded(Complete)
//!                \-> Failed                 \-> Failed
//! ```
//!
//! Fetching happens elsewhere; results come back as [`LoadEvent`]s tagged
//! with the [`LoadTicket`] handed out by [`RunSession::begin`]. Events whose
//! ticket belongs to a superseded load are dropped without touching state.

use serde::Serialize;

use crate::condition::{classify, StatusSummary};
use crate::error::LoadError;
use crate::ids::{StepId, TaskRunId};
use crate::projection::{project_task_run, TaskRunView};
use crate::resource::{PipelineRun, Task, TaskRun};
use crate::selection::{SelectionState, StepDetail};

/// Where a session is in its load cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded(LoadedPhase),
    Failed,
}

/// Sub-phase of a loaded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadedPhase {
    /// Run and task definitions are in; task runs are still being fetched.
    TaskRunsPending,
    Complete,
}

/// How a batch of task-run fetches settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Any failing fetch fails the whole batch.
    #[default]
    FailFast,
    /// Each fetch settles on its own; failures are reported next to the views.
    Isolated,
}

/// Handle for one load of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    generation: u64,
    run_name: String,
}

impl LoadTicket {
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of fetching one task run.
#[derive(Debug, Clone)]
pub struct TaskRunFetch {
    pub task_run_name: String,
    pub result: Result<TaskRun, LoadError>,
}

/// A task run that could not be fetched under [`BatchPolicy::Isolated`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunFailure {
    pub task_run_name: String,
    pub pipeline_task_name: String,
    pub error: String,
}

/// Settled fetch phase for a given load.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    /// Phase one: the run and all task definitions.
    RunFetched {
        ticket: LoadTicket,
        result: Result<(PipelineRun, Vec<Task>), LoadError>,
    },
    /// Phase two: every referenced task run.
    TaskRunsFetched {
        ticket: LoadTicket,
        batch: Result<Vec<TaskRunFetch>, LoadError>,
    },
}

impl LoadEvent {
    pub fn ticket(&self) -> &LoadTicket {
        match self {
            Self::RunFetched { ticket, .. } | Self::TaskRunsFetched { ticket, .. } => ticket,
        }
    }
}

/// Decide whether a fetched run can proceed to phase two.
///
/// Returns the names of the task runs to fetch, in mapping order. A failed run
/// without any task-run mapping has nothing to show and is an error; a failed
/// run with a mapping proceeds so partial results stay visible.
pub fn plan_task_runs(run: &PipelineRun) -> Result<Vec<String>, LoadError> {
    let summary = classify(run);
    match run.task_runs() {
        None if summary.is_failed() => Err(LoadError::InconsistentState(
            summary
                .message
                .or(summary.reason)
                .unwrap_or_else(|| format!("pipeline run {} failed", run.name())),
        )),
        None => Ok(Vec::new()),
        Some(mapping) => Ok(mapping.keys().cloned().collect()),
    }
}

/// State of the observed run and everything derived from it.
#[derive(Debug, Default)]
pub struct RunSession {
    run_name: Option<String>,
    generation: u64,
    state: LoadState,
    pipeline_run: Option<PipelineRun>,
    tasks: Vec<Task>,
    task_runs: Vec<TaskRunView>,
    failures: Vec<TaskRunFailure>,
    selection: SelectionState,
    error: Option<LoadError>,
}

impl RunSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing `run_name`, discarding all derived state.
    ///
    /// Any load still in flight for a previous call becomes stale.
    pub fn begin(&mut self, run_name: impl Into<String>) -> LoadTicket {
        let run_name = run_name.into();
        self.generation = self.generation.wrapping_add(1);
        self.run_name = Some(run_name.clone());
        self.state = LoadState::Loading;
        self.pipeline_run = None;
        self.tasks.clear();
        self.task_runs.clear();
        self.failures.clear();
        self.selection.clear();
        self.error = None;

        LoadTicket {
            generation: self.generation,
            run_name,
        }
    }

    /// Whether results for `ticket` may still be applied.
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
            && self.run_name.as_deref() == Some(ticket.run_name.as_str())
    }

    /// Apply a settled fetch phase. Returns false when the event was stale.
    pub fn apply(&mut self, event: LoadEvent) -> bool {
        match event {
            LoadEvent::RunFetched { ticket, result } => self.apply_run(&ticket, result),
            LoadEvent::TaskRunsFetched { ticket, batch } => self.apply_task_runs(&ticket, batch),
        }
    }

    fn apply_run(
        &mut self,
        ticket: &LoadTicket,
        result: Result<(PipelineRun, Vec<Task>), LoadError>,
    ) -> bool {
        if !self.is_current(ticket) || self.state != LoadState::Loading {
            return false;
        }

        match result {
            Ok((run, tasks)) => {
                let planned = plan_task_runs(&run);
                self.pipeline_run = Some(run);
                self.tasks = tasks;
                match planned {
                    Ok(names) if names.is_empty() => {
                        self.state = LoadState::Loaded(LoadedPhase::Complete);
                    }
                    Ok(_) => {
                        self.state = LoadState::Loaded(LoadedPhase::TaskRunsPending);
                    }
                    Err(e) => self.fail(e),
                }
            }
            Err(e) => self.fail(e),
        }
        true
    }

    fn apply_task_runs(
        &mut self,
        ticket: &LoadTicket,
        batch: Result<Vec<TaskRunFetch>, LoadError>,
    ) -> bool {
        if !self.is_current(ticket)
            || self.state != LoadState::Loaded(LoadedPhase::TaskRunsPending)
        {
            return false;
        }

        let mut fetched = match batch {
            Ok(fetched) => fetched,
            Err(e) => {
                self.fail(e);
                return true;
            }
        };

        let Some(mapping) = self.pipeline_run.as_ref().and_then(PipelineRun::task_runs) else {
            self.state = LoadState::Loaded(LoadedPhase::Complete);
            return true;
        };

        let mut views = Vec::with_capacity(mapping.len());
        let mut failures = Vec::new();
        // Publish in mapping order; anything fetched outside the mapping is dropped.
        for (name, meta) in mapping {
            let Some(pos) = fetched.iter().position(|f| &f.task_run_name == name) else {
                continue;
            };
            match fetched.swap_remove(pos).result {
                Ok(task_run) => views.push(project_task_run(&task_run, meta, &self.tasks)),
                Err(e) => failures.push(TaskRunFailure {
                    task_run_name: name.clone(),
                    pipeline_task_name: meta.pipeline_task_name.clone(),
                    error: e.to_string(),
                }),
            }
        }

        self.task_runs = views;
        self.failures = failures;
        self.state = LoadState::Loaded(LoadedPhase::Complete);
        true
    }

    fn fail(&mut self, error: LoadError) {
        self.state = LoadState::Failed;
        self.error = Some(error);
    }

    /// Select a task run and optionally one of its steps.
    pub fn select(&mut self, task_id: TaskRunId, step_id: Option<StepId>) {
        self.selection = SelectionState::select(task_id, step_id);
    }

    /// Detail of the selected step, or `None` if there is nothing to show.
    pub fn step_detail(&self) -> Option<StepDetail<'_>> {
        self.selection.resolve(&self.task_runs)
    }

    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// True until the run itself has been fetched.
    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    pub fn pipeline_run(&self) -> Option<&PipelineRun> {
        self.pipeline_run.as_ref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Classified status of the run; all `None` before it has been fetched.
    pub fn run_status(&self) -> StatusSummary {
        self.pipeline_run.as_ref().map(classify).unwrap_or_default()
    }

    pub fn task_runs(&self) -> &[TaskRunView] {
        &self.task_runs
    }

    pub fn failures(&self) -> &[TaskRunFailure] {
        &self.failures
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionStatus, SUCCEEDED};
    use crate::projection::StepPhase;
    use crate::resource::{
        ObjectMeta, PipelineTaskRunStatus, ResourceRef, StepDefinition, StepStatus, TaskRunSpec,
        TaskRunStatus, TaskSpec,
    };
    use indexmap::IndexMap;

    fn run(name: &str, status: ConditionStatus, task_runs: Option<&[(&str, &str)]>) -> PipelineRun {
        let mut run = PipelineRun::default();
        run.metadata.name = name.to_string();
        run.status.conditions = vec![Condition::new(SUCCEEDED, status).with_message("run message")];
        run.status.task_runs = task_runs.map(|entries| {
            entries
                .iter()
                .map(|(tr, pt)| {
                    (
                        tr.to_string(),
                        PipelineTaskRunStatus {
                            pipeline_task_name: pt.to_string(),
                        },
                    )
                })
                .collect::<IndexMap<_, _>>()
        });
        run
    }

    fn build_task() -> Task {
        Task {
            metadata: ObjectMeta {
                name: "build".to_string(),
                ..Default::default()
            },
            spec: TaskSpec {
                steps: vec![StepDefinition::new("compile")],
            },
        }
    }

    fn task_run(name: &str) -> TaskRun {
        TaskRun {
            metadata: ObjectMeta {
                name: name.to_string(),
                uid: Some(format!("{}-uid", name)),
                ..Default::default()
            },
            spec: TaskRunSpec {
                task_ref: Some(ResourceRef {
                    name: "build".to_string(),
                }),
            },
            status: TaskRunStatus {
                pod_name: Some(format!("{}-pod", name)),
                conditions: vec![Condition::new(SUCCEEDED, ConditionStatus::True)],
                steps: vec![Some(StepStatus::terminated("Completed"))],
            },
        }
    }

    fn fetch(name: &str) -> TaskRunFetch {
        TaskRunFetch {
            task_run_name: name.to_string(),
            result: Ok(task_run(name)),
        }
    }

    #[test]
    fn test_begin_resets_state() {
        let mut session = RunSession::new();
        assert_eq!(session.state(), LoadState::Idle);

        let ticket = session.begin("r1");
        session.apply(LoadEvent::RunFetched {
            ticket,
            result: Err(LoadError::NotFound("r1".into())),
        });
        session.select(TaskRunId::new("x"), None);
        assert!(session.error().is_some());

        let ticket = session.begin("r2");
        assert_eq!(ticket.run_name(), "r2");
        assert!(session.is_loading());
        assert!(session.error().is_none());
        assert!(session.selection().is_empty());
        assert!(session.task_runs().is_empty());
        assert!(session.pipeline_run().is_none());
    }

    #[test]
    fn test_plan_task_runs() {
        let ok = run("r", ConditionStatus::True, Some(&[("a", "pa"), ("b", "pb")]));
        assert_eq!(plan_task_runs(&ok).unwrap(), vec!["a", "b"]);

        let failed_with_data = run("r", ConditionStatus::False, Some(&[("a", "pa")]));
        assert_eq!(plan_task_runs(&failed_with_data).unwrap(), vec!["a"]);

        let failed_without = run("r", ConditionStatus::False, None);
        assert_eq!(
            plan_task_runs(&failed_without),
            Err(LoadError::InconsistentState("run message".into()))
        );

        let pending = run("r", ConditionStatus::Unknown, None);
        assert!(plan_task_runs(&pending).unwrap().is_empty());
    }

    #[test]
    fn test_full_load_cycle() {
        let mut session = RunSession::new();
        let ticket = session.begin("r1");

        let applied = session.apply(LoadEvent::RunFetched {
            ticket: ticket.clone(),
            result: Ok((
                run("r1", ConditionStatus::True, Some(&[("tr1", "build")])),
                vec![build_task()],
            )),
        });
        assert!(applied);
        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::TaskRunsPending));
        assert!(session.run_status().is_succeeded());

        session.apply(LoadEvent::TaskRunsFetched {
            ticket,
            batch: Ok(vec![fetch("tr1")]),
        });
        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        let views = session.task_runs();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].task_run_name, "tr1");
        assert_eq!(views[0].pipeline_task_name, "build");
        assert_eq!(views[0].steps[0].status, Some(StepPhase::Terminated));

        session.select(TaskRunId::new("tr1-uid"), Some(StepId::new("compile")));
        let detail = session.step_detail().unwrap();
        assert_eq!(detail.reason, Some("Completed"));

        session.select(TaskRunId::new("tr1-uid"), Some(StepId::new("missing")));
        assert!(session.step_detail().is_none());
    }

    #[test]
    fn test_views_follow_mapping_order_and_drop_unmapped() {
        let mut session = RunSession::new();
        let ticket = session.begin("r1");
        session.apply(LoadEvent::RunFetched {
            ticket: ticket.clone(),
            result: Ok((
                run("r1", ConditionStatus::Unknown, Some(&[("b", "second"), ("a", "first")])),
                vec![build_task()],
            )),
        });
        session.apply(LoadEvent::TaskRunsFetched {
            ticket,
            batch: Ok(vec![fetch("a"), fetch("stray"), fetch("b")]),
        });

        let names: Vec<&str> = session
            .task_runs()
            .iter()
            .map(|v| v.task_run_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_failed_run_without_mapping_fails() {
        let mut session = RunSession::new();
        let ticket = session.begin("r1");
        session.apply(LoadEvent::RunFetched {
            ticket,
            result: Ok((run("r1", ConditionStatus::False, None), vec![])),
        });

        assert_eq!(session.state(), LoadState::Failed);
        assert!(!session.error().unwrap().to_string().is_empty());
        assert!(session.task_runs().is_empty());
        assert!(session.run_status().is_failed());
    }

    #[test]
    fn test_fail_fast_batch_error() {
        let mut session = RunSession::new();
        let ticket = session.begin("r1");
        session.apply(LoadEvent::RunFetched {
            ticket: ticket.clone(),
            result: Ok((run("r1", ConditionStatus::Unknown, Some(&[("a", "pa")])), vec![])),
        });
        session.apply(LoadEvent::TaskRunsFetched {
            ticket,
            batch: Err(LoadError::ServerError("HTTP 500".into())),
        });

        assert_eq!(session.state(), LoadState::Failed);
        assert_eq!(session.error(), Some(&LoadError::ServerError("HTTP 500".into())));
        assert!(session.pipeline_run().is_some());
    }

    #[test]
    fn test_isolated_failures_reported_alongside_views() {
        let mut session = RunSession::new();
        let ticket = session.begin("r1");
        session.apply(LoadEvent::RunFetched {
            ticket: ticket.clone(),
            result: Ok((
                run("r1", ConditionStatus::Unknown, Some(&[("a", "pa"), ("b", "pb")])),
                vec![build_task()],
            )),
        });
        session.apply(LoadEvent::TaskRunsFetched {
            ticket,
            batch: Ok(vec![
                fetch("a"),
                TaskRunFetch {
                    task_run_name: "b".to_string(),
                    result: Err(LoadError::NotFound("b".into())),
                },
            ]),
        });

        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        assert_eq!(session.task_runs().len(), 1);
        assert_eq!(
            session.failures(),
            &[TaskRunFailure {
                task_run_name: "b".to_string(),
                pipeline_task_name: "pb".to_string(),
                error: "not found: b".to_string(),
            }]
        );
    }

    #[test]
    fn test_stale_events_are_discarded() {
        let mut session = RunSession::new();
        let stale = session.begin("run-a");
        let current = session.begin("run-b");

        let applied = session.apply(LoadEvent::RunFetched {
            ticket: stale.clone(),
            result: Ok((run("run-a", ConditionStatus::False, None), vec![])),
        });
        assert!(!applied);
        assert!(session.is_loading());
        assert!(session.error().is_none());
        assert!(session.pipeline_run().is_none());

        session.apply(LoadEvent::RunFetched {
            ticket: current,
            result: Ok((run("run-b", ConditionStatus::Unknown, Some(&[("b1", "pb")])), vec![])),
        });
        assert!(!session.apply(LoadEvent::TaskRunsFetched {
            ticket: stale,
            batch: Ok(vec![fetch("b1")]),
        }));
        assert!(session.task_runs().is_empty());
        assert_eq!(session.pipeline_run().map(PipelineRun::name), Some("run-b"));
    }

    #[test]
    fn test_reload_of_same_run_invalidates_previous_ticket() {
        let mut session = RunSession::new();
        let first = session.begin("r1");
        let second = session.begin("r1");
        assert!(!session.is_current(&first));
        assert!(session.is_current(&second));
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_empty_mapping_completes_without_phase_two() {
        let mut session = RunSession::new();
        let ticket = session.begin("r1");
        session.apply(LoadEvent::RunFetched {
            ticket,
            result: Ok((run("r1", ConditionStatus::False, Some(&[])), vec![])),
        });
        assert_eq!(session.state(), LoadState::Loaded(LoadedPhase::Complete));
        assert!(session.error().is_none());
    }
}
