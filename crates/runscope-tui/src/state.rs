//! UI state for rendering.

use chrono::{DateTime, Utc};

use runscope_core::{classify, Pipeline, PipelineRun, RunPhase, RunSession};

use crate::event::ConnectionState;

/// Available views in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Pick a pipeline.
    #[default]
    Pipelines,
    /// Pick a pipeline run.
    Runs,
    /// Task tree and step detail of the open run.
    Run,
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Pipelines => "Pipelines",
            View::Runs => "Runs",
            View::Run => "Run",
        }
    }
}

/// One row of the pipeline list.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineListing {
    pub name: String,
    pub tasks: usize,
    pub created_at: Option<DateTime<Utc>>,
}

impl PipelineListing {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            name: pipeline.name().to_string(),
            tasks: pipeline.spec.tasks.len(),
            created_at: pipeline.metadata.creation_timestamp,
        }
    }
}

/// One row of the run picker.
#[derive(Debug, Clone, PartialEq)]
pub struct RunListing {
    pub name: String,
    pub pipeline: Option<String>,
    pub phase: RunPhase,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RunListing {
    pub fn from_run(run: &PipelineRun) -> Self {
        let summary = classify(run);
        Self {
            name: run.name().to_string(),
            pipeline: run.pipeline_name().map(str::to_owned),
            phase: summary.phase(),
            reason: summary.reason,
            created_at: run.metadata.creation_timestamp,
        }
    }
}

/// A row of the task tree: a task run, or one of its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow {
    pub task_index: usize,
    pub step_index: Option<usize>,
}

/// Everything the renderer needs (no async, no locks).
#[derive(Default)]
pub struct UiState {
    /// The observed run and its derived views.
    pub session: RunSession,

    /// Current view/tab.
    pub current_view: View,

    /// Pipelines in the namespace, by name.
    pub pipelines: Vec<PipelineListing>,
    pub selected_pipeline_index: usize,

    /// Run picker entries, newest first.
    pub runs: Vec<RunListing>,
    pub selected_run_index: usize,

    /// Cursor into [`UiState::tree_rows`].
    pub tree_cursor: usize,

    pub namespace: String,
    /// Pipeline the run picker is filtered to.
    pub pipeline: Option<String>,

    /// Status message to display in footer.
    pub status_message: Option<String>,

    pub connection_state: ConnectionState,

    /// Last error not tied to the run load (if any).
    pub last_error: Option<String>,
}

impl UiState {
    /// Flattened task tree: each task run followed by its steps.
    pub fn tree_rows(&self) -> Vec<TreeRow> {
        self.session
            .task_runs()
            .iter()
            .enumerate()
            .flat_map(|(task_index, task_run)| {
                std::iter::once(TreeRow {
                    task_index,
                    step_index: None,
                })
                .chain((0..task_run.steps.len()).map(move |step_index| TreeRow {
                    task_index,
                    step_index: Some(step_index),
                }))
            })
            .collect()
    }

    pub fn selected_row(&self) -> Option<TreeRow> {
        self.tree_rows().get(self.tree_cursor).copied()
    }

    pub fn select_next_row(&mut self) {
        let len = self.tree_rows().len();
        if len > 0 {
            self.tree_cursor = (self.tree_cursor + 1).min(len - 1);
        }
    }

    pub fn select_prev_row(&mut self) {
        self.tree_cursor = self.tree_cursor.saturating_sub(1);
    }

    pub fn selected_run(&self) -> Option<&RunListing> {
        self.runs.get(self.selected_run_index)
    }

    pub fn select_next_run(&mut self) {
        if !self.runs.is_empty() {
            self.selected_run_index = (self.selected_run_index + 1).min(self.runs.len() - 1);
        }
    }

    pub fn select_prev_run(&mut self) {
        self.selected_run_index = self.selected_run_index.saturating_sub(1);
    }

    pub fn selected_pipeline(&self) -> Option<&PipelineListing> {
        self.pipelines.get(self.selected_pipeline_index)
    }

    pub fn select_next_pipeline(&mut self) {
        if !self.pipelines.is_empty() {
            self.selected_pipeline_index =
                (self.selected_pipeline_index + 1).min(self.pipelines.len() - 1);
        }
    }

    pub fn select_prev_pipeline(&mut self) {
        self.selected_pipeline_index = self.selected_pipeline_index.saturating_sub(1);
    }

    /// Replace the pipeline list, keeping the cursor in range.
    pub fn set_pipelines(&mut self, pipelines: Vec<PipelineListing>) {
        self.pipelines = pipelines;
        if self.selected_pipeline_index >= self.pipelines.len() {
            self.selected_pipeline_index = self.pipelines.len().saturating_sub(1);
        }
    }

    /// Filter the run picker to `pipeline` (or show all runs).
    ///
    /// The current entries belong to the previous filter and are dropped.
    pub fn filter_runs(&mut self, pipeline: Option<String>) {
        self.pipeline = pipeline;
        self.runs.clear();
        self.selected_run_index = 0;
    }

    /// Replace the run picker entries if they match the current filter.
    ///
    /// Returns false for a listing requested under a different filter.
    pub fn apply_runs(&mut self, pipeline: Option<&str>, runs: Vec<RunListing>) -> bool {
        if pipeline != self.pipeline.as_deref() {
            return false;
        }
        self.set_runs(runs);
        true
    }

    /// Replace the run picker entries, keeping the cursor in range.
    pub fn set_runs(&mut self, runs: Vec<RunListing>) {
        self.runs = runs;
        if self.selected_run_index >= self.runs.len() {
            self.selected_run_index = self.runs.len().saturating_sub(1);
        }
    }
}
