//! Application state and main event loop.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{BackendCommand, ConnectionState, UiEvent};
use crate::state::{UiState, View};
use crate::ui;

/// Main application with UI state and channel handles.
pub struct App {
    /// Current UI state snapshot for rendering.
    state: UiState,

    /// Receiver for events from the backend.
    ui_rx: mpsc::Receiver<UiEvent>,

    /// Sender for commands to the backend.
    cmd_tx: mpsc::Sender<BackendCommand>,
}

impl App {
    /// Create a new application instance with channel handles.
    pub fn new(
        ui_rx: mpsc::Receiver<UiEvent>,
        cmd_tx: mpsc::Sender<BackendCommand>,
        namespace: &str,
        pipeline: Option<String>,
    ) -> Self {
        // A pipeline given up front skips straight to its runs
        let current_view = if pipeline.is_some() {
            View::Runs
        } else {
            View::Pipelines
        };
        let state = UiState {
            namespace: namespace.to_string(),
            pipeline,
            current_view,
            ..Default::default()
        };
        Self {
            state,
            ui_rx,
            cmd_tx,
        }
    }

    /// Observe `run_name`, discarding whatever was loaded before.
    pub fn open_run(&mut self, run_name: String) {
        let ticket = self.state.session.begin(run_name);
        debug!(run = %ticket.run_name(), generation = ticket.generation(), "Opening run");
        self.state.tree_cursor = 0;
        self.state.current_view = View::Run;
        let _ = self.cmd_tx.blocking_send(BackendCommand::Load(ticket));
        self.update_status();
    }

    /// Run the main event loop.
    ///
    /// This runs on the main thread and handles:
    /// - Drawing the UI
    /// - Processing keyboard input
    /// - Receiving updates from the backend
    pub fn run(&mut self, mut terminal: DefaultTerminal) -> std::io::Result<()> {
        loop {
            terminal.draw(|frame| ui::render(frame, &self.state))?;

            // Poll terminal events (non-blocking with short timeout)
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code) {
                        break;
                    }
                }
            }

            // Process backend events (non-blocking)
            while let Ok(event) = self.ui_rx.try_recv() {
                self.apply_event(event);
            }
        }

        let _ = self.cmd_tx.blocking_send(BackendCommand::Quit);

        Ok(())
    }

    /// Apply an event from the backend to the UI state.
    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Load(load) => {
                let run = load.ticket().run_name().to_string();
                if !self.state.session.apply(load) {
                    debug!(run = %run, "Dropped result of superseded load");
                }
            }
            UiEvent::PipelinesListed(pipelines) => {
                self.state.set_pipelines(pipelines);
                self.state.last_error = None;
            }
            UiEvent::RunsListed { pipeline, runs } => {
                if self.state.apply_runs(pipeline.as_deref(), runs) {
                    self.state.last_error = None;
                } else {
                    debug!(pipeline = ?pipeline, "Dropped run listing for a previous filter");
                }
            }
            UiEvent::Error(msg) => {
                self.state.last_error = Some(msg);
            }
            UiEvent::ConnectionStateChanged(new_state) => {
                self.state.connection_state = new_state;
            }
        }
        self.update_status();
    }

    /// Update the status message based on current state.
    fn update_status(&mut self) {
        let state = &self.state;
        let message = match state.connection_state {
            ConnectionState::Connecting => "Connecting...".to_string(),
            ConnectionState::Unreachable => "Dashboard unreachable".to_string(),
            ConnectionState::Connected => match &state.last_error {
                Some(error) => format!("Connected (error: {})", error),
                None => format!(
                    "Connected | {} | Pipelines: {} | Runs: {} | Task runs: {}",
                    state.namespace,
                    state.pipelines.len(),
                    state.runs.len(),
                    state.session.task_runs().len()
                ),
            },
        };
        self.state.status_message = Some(message);
    }

    /// Handle a key press.
    ///
    /// Returns true if the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') => return true,

            // Escape - step back one level, quit from the top
            KeyCode::Esc => match self.state.current_view {
                View::Run => self.state.current_view = View::Runs,
                View::Runs => self.state.current_view = View::Pipelines,
                View::Pipelines => return true,
            },

            // View switching
            KeyCode::Char('1') => self.state.current_view = View::Pipelines,
            KeyCode::Char('2') => self.state.current_view = View::Runs,
            KeyCode::Char('3') => {
                if self.state.session.run_name().is_some() {
                    self.state.current_view = View::Run;
                }
            }
            KeyCode::Tab => {
                self.state.current_view = match self.state.current_view {
                    View::Pipelines => View::Runs,
                    View::Runs if self.state.session.run_name().is_some() => View::Run,
                    _ => View::Pipelines,
                };
            }

            // Up/Down or j/k navigation
            KeyCode::Up | KeyCode::Char('k') => match self.state.current_view {
                View::Pipelines => self.state.select_prev_pipeline(),
                View::Runs => self.state.select_prev_run(),
                View::Run => self.state.select_prev_row(),
            },
            KeyCode::Down | KeyCode::Char('j') => match self.state.current_view {
                View::Pipelines => self.state.select_next_pipeline(),
                View::Runs => self.state.select_next_run(),
                View::Run => self.state.select_next_row(),
            },

            // Enter - drill down into a pipeline or run, or select a task run / step
            KeyCode::Enter => match self.state.current_view {
                View::Pipelines => {
                    if let Some(pipeline) = self.state.selected_pipeline() {
                        let name = pipeline.name.clone();
                        self.show_runs(Some(name));
                    }
                }
                View::Runs => {
                    if let Some(run) = self.state.selected_run() {
                        let name = run.name.clone();
                        self.open_run(name);
                    }
                }
                View::Run => self.select_current_row(),
            },

            // All runs, regardless of pipeline
            KeyCode::Char('a') if self.state.current_view == View::Runs => self.show_runs(None),

            // Refresh
            KeyCode::Char('r') => match self.state.current_view {
                View::Pipelines => {
                    let _ = self.cmd_tx.blocking_send(BackendCommand::ListPipelines);
                }
                View::Runs => {
                    let pipeline = self.state.pipeline.clone();
                    let _ = self.cmd_tx.blocking_send(BackendCommand::ListRuns(pipeline));
                }
                View::Run => {
                    if let Some(name) = self.state.session.run_name().map(str::to_owned) {
                        self.open_run(name);
                    }
                }
            },

            _ => {}
        }
        false
    }

    /// Switch the run picker to `pipeline` and fetch its runs.
    fn show_runs(&mut self, pipeline: Option<String>) {
        debug!(pipeline = ?pipeline, "Listing runs");
        self.state.filter_runs(pipeline.clone());
        self.state.current_view = View::Runs;
        let _ = self.cmd_tx.blocking_send(BackendCommand::ListRuns(pipeline));
        self.update_status();
    }

    fn select_current_row(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        let Some(task_run) = self.state.session.task_runs().get(row.task_index) else {
            return;
        };
        let task_id = task_run.id.clone();
        let step_id = row
            .step_index
            .and_then(|i| task_run.steps.get(i))
            .map(|step| step.id.clone());
        self.state.session.select(task_id, step_id);
    }
}
