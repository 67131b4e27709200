//! Run view: header, task tree and step detail.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use runscope_core::{LoadState, LoadedPhase, StepDetail};

use crate::event::ConnectionState;
use crate::state::UiState;

use super::format::{format_duration, format_timestamp, truncate};
use super::theme::Theme;

pub fn render_run_view(frame: &mut Frame, state: &UiState, theme: &Theme, area: Rect) {
    let [header_area, main_area] =
        Layout::vertical([Constraint::Length(4), Constraint::Fill(1)]).areas(area);
    let [tree_area, detail_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
            .areas(main_area);

    render_run_header(frame, state, theme, header_area);
    render_task_tree(frame, state, theme, tree_area);
    render_step_detail(frame, state, theme, detail_area);
}

fn render_run_header(frame: &mut Frame, state: &UiState, theme: &Theme, area: Rect) {
    let session = &state.session;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Pipeline run ")
        .border_style(theme.unfocused_border());

    let Some(run_name) = session.run_name() else {
        let text = Line::from(Span::styled(
            "  No run open. Pick one from the Runs tab.",
            theme.muted_style(),
        ));
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    };

    let lines = if let Some(error) = session.error() {
        vec![
            Line::from(vec![
                Span::styled(format!("{} ", error.summary()), theme.error_style().patch(theme.bold())),
                Span::raw(run_name.to_string()),
            ]),
            Line::from(Span::styled(error.to_string(), theme.error_style())),
        ]
    } else if session.is_loading() && session.pipeline_run().is_none() {
        vec![Line::from(Span::styled(
            format!("  Loading {}...", run_name),
            theme.muted_style(),
        ))]
    } else {
        let summary = session.run_status();
        let pipeline = session
            .pipeline_run()
            .and_then(|run| run.pipeline_name())
            .unwrap_or("-");
        let mut first = vec![
            Span::styled(pipeline.to_string(), theme.bold()),
            Span::raw(" / "),
            Span::raw(run_name.to_string()),
            Span::raw("  "),
            Span::styled(summary.phase().label(), theme.phase_style(summary.phase())),
        ];
        if let Some(reason) = &summary.reason {
            first.push(Span::raw(format!("  {}", reason)));
        }
        if task_runs_pending(state) {
            first.push(Span::styled("  (loading task runs)", theme.muted_style()));
        }
        vec![
            Line::from(first),
            Line::from(Span::styled(
                format!(
                    "Last transition: {}",
                    format_timestamp(summary.last_transition_time)
                ),
                theme.muted_style(),
            )),
        ]
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// The run is in but its task runs are still being fetched.
fn task_runs_pending(state: &UiState) -> bool {
    state.session.state() == LoadState::Loaded(LoadedPhase::TaskRunsPending)
}

fn render_task_tree(frame: &mut Frame, state: &UiState, theme: &Theme, area: Rect) {
    let session = &state.session;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Task runs ")
        .border_style(theme.focused_border());

    let task_runs = session.task_runs();
    if task_runs.is_empty() {
        let message = match session.state() {
            LoadState::Loading | LoadState::Loaded(LoadedPhase::TaskRunsPending) => {
                match state.connection_state {
                    ConnectionState::Unreachable => "  Dashboard unreachable",
                    _ => "  Loading task runs...",
                }
            }
            LoadState::Failed => "  Load failed",
            _ => "  No task runs",
        };
        let mut lines = vec![Line::from(Span::styled(message, theme.muted_style()))];
        lines.extend(failure_lines(state, theme));
        frame.render_widget(Paragraph::new(lines).block(block), area);
        return;
    }

    let selection = session.selection();
    let width = area.width.saturating_sub(8) as usize;
    let mut items: Vec<ListItem> = Vec::new();
    for row in state.tree_rows() {
        let task_run = &task_runs[row.task_index];
        let item = match row.step_index {
            None => {
                let label = format!(
                    "{} ({})",
                    task_run.pipeline_task_name, task_run.task_run_name
                );
                ListItem::new(Line::from(vec![
                    Span::styled("● ", theme.condition_style(task_run.succeeded)),
                    Span::styled(truncate(&label, width), theme.bold()),
                ]))
            }
            Some(step_index) => {
                let step = &task_run.steps[step_index];
                let selected = selection.selected_task_id.as_ref() == Some(&task_run.id)
                    && selection.selected_step_id.as_ref() == Some(&step.id);
                let marker = if selected { "  ▸ " } else { "    " };
                let style = theme.step_style(step.status, step.reason.as_deref());
                let phase = step
                    .status
                    .map(|phase| phase.to_string())
                    .unwrap_or_else(|| "-".to_string());
                ListItem::new(Line::from(vec![
                    Span::raw(marker),
                    Span::styled(truncate(&step.step_name, width.saturating_sub(12)), style),
                    Span::styled(format!(" {}", phase), theme.muted_style()),
                ]))
            }
        };
        items.push(item);
    }
    for line in failure_lines(state, theme) {
        items.push(ListItem::new(line));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.highlight());
    let mut list_state = ListState::default().with_selected(Some(state.tree_cursor));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn failure_lines<'a>(state: &'a UiState, theme: &Theme) -> Vec<Line<'a>> {
    state
        .session
        .failures()
        .iter()
        .map(|failure| {
            Line::from(Span::styled(
                format!(
                    "✗ {} ({}): {}",
                    failure.pipeline_task_name, failure.task_run_name, failure.error
                ),
                theme.error_style(),
            ))
        })
        .collect()
}

fn render_step_detail(frame: &mut Frame, state: &UiState, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Step ")
        .border_style(theme.unfocused_border());

    let Some(detail) = state.session.step_detail() else {
        let text = Line::from(Span::styled(
            "  Select a step to view details",
            theme.muted_style(),
        ));
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    };

    let paragraph = Paragraph::new(detail_lines(state, &detail, theme))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn detail_lines<'a>(state: &UiState, detail: &StepDetail<'a>, theme: &Theme) -> Vec<Line<'a>> {
    let label = |text: &'static str| Span::styled(format!("{:<10}", text), theme.bold());
    let status = detail
        .status
        .map(|phase| phase.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let duration = state
        .session
        .selection()
        .selected_step_id
        .as_ref()
        .and_then(|id| detail.task_run.step(id))
        .and_then(|step| step.duration())
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        Line::from(vec![label("Step"), Span::raw(detail.step_name.to_string())]),
        Line::from(vec![
            label("Status"),
            Span::styled(status, theme.step_style(detail.status, detail.reason)),
        ]),
        Line::from(vec![
            label("Reason"),
            Span::raw(detail.reason.unwrap_or("-").to_string()),
        ]),
        Line::from(vec![label("Duration"), Span::raw(duration)]),
        Line::from(vec![
            label("TaskRun"),
            Span::raw(detail.task_run.task_run_name.clone()),
        ]),
        Line::from(vec![
            label("Pod"),
            Span::raw(detail.task_run.pod.clone().unwrap_or_else(|| "-".to_string())),
        ]),
        Line::from(vec![
            label("Image"),
            Span::raw(detail.definition.image().unwrap_or("-").to_string()),
        ]),
        Line::from(""),
        Line::from(Span::styled("Definition", theme.bold())),
    ];
    lines.extend(json_lines(serde_json::to_string_pretty(detail.definition), Style::default()));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Status", theme.bold())));
    match detail.step_status {
        Some(step_status) => lines.extend(json_lines(
            serde_json::to_string_pretty(step_status),
            theme.muted_style(),
        )),
        None => lines.push(Line::from(Span::styled(
            "No status reported",
            theme.muted_style(),
        ))),
    }
    lines
}

fn json_lines(rendered: serde_json::Result<String>, style: Style) -> Vec<Line<'static>> {
    match rendered {
        Ok(text) => text
            .lines()
            .map(|line| Line::from(Span::styled(line.to_string(), style)))
            .collect(),
        Err(e) => vec![Line::from(Span::raw(format!("<unrenderable: {}>", e)))],
    }
}
