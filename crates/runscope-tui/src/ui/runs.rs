//! Run picker view.

use ratatui::layout::{Constraint, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::state::UiState;

use super::format::{format_timestamp, truncate};
use super::theme::Theme;

pub fn render_runs_view(frame: &mut Frame, state: &UiState, theme: &Theme, area: Rect) {
    let title = match &state.pipeline {
        Some(pipeline) => format!(" Pipeline runs: {} ({}) ", pipeline, state.namespace),
        None => format!(" Pipeline runs ({}) ", state.namespace),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(theme.focused_border());

    if state.runs.is_empty() {
        let text = match &state.last_error {
            Some(error) => Line::from(Span::styled(format!("  {}", error), theme.error_style())),
            None => Line::from(Span::styled("  No pipeline runs found.", theme.muted_style())),
        };
        frame.render_widget(Paragraph::new(vec![Line::from(""), text]).block(block), area);
        return;
    }

    let header = Row::new(vec!["NAME", "PIPELINE", "STATUS", "REASON", "CREATED"]).style(theme.bold());

    let rows: Vec<Row> = state
        .runs
        .iter()
        .map(|run| {
            Row::new(vec![
                Cell::from(truncate(&run.name, 40)),
                Cell::from(run.pipeline.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(run.phase.label()).style(theme.phase_style(run.phase)),
                Cell::from(run.reason.clone().unwrap_or_default()),
                Cell::from(format_timestamp(run.created_at)).style(theme.muted_style()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Fill(2),
            Constraint::Fill(1),
            Constraint::Length(10),
            Constraint::Fill(1),
            Constraint::Length(19),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(theme.highlight());

    let mut table_state = TableState::default().with_selected(Some(state.selected_run_index));
    frame.render_stateful_widget(table, area, &mut table_state);
}
