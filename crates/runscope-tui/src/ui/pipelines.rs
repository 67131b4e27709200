//! Pipeline list view.

use ratatui::layout::{Constraint, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::state::UiState;

use super::format::{format_timestamp, truncate};
use super::theme::Theme;

pub fn render_pipelines_view(frame: &mut Frame, state: &UiState, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Pipelines ({}) ", state.namespace))
        .border_style(theme.focused_border());

    if state.pipelines.is_empty() {
        let text = match &state.last_error {
            Some(error) => Line::from(Span::styled(format!("  {}", error), theme.error_style())),
            None => Line::from(Span::styled("  No pipelines found.", theme.muted_style())),
        };
        frame.render_widget(Paragraph::new(vec![Line::from(""), text]).block(block), area);
        return;
    }

    let header = Row::new(vec!["NAME", "TASKS", "CREATED"]).style(theme.bold());

    let rows: Vec<Row> = state
        .pipelines
        .iter()
        .map(|pipeline| {
            Row::new(vec![
                Cell::from(truncate(&pipeline.name, 60)),
                Cell::from(pipeline.tasks.to_string()),
                Cell::from(format_timestamp(pipeline.created_at)).style(theme.muted_style()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Fill(1),
            Constraint::Length(6),
            Constraint::Length(19),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(theme.highlight());

    let mut table_state = TableState::default().with_selected(Some(state.selected_pipeline_index));
    frame.render_stateful_widget(table, area, &mut table_state);
}
