//! Rendering for the TUI.

mod format;
mod pipelines;
mod run_detail;
mod runs;
mod theme;

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use ratatui::Frame;

use crate::state::{UiState, View};

use theme::Theme;

/// Render the entire UI.
pub fn render(frame: &mut Frame, state: &UiState) {
    let theme = Theme::default();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, header_area, state);

    match state.current_view {
        View::Pipelines => pipelines::render_pipelines_view(frame, state, &theme, body_area),
        View::Runs => runs::render_runs_view(frame, state, &theme, body_area),
        View::Run => run_detail::render_run_view(frame, state, &theme, body_area),
    }

    render_footer(frame, footer_area, state);
}

/// Render the header with navigation tabs.
fn render_header(frame: &mut Frame, area: Rect, state: &UiState) {
    let run_tab = match state.session.run_name() {
        Some(name) => format!("[3] {}: {}", View::Run.name(), name),
        None => format!("[3] {}", View::Run.name()),
    };
    let runs_tab = match &state.pipeline {
        Some(pipeline) => format!("[2] {}: {}", View::Runs.name(), pipeline),
        None => format!("[2] {}", View::Runs.name()),
    };
    let titles = vec![format!("[1] {}", View::Pipelines.name()), runs_tab, run_tab];

    let selected = match state.current_view {
        View::Pipelines => 0,
        View::Runs => 1,
        View::Run => 2,
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" runscope ")
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

/// Render the footer with status.
fn render_footer(frame: &mut Frame, area: Rect, state: &UiState) {
    let status = state.status_message.as_deref().unwrap_or("Ready");

    let help = match state.current_view {
        View::Pipelines => " q: quit | j/k: move | Enter: show runs | r: refresh ",
        View::Runs => " q: quit | Esc: pipelines | j/k: move | Enter: open run | a: all runs | r: refresh ",
        View::Run => " q: quit | Esc: runs | j/k: move | Enter: select | r: reload ",
    };

    let footer = Line::from(vec![
        Span::styled(status, Style::default().fg(Color::Green)),
        Span::raw(" | "),
        Span::styled(help, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}
