mod board;
mod detail;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;

/// Rows taken by the header and status bars.
const CHROME_ROWS: u16 = 2;

/// Table rows visible for a terminal of `height` rows: the body minus
/// the table's borders and its header row.
pub fn table_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_ROWS + 3).max(1) as usize
}

/// Text rows visible inside the bordered detail pane.
pub fn detail_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_ROWS + 2).max(1) as usize
}

pub fn detail_cols(width: u16) -> usize {
    width.saturating_sub(2).max(1) as usize
}

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match &app.detail {
        Some(detail) => detail::render(frame, detail, chunks[1]),
        None => board::render(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.view.state();
    let mut spans = vec![
        Span::styled(
            format!("ackboard - {}/{}", app.owner, app.repo),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  sort: {}", state.sort_key)),
    ];

    let filters = state.filter_patterns();
    if !filters.is_empty() {
        let rendered: Vec<String> = filters
            .iter()
            .map(|(column, pattern)| format!("{}={}", column.key(), pattern))
            .collect();
        spans.push(Span::styled(
            format!("  filters: {}", rendered.join(" ")),
            Style::default().fg(Color::Yellow),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(error) = &app.error {
        Line::from(vec![Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )])
    } else if app.commands.is_active() {
        Line::from(vec![Span::styled(
            app.commands.buffer().to_string(),
            Style::default().fg(Color::White),
        )])
    } else if app.loading {
        Line::from(vec![Span::styled(
            "Loading...",
            Style::default().fg(Color::Yellow),
        )])
    } else {
        let help = if app.detail.is_some() {
            "j/k/g/G: scroll | h/l: shift | PgUp/PgDn: page | b: browser | q: back"
        } else {
            "j/k/g/G: nav | PgUp/PgDn: page | d: detail | b: browser | :s[asnc] sort | :f[ptolasnc]/re filter | :c clear | :r refresh | :q quit"
        };
        Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}
