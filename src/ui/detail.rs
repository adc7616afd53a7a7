use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::detail::DetailView;

pub fn render(frame: &mut Frame, detail: &DetailView, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;

    let visible_lines: Vec<Line> = detail
        .lines()
        .iter()
        .skip(detail.scroll())
        .take(inner_height)
        .map(|l| {
            let text: String = l.chars().skip(detail.shift()).collect();
            Line::from(Span::styled(text, line_style(l)))
        })
        .collect();

    // Clear the area first to prevent artifacts
    frame.render_widget(Clear, area);

    let body = Paragraph::new(Text::from(visible_lines)).block(
        Block::default().borders(Borders::ALL).title(Span::styled(
            format!(" PR #{} ", detail.number),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
    );

    frame.render_widget(body, area);
}

fn line_style(line: &str) -> Style {
    if line.starts_with("  ") {
        Style::default()
    } else if line == "Draft PR" {
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)
    } else if line == "Needs rebase" {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    }
}
