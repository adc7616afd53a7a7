use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;

use crate::app::App;
use crate::types::{PrSummary, VerdictCategory};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let projection = app.view.project();
    let state = app.view.state();

    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        format!(
            " Pull Requests ({}/{}) ",
            projection.len(),
            app.view.dataset().len()
        ),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ));

    if projection.is_empty() {
        let message = if app.loading {
            "Loading pull requests..."
        } else if app.view.dataset().is_empty() {
            "No open pull requests"
        } else {
            "No pull requests match the active filters (:c to clear)"
        };
        let empty = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    }

    let header_cells = [
        ("PR", None),
        ("Title", None),
        ("Author", None),
        ("Assignees", None),
        ("RFM", None),
        ("Labels", None),
        ("ACKs", Some(VerdictCategory::Ack)),
        ("Stale", Some(VerdictCategory::StaleAck)),
        ("NACKs", Some(VerdictCategory::Nack)),
        ("Concept", Some(VerdictCategory::ConceptAck)),
    ]
    .into_iter()
    .map(|(title, category)| {
        let style = if category == Some(state.sort_key) {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        Cell::from(title).style(style)
    });
    let header = Row::new(header_cells);

    let rows: Vec<Row> = projection
        .iter()
        .enumerate()
        .skip(state.page_top)
        .take(app.view.viewport())
        .map(|(i, pr)| {
            let style = if i == state.cursor {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                row_style(pr)
            };
            Row::new(row_cells(pr)).style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Fill(3),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(3),
        Constraint::Length(16),
        Constraint::Fill(2),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn row_style(pr: &PrSummary) -> Style {
    if pr.draft {
        Style::default().fg(Color::Blue)
    } else if pr.needs_rebase {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn row_cells(pr: &PrSummary) -> Vec<Cell<'static>> {
    let mut cells = vec![
        Cell::from(pr.number.to_string()),
        Cell::from(pr.title.clone()),
        Cell::from(pr.author.clone()),
        Cell::from(pr.assignees.join(", ")),
        Cell::from(if pr.ready_for_merge { "yes" } else { "" }),
        Cell::from(pr.labels.join(", ")),
    ];
    cells.extend(
        VerdictCategory::ALL
            .into_iter()
            .map(|category| Cell::from(verdict_cell(pr, category))),
    );
    cells
}

/// `(n) alice, bob`, or an empty cell when nobody reviewed in this category.
fn verdict_cell(pr: &PrSummary, category: VerdictCategory) -> String {
    match pr.count(category) {
        0 => String::new(),
        n => format!("({}) {}", n, pr.reviewers(category)),
    }
}
