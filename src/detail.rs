use crate::types::{PrSummary, VerdictCategory};
use crate::view::PageDirection;

/// Read-only, scrollable text view over one PR's full review state.
/// Scroll state is independent of the table's cursor.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub number: u64,
    pub url: String,
    lines: Vec<String>,
    scroll: usize,
    shift: usize,
}

impl DetailView {
    pub fn new(pr: &PrSummary) -> Self {
        Self {
            number: pr.number,
            url: pr.url.clone(),
            lines: describe(pr),
            scroll: 0,
            shift: 0,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn shift(&self) -> usize {
        self.shift
    }

    pub fn scroll_by(&mut self, delta: isize, height: usize) {
        let max = self.max_scroll(height) as isize;
        self.scroll = (self.scroll as isize + delta).clamp(0, max) as usize;
    }

    pub fn page(&mut self, direction: PageDirection, height: usize) {
        let step = height.max(1) as isize;
        match direction {
            PageDirection::Down => self.scroll_by(step, height),
            PageDirection::Up => self.scroll_by(-step, height),
        }
    }

    pub fn to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn to_bottom(&mut self, height: usize) {
        self.scroll = self.max_scroll(height);
    }

    pub fn shift_by(&mut self, delta: isize, width: usize) {
        let widest = self.lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let max = widest.saturating_sub(width) as isize;
        self.shift = (self.shift as isize + delta).clamp(0, max) as usize;
    }

    fn max_scroll(&self, height: usize) -> usize {
        self.lines.len().saturating_sub(height)
    }
}

fn describe(pr: &PrSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if pr.draft {
        lines.push("Draft PR".to_string());
    }
    if pr.needs_rebase {
        lines.push("Needs rebase".to_string());
    }
    lines.push(format!("Number: {}", pr.number));
    lines.push(format!("Title: {}", pr.title));
    lines.push(format!("Author: {}", pr.author));
    lines.push(format!("Labels: {}", pr.labels.join(", ")));
    lines.push(format!("Assignees: {}", pr.assignees.join(", ")));
    lines.push(format!(
        "Head: {}",
        pr.head_commit.as_deref().unwrap_or("unknown")
    ));
    if pr.ready_for_merge {
        lines.push("Ready for merge".to_string());
    }

    for category in VerdictCategory::ALL {
        lines.push(format!("{}: {}", category, pr.count(category)));
        for entry in pr.entries(category) {
            lines.push(format!("  {}: {}", entry.author, entry.excerpt));
        }
    }
    lines
}
