use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::dataset::Dataset;
use crate::error::{AckError, Result};
use crate::types::{PrSummary, VerdictCategory};

/// Table columns a filter can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Number,
    Title,
    Author,
    Labels,
    Ack,
    Stale,
    Nack,
    Concept,
}

impl Column {
    /// Map the single-letter column selector used in `:f<col>/...`.
    pub fn from_key(c: char) -> Option<Self> {
        match c {
            'p' => Some(Column::Number),
            't' => Some(Column::Title),
            'o' => Some(Column::Author),
            'l' => Some(Column::Labels),
            'a' => Some(Column::Ack),
            's' => Some(Column::Stale),
            'n' => Some(Column::Nack),
            'c' => Some(Column::Concept),
            _ => None,
        }
    }

    pub fn key(self) -> char {
        match self {
            Column::Number => 'p',
            Column::Title => 't',
            Column::Author => 'o',
            Column::Labels => 'l',
            Column::Ack => 'a',
            Column::Stale => 's',
            Column::Nack => 'n',
            Column::Concept => 'c',
        }
    }

    pub fn verdict(self) -> Option<VerdictCategory> {
        match self {
            Column::Ack => Some(VerdictCategory::Ack),
            Column::Stale => Some(VerdictCategory::StaleAck),
            Column::Nack => Some(VerdictCategory::Nack),
            Column::Concept => Some(VerdictCategory::ConceptAck),
            _ => None,
        }
    }

    fn matches(self, pr: &PrSummary, re: &Regex) -> bool {
        match self {
            Column::Number => re.is_match(&pr.number.to_string()),
            Column::Title => re.is_match(&pr.title),
            Column::Author => re.is_match(&pr.author),
            Column::Labels => pr.labels.iter().any(|l| re.is_match(l)),
            Column::Ack | Column::Stale | Column::Nack | Column::Concept => {
                let Some(category) = self.verdict() else {
                    return false;
                };
                pr.entries(category)
                    .iter()
                    .any(|e| re.is_match(&e.author) || re.is_match(&e.excerpt))
            }
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Number => write!(f, "PR"),
            Column::Title => write!(f, "Title"),
            Column::Author => write!(f, "Author"),
            Column::Labels => write!(f, "Labels"),
            Column::Ack => write!(f, "ACKs"),
            Column::Stale => write!(f, "Stale"),
            Column::Nack => write!(f, "NACKs"),
            Column::Concept => write!(f, "Concept"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub sort_key: VerdictCategory,
    pub filters: BTreeMap<Column, Regex>,
    pub cursor: usize,
    pub page_top: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sort_key: VerdictCategory::Ack,
            filters: BTreeMap::new(),
            cursor: 0,
            page_top: 0,
        }
    }
}

impl ViewState {
    /// Active filters as `(column, source pattern)`, in column order.
    pub fn filter_patterns(&self) -> Vec<(Column, &str)> {
        self.filters.iter().map(|(c, re)| (*c, re.as_str())).collect()
    }
}

/// Sorted, filtered rows over one dataset snapshot.
#[derive(Debug, Clone)]
pub struct Projection {
    snapshot: Arc<[PrSummary]>,
    rows: Vec<usize>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PrSummary> {
        self.rows.get(index).map(|&i| &self.snapshot[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrSummary> + '_ {
        self.rows.iter().map(|&i| &self.snapshot[i])
    }

    #[cfg(test)]
    pub fn numbers(&self) -> Vec<u64> {
        self.iter().map(|pr| pr.number).collect()
    }
}

/// Owns the dataset and the view state, and derives what the table shows.
///
/// The projection is recomputed on every call; PR counts are small enough
/// that there is nothing worth caching.
#[derive(Debug)]
pub struct ViewEngine {
    dataset: Dataset,
    state: ViewState,
    viewport: usize,
}

impl ViewEngine {
    pub fn new(dataset: Dataset, viewport: usize) -> Self {
        Self {
            dataset,
            state: ViewState::default(),
            viewport: viewport.max(1),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    /// Swap in refreshed data, keeping sort, filters and a clamped cursor.
    pub fn replace_dataset(&mut self, summaries: Vec<PrSummary>) {
        self.dataset.replace(summaries);
        self.clamp();
    }

    pub fn project(&self) -> Projection {
        let snapshot = self.dataset.all();
        let mut rows: Vec<usize> = snapshot
            .iter()
            .enumerate()
            .filter(|(_, pr)| {
                self.state
                    .filters
                    .iter()
                    .all(|(column, re)| column.matches(pr, re))
            })
            .map(|(i, _)| i)
            .collect();

        let key = self.state.sort_key;
        rows.sort_by(|&a, &b| {
            let (a, b) = (&snapshot[a], &snapshot[b]);
            b.count(key)
                .cmp(&a.count(key))
                .then_with(|| a.number.cmp(&b.number))
        });

        Projection { snapshot, rows }
    }

    pub fn selected(&self) -> Option<PrSummary> {
        self.project().get(self.state.cursor).cloned()
    }

    pub fn set_sort(&mut self, key: VerdictCategory) {
        self.state.sort_key = key;
        self.clamp();
    }

    /// Compile `pattern` (case-insensitive) and install it for `column`.
    /// A pattern that fails to compile leaves the existing filters untouched.
    pub fn set_filter(&mut self, column: Column, pattern: &str) -> Result<()> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| {
                tracing::warn!(%column, pattern, "rejected filter pattern");
                AckError::MalformedFilterPattern {
                    pattern: pattern.to_string(),
                    source,
                }
            })?;

        self.state.filters.insert(column, re);
        self.reset_position();
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.state.filters.clear();
        self.reset_position();
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.project().len();
        if len == 0 {
            self.reset_position();
            return;
        }
        let last = (len - 1) as isize;
        self.state.cursor = (self.state.cursor as isize + delta).clamp(0, last) as usize;
        self.scroll_to_cursor(len);
    }

    pub fn page_move(&mut self, direction: PageDirection) {
        let len = self.project().len();
        if len == 0 {
            self.reset_position();
            return;
        }
        let height = self.viewport;
        let max_top = len.saturating_sub(height);
        match direction {
            PageDirection::Down => {
                self.state.page_top = (self.state.page_top + height).min(max_top);
                self.state.cursor = (self.state.cursor + height).min(len - 1);
            }
            PageDirection::Up => {
                self.state.page_top = self.state.page_top.saturating_sub(height);
                self.state.cursor = self.state.cursor.saturating_sub(height);
            }
        }
        self.scroll_to_cursor(len);
    }

    pub fn jump_to_first(&mut self) {
        self.reset_position();
    }

    pub fn jump_to_last(&mut self) {
        let len = self.project().len();
        self.state.cursor = len.saturating_sub(1);
        self.scroll_to_cursor(len);
    }

    pub fn set_viewport(&mut self, rows: usize) {
        self.viewport = rows.max(1);
        self.clamp();
    }

    fn reset_position(&mut self) {
        self.state.cursor = 0;
        self.state.page_top = 0;
    }

    fn clamp(&mut self) {
        let len = self.project().len();
        if len == 0 {
            self.reset_position();
            return;
        }
        self.state.cursor = self.state.cursor.min(len - 1);
        self.scroll_to_cursor(len);
    }

    /// Keep `page_top` within bounds and the cursor inside the viewport.
    fn scroll_to_cursor(&mut self, len: usize) {
        let height = self.viewport;
        let max_top = len.saturating_sub(height);
        let cursor = self.state.cursor;
        let mut top = self.state.page_top.min(max_top);
        if cursor < top {
            top = cursor;
        } else if cursor >= top + height {
            top = cursor + 1 - height;
        }
        self.state.page_top = top;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrMetadata, ReviewEntry};

    fn pr(number: u64, author: &str, acks: usize, nacks: usize) -> PrSummary {
        let mut s = PrSummary::from_meta(PrMetadata {
            number,
            title: format!("PR number {}", number),
            author: author.to_string(),
            labels: vec!["Tests".to_string()],
            ..Default::default()
        });
        for i in 0..acks {
            s.push_entry(
                VerdictCategory::Ack,
                ReviewEntry {
                    author: format!("acker{}", i),
                    excerpt: "ACK".to_string(),
                },
            );
        }
        for i in 0..nacks {
            s.push_entry(
                VerdictCategory::Nack,
                ReviewEntry {
                    author: format!("nacker{}", i),
                    excerpt: "NACK".to_string(),
                },
            );
        }
        s
    }

    fn engine(prs: Vec<PrSummary>, viewport: usize) -> ViewEngine {
        ViewEngine::new(Dataset::new(prs), viewport)
    }

    fn many(n: u64) -> Vec<PrSummary> {
        (1..=n).map(|i| pr(i, "someone", 0, 0)).collect()
    }

    #[test]
    fn sort_by_ack_count() {
        let mut view = engine(vec![pr(10, "a", 3, 0), pr(20, "b", 1, 2)], 10);
        view.set_sort(VerdictCategory::Ack);
        assert_eq!(view.project().numbers(), vec![10, 20]);

        view.set_sort(VerdictCategory::Nack);
        assert_eq!(view.project().numbers(), vec![20, 10]);
    }

    #[test]
    fn ties_broken_by_number_ascending() {
        let view = engine(vec![pr(30, "a", 1, 0), pr(5, "b", 1, 0), pr(12, "c", 2, 0)], 10);
        assert_eq!(view.project().numbers(), vec![12, 5, 30]);
    }

    #[test]
    fn project_is_idempotent() {
        let view = engine(vec![pr(1, "a", 1, 1), pr(2, "b", 1, 1), pr(3, "c", 0, 0)], 10);
        assert_eq!(view.project().numbers(), view.project().numbers());
    }

    #[test]
    fn filter_by_author_and_clear() {
        let mut view = engine(
            vec![pr(1, "achow101", 0, 0), pr(2, "fanquake", 2, 0), pr(3, "achow101", 1, 0)],
            10,
        );
        let unfiltered = view.project().numbers();

        view.set_filter(Column::Author, "achow101").unwrap();
        let projection = view.project();
        assert!(projection.iter().all(|p| p.author == "achow101"));
        assert_eq!(projection.numbers(), vec![3, 1]);

        view.clear_filters();
        assert_eq!(view.project().numbers(), unfiltered);
    }

    #[test]
    fn filters_are_case_insensitive() {
        let mut view = engine(vec![pr(1, "AChow101", 0, 0), pr(2, "other", 0, 0)], 10);
        view.set_filter(Column::Author, "achow").unwrap();
        assert_eq!(view.project().numbers(), vec![1]);
    }

    #[test]
    fn all_active_filters_must_match() {
        let mut view = engine(vec![pr(11, "alice", 1, 0), pr(12, "alice", 0, 0)], 10);
        view.set_filter(Column::Author, "alice").unwrap();
        view.set_filter(Column::Ack, "acker").unwrap();
        assert_eq!(view.project().numbers(), vec![11]);
        assert_eq!(view.state().filters.len(), 2);
    }

    #[test]
    fn verdict_filter_matches_author_or_excerpt() {
        let mut view = engine(vec![pr(1, "a", 0, 1), pr(2, "b", 0, 0)], 10);
        view.set_filter(Column::Nack, "nacker0").unwrap();
        assert_eq!(view.project().numbers(), vec![1]);
        view.set_filter(Column::Nack, "^nack$").unwrap();
        assert_eq!(view.project().numbers(), vec![1]);
    }

    #[test]
    fn number_and_label_filters() {
        let mut view = engine(vec![pr(123, "a", 0, 0), pr(456, "b", 0, 0)], 10);
        view.set_filter(Column::Number, "^12").unwrap();
        assert_eq!(view.project().numbers(), vec![123]);
        view.clear_filters();
        view.set_filter(Column::Labels, "tests").unwrap();
        assert_eq!(view.project().len(), 2);
    }

    #[test]
    fn malformed_pattern_keeps_prior_filter() {
        let mut view = engine(vec![pr(1, "alice", 0, 0), pr(2, "bob", 0, 0)], 10);
        view.set_filter(Column::Author, "alice").unwrap();
        let err = view.set_filter(Column::Author, "(unclosed").unwrap_err();
        assert!(matches!(err, AckError::MalformedFilterPattern { .. }));
        assert_eq!(view.state().filter_patterns(), vec![(Column::Author, "alice")]);
        assert_eq!(view.project().numbers(), vec![1]);
    }

    #[test]
    fn cursor_clamps_to_projection() {
        let mut view = engine(many(5), 10);
        view.move_cursor(-3);
        assert_eq!(view.state().cursor, 0);
        view.move_cursor(100);
        assert_eq!(view.state().cursor, 4);
        view.move_cursor(-1);
        assert_eq!(view.state().cursor, 3);
    }

    #[test]
    fn cursor_on_empty_projection_stays_zero() {
        let mut view = engine(vec![], 10);
        view.move_cursor(1);
        view.page_move(PageDirection::Down);
        view.jump_to_last();
        assert_eq!(view.state().cursor, 0);
        assert_eq!(view.state().page_top, 0);
        assert!(view.selected().is_none());
    }

    #[test]
    fn moving_past_viewport_scrolls() {
        let mut view = engine(many(20), 5);
        view.move_cursor(6);
        assert_eq!(view.state().cursor, 6);
        assert_eq!(view.state().page_top, 2);
        view.move_cursor(-6);
        assert_eq!(view.state().page_top, 0);
    }

    #[test]
    fn page_moves_clamp_to_bounds() {
        let mut view = engine(many(12), 5);
        view.page_move(PageDirection::Down);
        assert_eq!(view.state().page_top, 5);
        assert_eq!(view.state().cursor, 5);
        view.page_move(PageDirection::Down);
        assert_eq!(view.state().page_top, 7);
        assert_eq!(view.state().cursor, 10);
        view.page_move(PageDirection::Down);
        assert_eq!(view.state().page_top, 7);
        assert_eq!(view.state().cursor, 11);
        view.page_move(PageDirection::Up);
        assert_eq!(view.state().page_top, 2);
        assert_eq!(view.state().cursor, 6);
        view.page_move(PageDirection::Up);
        assert_eq!(view.state().page_top, 0);
        assert_eq!(view.state().cursor, 1);
    }

    #[test]
    fn jumps() {
        let mut view = engine(many(12), 5);
        view.jump_to_last();
        assert_eq!(view.state().cursor, 11);
        assert_eq!(view.state().page_top, 7);
        view.jump_to_first();
        assert_eq!(view.state().cursor, 0);
        assert_eq!(view.state().page_top, 0);
    }

    #[test]
    fn setting_filter_resets_position() {
        let mut view = engine(many(12), 5);
        view.jump_to_last();
        view.set_filter(Column::Title, "PR").unwrap();
        assert_eq!(view.state().cursor, 0);
        assert_eq!(view.state().page_top, 0);
    }

    #[test]
    fn replace_dataset_clamps_cursor() {
        let mut view = engine(many(12), 5);
        view.jump_to_last();
        view.replace_dataset(many(3));
        assert_eq!(view.state().cursor, 2);
        assert_eq!(view.state().page_top, 0);
        assert_eq!(view.dataset().len(), 3);
    }

    #[test]
    fn shrinking_viewport_keeps_cursor_visible() {
        let mut view = engine(many(20), 10);
        view.move_cursor(9);
        view.set_viewport(4);
        assert_eq!(view.state().page_top, 6);
    }

    #[test]
    fn selected_follows_cursor() {
        let mut view = engine(vec![pr(10, "a", 3, 0), pr(20, "b", 1, 0)], 10);
        assert_eq!(view.selected().map(|p| p.number), Some(10));
        view.move_cursor(1);
        assert_eq!(view.selected().map(|p| p.number), Some(20));
    }

    #[test]
    fn column_keys_round_trip() {
        for key in ['p', 't', 'o', 'l', 'a', 's', 'n', 'c'] {
            assert_eq!(Column::from_key(key).map(Column::key), Some(key));
        }
        assert_eq!(Column::from_key('x'), None);
    }
}
