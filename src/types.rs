use chrono::{DateTime, Utc};
use std::fmt;

/// Review verdict a comment can carry. Order here is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerdictCategory {
    Ack,
    StaleAck,
    Nack,
    ConceptAck,
}

impl VerdictCategory {
    pub const ALL: [VerdictCategory; 4] = [
        VerdictCategory::Ack,
        VerdictCategory::StaleAck,
        VerdictCategory::Nack,
        VerdictCategory::ConceptAck,
    ];

    fn index(self) -> usize {
        match self {
            VerdictCategory::Ack => 0,
            VerdictCategory::StaleAck => 1,
            VerdictCategory::Nack => 2,
            VerdictCategory::ConceptAck => 3,
        }
    }
}

impl fmt::Display for VerdictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictCategory::Ack => write!(f, "ACKs"),
            VerdictCategory::StaleAck => write!(f, "Stale ACKs"),
            VerdictCategory::Nack => write!(f, "NACKs"),
            VerdictCategory::ConceptAck => write!(f, "Concept ACKs"),
        }
    }
}

/// A PR comment or review body as delivered by the forge.
#[derive(Debug, Clone)]
pub struct Comment {
    pub author: String,
    pub body: String,
    /// Commit a review was submitted against. Plain issue comments have none.
    pub submitted_at_commit: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Output of the classifier for a single comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictRecord {
    pub author: String,
    pub category: VerdictCategory,
    pub excerpt: String,
}

/// PR metadata, copied verbatim into the summary
#[derive(Debug, Clone, Default)]
pub struct PrMetadata {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub head_commit: Option<String>,
    pub url: String,
    pub draft: bool,
}

/// Everything the fetch collaborator returns for one PR.
#[derive(Debug, Clone)]
pub struct PullRequestData {
    pub meta: PrMetadata,
    /// Chronological order.
    pub comments: Vec<Comment>,
    pub force_pushes: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub author: String,
    pub excerpt: String,
}

/// Aggregated review state of one pull request.
///
/// Per-category counts are always derived from the entry lists, so a count
/// can never drift from the entries it describes.
#[derive(Debug, Clone, Default)]
pub struct PrSummary {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub head_commit: Option<String>,
    pub url: String,
    pub draft: bool,
    pub needs_rebase: bool,
    pub ready_for_merge: bool,
    verdicts: [Vec<ReviewEntry>; 4],
}

pub const NEEDS_REBASE_LABEL: &str = "Needs rebase";

impl PrSummary {
    pub fn from_meta(meta: PrMetadata) -> Self {
        let needs_rebase = meta.labels.iter().any(|l| l == NEEDS_REBASE_LABEL);
        Self {
            number: meta.number,
            title: meta.title,
            author: meta.author,
            labels: meta.labels,
            assignees: meta.assignees,
            head_commit: meta.head_commit,
            url: meta.url,
            draft: meta.draft,
            needs_rebase,
            ready_for_merge: false,
            verdicts: Default::default(),
        }
    }

    pub fn entries(&self, category: VerdictCategory) -> &[ReviewEntry] {
        &self.verdicts[category.index()]
    }

    pub fn count(&self, category: VerdictCategory) -> usize {
        self.verdicts[category.index()].len()
    }

    pub(crate) fn push_entry(&mut self, category: VerdictCategory, entry: ReviewEntry) {
        self.verdicts[category.index()].push(entry);
    }

    /// Drop `author`'s entry from `category`. Returns whether one was removed.
    pub(crate) fn remove_entry(&mut self, category: VerdictCategory, author: &str) -> bool {
        let list = &mut self.verdicts[category.index()];
        let before = list.len();
        list.retain(|e| e.author != author);
        list.len() != before
    }

    /// Comma-joined reviewer names for a category, as shown in the table.
    pub fn reviewers(&self, category: VerdictCategory) -> String {
        self.entries(category)
            .iter()
            .map(|e| e.author.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
