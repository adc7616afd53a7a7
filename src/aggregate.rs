use std::collections::{HashMap, HashSet};

use crate::classify::Classifier;
use crate::config::GeneralConfig;
use crate::types::{Comment, PrSummary, PullRequestData, ReviewEntry, VerdictCategory};

/// Folds a PR's comments into a [`PrSummary`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    classifier: Classifier,
    ignored_authors: HashSet<String>,
    skip_pr_author: bool,
}

impl Aggregator {
    pub fn new(classifier: Classifier, general: &GeneralConfig) -> Self {
        Self {
            classifier,
            ignored_authors: general.ignored_authors.iter().cloned().collect(),
            skip_pr_author: general.skip_pr_author,
        }
    }

    pub fn aggregate_all(&self, prs: &[PullRequestData]) -> Vec<PrSummary> {
        prs.iter().map(|pr| self.aggregate(pr)).collect()
    }

    /// Build the summary for one PR.
    ///
    /// Comments are visited oldest first. Each author keeps only their most
    /// recent verdict: a later verdict removes the earlier entry before the
    /// new one is appended.
    pub fn aggregate(&self, pr: &PullRequestData) -> PrSummary {
        let head = pr.meta.head_commit.as_deref().filter(|h| !h.is_empty());
        let mut summary = PrSummary::from_meta(pr.meta.clone());

        let mut ordered: Vec<&Comment> = pr.comments.iter().collect();
        ordered.sort_by_key(|c| c.created_at);

        let mut latest: HashMap<&str, VerdictCategory> = HashMap::new();
        for comment in ordered {
            if !self.is_reviewer(comment, &pr.meta.author) {
                continue;
            }
            let Some(verdict) = self.classifier.classify(comment, head) else {
                continue;
            };
            if let Some(previous) = latest.insert(comment.author.as_str(), verdict.category) {
                summary.remove_entry(previous, &comment.author);
            }
            summary.push_entry(
                verdict.category,
                ReviewEntry {
                    author: verdict.author,
                    excerpt: verdict.excerpt,
                },
            );
        }

        summary.ready_for_merge = self.ready_for_merge(pr);
        summary
    }

    fn is_reviewer(&self, comment: &Comment, pr_author: &str) -> bool {
        if self.ignored_authors.contains(&comment.author) {
            return false;
        }
        !(self.skip_pr_author && comment.author == pr_author)
    }

    /// A ready-for-merge mention only counts if nothing was force-pushed
    /// after it.
    fn ready_for_merge(&self, pr: &PullRequestData) -> bool {
        let last_push = pr.force_pushes.iter().max();
        pr.comments
            .iter()
            .filter(|c| last_push.map_or(true, |pushed| c.created_at > *pushed))
            .any(|c| self.classifier.mentions_ready_for_merge(&c.body))
    }
}
