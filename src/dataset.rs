use std::sync::Arc;

use crate::types::PrSummary;

/// The current set of PR summaries for the repository.
///
/// Refreshes build a complete `Vec` on a background task and hand it over
/// through the action channel; `replace` then swaps the snapshot in one
/// assignment. Readers hold an `Arc` to whichever snapshot was current when
/// they asked, so a half-built dataset is never observable.
#[derive(Debug, Clone)]
pub struct Dataset {
    snapshot: Arc<[PrSummary]>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            snapshot: Arc::from(Vec::new()),
        }
    }
}

impl Dataset {
    #[cfg(test)]
    pub fn new(summaries: Vec<PrSummary>) -> Self {
        let mut dataset = Self::default();
        dataset.replace(summaries);
        dataset
    }

    /// Swap in a new snapshot, ordered by PR number descending.
    /// Duplicate PR numbers keep the first occurrence.
    pub fn replace(&mut self, mut summaries: Vec<PrSummary>) {
        summaries.sort_by(|a, b| b.number.cmp(&a.number));
        summaries.dedup_by_key(|s| s.number);
        tracing::info!(prs = summaries.len(), "dataset replaced");
        self.snapshot = Arc::from(summaries);
    }

    pub fn all(&self) -> Arc<[PrSummary]> {
        Arc::clone(&self.snapshot)
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrMetadata;

    fn summary(number: u64) -> PrSummary {
        PrSummary::from_meta(PrMetadata {
            number,
            ..Default::default()
        })
    }

    #[test]
    fn all_is_number_descending() {
        let ds = Dataset::new(vec![summary(3), summary(10), summary(7)]);
        let numbers: Vec<u64> = ds.all().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![10, 7, 3]);
    }

    #[test]
    fn replace_discards_old_snapshot() {
        let mut ds = Dataset::new(vec![summary(1), summary(2)]);
        let before = ds.all();
        ds.replace(vec![summary(5)]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.all()[0].number, 5);
        // readers holding the old snapshot still see it whole
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn duplicate_numbers_collapse() {
        let ds = Dataset::new(vec![summary(4), summary(4), summary(2)]);
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn empty_by_default() {
        assert!(Dataset::default().is_empty());
    }
}
