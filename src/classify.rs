use regex::Regex;

use crate::config::Vocabulary;
use crate::error::{AckError, Result};
use crate::types::{Comment, VerdictCategory, VerdictRecord};

/// Longest hex run we accept as a commit id.
const SHA_MAX_LEN: usize = 40;

/// Turns free-form review comments into verdicts.
///
/// Rules are tried per line in fixed priority: NACK, then Concept ACK, then
/// ACK. Quoted (`>`) and struck-out (`~`) lines are skipped. The first line
/// that matches any rule decides the verdict for the whole comment.
#[derive(Debug, Clone)]
pub struct Classifier {
    nack: Option<Regex>,
    concept_ack: Option<Regex>,
    ack: Option<Regex>,
    ready_for_merge: Option<Regex>,
    sha: Regex,
}

impl Classifier {
    pub fn new(vocabulary: &Vocabulary) -> Result<Self> {
        let min = vocabulary.sha_min_len.clamp(1, SHA_MAX_LEN);
        let sha = Regex::new(&format!(r"\b[0-9a-fA-F]{{{},{}}}\b", min, SHA_MAX_LEN))
            .map_err(|e| AckError::Config(e.to_string()))?;

        Ok(Self {
            nack: keyword_regex(&vocabulary.nack)?,
            concept_ack: keyword_regex(&vocabulary.concept_ack)?,
            ack: keyword_regex(&vocabulary.ack)?,
            ready_for_merge: keyword_regex(&vocabulary.ready_for_merge)?,
            sha,
        })
    }

    pub fn classify(&self, comment: &Comment, head_commit: Option<&str>) -> Option<VerdictRecord> {
        let (category, line) = reviewable_lines(&comment.body)
            .find_map(|line| self.match_line(line, comment, head_commit).map(|c| (c, line)))?;

        Some(VerdictRecord {
            author: comment.author.clone(),
            category,
            excerpt: line.trim().to_string(),
        })
    }

    /// Whether a non-quoted line of `body` carries a ready-for-merge keyword.
    pub fn mentions_ready_for_merge(&self, body: &str) -> bool {
        let Some(re) = &self.ready_for_merge else {
            return false;
        };
        reviewable_lines(body).any(|line| re.is_match(line))
    }

    fn match_line(
        &self,
        line: &str,
        comment: &Comment,
        head_commit: Option<&str>,
    ) -> Option<VerdictCategory> {
        if matches_any(&self.nack, line) {
            return Some(VerdictCategory::Nack);
        }
        if matches_any(&self.concept_ack, line) {
            return Some(VerdictCategory::ConceptAck);
        }

        let keyword = self.ack.as_ref()?.find(line)?;
        let referenced = self
            .sha_after(&line[keyword.end()..])
            .or_else(|| comment.submitted_at_commit.as_deref().filter(|s| !s.is_empty()));

        if is_stale(referenced, head_commit) {
            Some(VerdictCategory::StaleAck)
        } else {
            Some(VerdictCategory::Ack)
        }
    }

    /// First hex token in `rest` that looks like a commit id. Runs made only of
    /// letters ("facade", "decade") are ordinary words.
    fn sha_after<'a>(&self, rest: &'a str) -> Option<&'a str> {
        self.sha
            .find_iter(rest)
            .map(|m| m.as_str())
            .find(|tok| tok.bytes().any(|b| b.is_ascii_digit()))
    }
}

/// Lines eligible for matching: not blank, not quoted, not struck out.
fn reviewable_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().filter(|line| {
        let t = line.trim_start();
        !t.is_empty() && !t.starts_with('>') && !t.starts_with('~')
    })
}

fn matches_any(re: &Option<Regex>, line: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(line))
}

/// Compile a keyword list into one case-insensitive whole-word regex.
/// An empty list yields `None`, which never matches.
fn keyword_regex(words: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = words
        .iter()
        .filter(|w| !w.trim().is_empty())
        .map(|w| {
            w.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| AckError::Config(format!("vocabulary does not compile: {}", e)))
}

/// An ACK is stale when it names a commit that is neither the head nor an
/// abbreviation of it. Missing information on either side means current.
fn is_stale(referenced: Option<&str>, head_commit: Option<&str>) -> bool {
    match (referenced, head_commit) {
        (Some(sha), Some(head)) if !head.is_empty() => !commits_match(sha, head),
        _ => false,
    }
}

fn commits_match(a: &str, b: &str) -> bool {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    a.starts_with(&b) || b.starts_with(&a)
}
