use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AckError, Result};
use crate::forge::Forge;
use crate::types::{Comment, PrMetadata, PullRequestData};

const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const MAX_RETRIES: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Login GitHub reports for deleted accounts.
const GHOST: &str = "ghost";

const PRS_QUERY: &str = r#"
query($cursor: String, $owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(states: [OPEN], first: 50, after: $cursor) {
      nodes {
        number
        isDraft
        headRefOid
        title
        url
        author { login }
        assignees(first: 10) { nodes { login } }
        labels(first: 100) { nodes { name } }
        timelineItems(last: 50, itemTypes: [ISSUE_COMMENT, PULL_REQUEST_REVIEW, HEAD_REF_FORCE_PUSHED_EVENT]) {
          nodes { ...timelineFields }
          pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
        }
      }
      pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
    }
  }
}
"#;

const TIMELINE_QUERY: &str = r#"
query($cursor: String, $number: Int!, $owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      timelineItems(last: 50, before: $cursor, itemTypes: [ISSUE_COMMENT, PULL_REQUEST_REVIEW, HEAD_REF_FORCE_PUSHED_EVENT]) {
        nodes { ...timelineFields }
        pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
      }
    }
  }
}
"#;

const TIMELINE_FRAGMENT: &str = r#"
fragment timelineFields on PullRequestTimelineItems {
  __typename
  ... on IssueComment { author { login } body createdAt }
  ... on PullRequestReview { author { login } body createdAt commit { oid } }
  ... on HeadRefForcePushedEvent { createdAt }
}
"#;

pub struct GitHub {
    client: Octocrab,
    http: reqwest::Client,
    token: String,
}

impl std::fmt::Debug for GitHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHub").finish_non_exhaustive()
    }
}

impl From<octocrab::Error> for AckError {
    fn from(err: octocrab::Error) -> Self {
        AckError::Api(err.to_string())
    }
}

impl GitHub {
    pub fn new(token: String) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .map_err(|e| AckError::Auth(e.to_string()))?;

        Ok(Self {
            client,
            http: reqwest::Client::new(),
            token,
        })
    }

    /// POST a GraphQL query, retrying on 502 (GitHub returns it for slow
    /// queries that usually succeed on a second try).
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let payload = serde_json::json!({
            "query": format!("{}{}", query, TIMELINE_FRAGMENT),
            "variables": variables,
        });

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(GRAPHQL_URL)
                .header("Authorization", format!("bearer {}", self.token))
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", "ackboard")
                .json(&payload)
                .send()
                .await
                .map_err(|e| AckError::Api(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::BAD_GATEWAY && attempt < MAX_RETRIES {
                attempt += 1;
                tracing::warn!(attempt, "GitHub returned 502, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }

            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(AckError::Api(format!("GitHub GraphQL {}: {}", status, text)));
            }

            let body: GraphQlResponse<T> = response
                .json()
                .await
                .map_err(|e| AckError::Api(e.to_string()))?;

            if !body.errors.is_empty() {
                let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
                return Err(AckError::Api(messages.join("; ")));
            }

            return body
                .data
                .ok_or_else(|| AckError::Api("empty GraphQL response".to_string()));
        }
    }

    async fn collect_pr(&self, owner: &str, repo: &str, node: PrNode) -> Result<PullRequestData> {
        let mut timeline = Timeline::default();
        timeline.absorb(node.timeline_items.nodes);

        let mut page_info = node.timeline_items.page_info;
        while page_info.has_previous_page {
            let Some(cursor) = page_info.start_cursor.take() else {
                break;
            };
            let vars = serde_json::json!({
                "cursor": cursor,
                "number": node.number,
                "owner": owner,
                "name": repo,
            });
            let data: RepositoryData<SinglePrNode> = self.graphql(TIMELINE_QUERY, vars).await?;
            let items = data
                .repository
                .and_then(|r| r.pull_request)
                .map(|pr| pr.timeline_items)
                .ok_or_else(|| AckError::Api(format!("PR #{} disappeared", node.number)))?;
            timeline.absorb(items.nodes);
            page_info = items.page_info;
        }

        let mut comments = timeline.comments;
        comments.sort_by_key(|c| c.created_at);

        Ok(PullRequestData {
            meta: PrMetadata {
                number: node.number,
                title: node.title,
                author: login(node.author),
                labels: node.labels.into_inner().map(|l| l.name).collect(),
                assignees: node.assignees.into_inner().map(|a| a.login).collect(),
                head_commit: node.head_ref_oid.filter(|s| !s.is_empty()),
                url: node.url,
                draft: node.is_draft,
            },
            comments,
            force_pushes: timeline.force_pushes,
        })
    }
}

#[async_trait]
impl Forge for GitHub {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn check_repository(&self, owner: &str, repo: &str) -> Result<()> {
        let repository = self.client.repos(owner, repo).get().await?;
        tracing::info!(repo = %repository.name, "repository reachable");
        Ok(())
    }

    async fn fetch_repository(&self, owner: &str, repo: &str) -> Result<Vec<PullRequestData>> {
        let mut prs = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let vars = serde_json::json!({
                "cursor": cursor,
                "owner": owner,
                "name": repo,
            });
            let data: RepositoryData<PullRequestsNode> = self.graphql(PRS_QUERY, vars).await?;
            let connection = data
                .repository
                .ok_or_else(|| AckError::Api(format!("repository {}/{} not found", owner, repo)))?
                .pull_requests;

            for node in connection.nodes.into_iter().flatten() {
                prs.push(self.collect_pr(owner, repo, node).await?);
            }
            tracing::debug!(loaded = prs.len(), "fetched pull request page");

            if !connection.page_info.has_next_page {
                break;
            }
            cursor = connection.page_info.end_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(prs)
    }
}

fn login(actor: Option<Actor>) -> String {
    actor.map(|a| a.login).unwrap_or_else(|| GHOST.to_string())
}

#[derive(Default)]
struct Timeline {
    comments: Vec<Comment>,
    force_pushes: Vec<DateTime<Utc>>,
}

impl Timeline {
    /// Comments whose author account was deleted are dropped: every such
    /// author reads back as the same null actor, so their verdicts could not
    /// be told apart.
    fn absorb(&mut self, nodes: Vec<Option<TimelineNode>>) {
        for node in nodes.into_iter().flatten() {
            match node {
                TimelineNode::IssueComment(CommentNode {
                    author: Some(author),
                    body,
                    created_at,
                }) => self.comments.push(Comment {
                    author: author.login,
                    body,
                    submitted_at_commit: None,
                    created_at,
                }),
                TimelineNode::PullRequestReview(ReviewNode {
                    author: Some(author),
                    body,
                    created_at,
                    commit,
                }) => self.comments.push(Comment {
                    author: author.login,
                    body,
                    submitted_at_commit: commit.map(|c| c.oid),
                    created_at,
                }),
                TimelineNode::IssueComment(_) | TimelineNode::PullRequestReview(_) => {
                    tracing::debug!("skipping comment by deleted account");
                }
                TimelineNode::HeadRefForcePushedEvent(e) => self.force_pushes.push(e.created_at),
                TimelineNode::Other => {}
            }
        }
    }
}

// GraphQL response types

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestsNode {
    pull_requests: Connection<PrNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SinglePrNode {
    pull_request: Option<TimelineOnly>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineOnly {
    timeline_items: Connection<TimelineNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<T>>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<T>>,
}

impl<T> Nodes<T> {
    fn into_inner(self) -> impl Iterator<Item = T> {
        self.nodes.into_iter().flatten()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    has_previous_page: bool,
    start_cursor: Option<String>,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrNode {
    number: u64,
    is_draft: bool,
    head_ref_oid: Option<String>,
    title: String,
    url: String,
    author: Option<Actor>,
    assignees: Nodes<Actor>,
    labels: Nodes<Label>,
    timeline_items: Connection<TimelineNode>,
}

#[derive(Deserialize)]
struct Actor {
    login: String,
}

#[derive(Deserialize)]
struct Label {
    name: String,
}

#[derive(Deserialize)]
#[serde(tag = "__typename")]
enum TimelineNode {
    IssueComment(CommentNode),
    PullRequestReview(ReviewNode),
    HeadRefForcePushedEvent(ForcePushNode),
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    author: Option<Actor>,
    body: String,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewNode {
    author: Option<Actor>,
    body: String,
    created_at: DateTime<Utc>,
    commit: Option<CommitRef>,
}

#[derive(Deserialize)]
struct CommitRef {
    oid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForcePushNode {
    created_at: DateTime<Utc>,
}
