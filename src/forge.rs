use async_trait::async_trait;

use crate::error::Result;
use crate::types::PullRequestData;

/// Source of pull request data for one repository.
#[async_trait]
pub trait Forge: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Fails if the repository cannot be reached with the configured credentials.
    async fn check_repository(&self, owner: &str, repo: &str) -> Result<()>;

    /// All open PRs with their full comment history.
    async fn fetch_repository(&self, owner: &str, repo: &str) -> Result<Vec<PullRequestData>>;
}
