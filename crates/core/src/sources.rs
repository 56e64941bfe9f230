//! Contracts for the remote services the dispatcher fetches from.
//!
//! Implementations live in `refbot-integrations`; tests substitute scripted fakes.

use async_trait::async_trait;

use crate::domain::commit::Commit;
use crate::domain::issue::{Issue, IssueKey};
use crate::domain::pull_request::PullRequest;
use crate::domain::search::{ReviewSummary, SearchHit, SearchQuery};
use crate::errors::LookupError;

#[async_trait]
pub trait SourceHost: Send + Sync {
    async fn pull_request(&self, number: u64) -> Result<PullRequest, LookupError>;

    async fn commit(&self, sha: &str) -> Result<Commit, LookupError>;

    /// Returns at most `limit` hits, in the order requested by `query.sort`.
    async fn search_pull_requests(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<SearchHit>, LookupError>;

    async fn review_summary(&self, number: u64) -> Result<ReviewSummary, LookupError>;
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn issue(&self, key: &IssueKey) -> Result<Issue, LookupError>;
}
