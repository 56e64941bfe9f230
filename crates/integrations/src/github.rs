//! GitHub REST v3 client backing [`SourceHost`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use refbot_core::config::GithubConfig;
use refbot_core::domain::commit::{Commit, DiffStats, FileChange};
use refbot_core::domain::pull_request::PullRequest;
use refbot_core::domain::search::{
    MergeableState, Review, ReviewState, ReviewSummary, SearchHit, SearchQuery,
};
use refbot_core::errors::LookupError;
use refbot_core::sources::SourceHost;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use crate::http::{build_client, fetch_json, ClientError};

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const REVIEWS_PER_PAGE: &str = "100";

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    name: String,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(config: &GithubConfig, timeout: Duration) -> Result<Self, ClientError> {
        let (owner, name) = config
            .repository_parts()
            .ok_or_else(|| ClientError::InvalidRepository(config.repository.clone()))?;
        let authorization = config
            .token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret().trim()));
        let http = build_client(
            ACCEPT_GITHUB_JSON,
            authorization,
            &[("x-github-api-version", "2022-11-28")],
            timeout,
        )?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            owner: owner.to_owned(),
            name: name.to_owned(),
            timeout,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{path}", self.api_base, self.owner, self.name)
    }

    async fn pull_payload(&self, number: u64) -> Result<PullPayload, LookupError> {
        let request = self.http.get(self.repo_url(&format!("pulls/{number}")));
        let entity = format!("pull request #{number}");
        fetch_json(request, &entity, &[StatusCode::NOT_FOUND], self.timeout).await
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn pull_request(&self, number: u64) -> Result<PullRequest, LookupError> {
        Ok(self.pull_payload(number).await?.into_pull_request())
    }

    async fn commit(&self, sha: &str) -> Result<Commit, LookupError> {
        let request = self.http.get(self.repo_url(&format!("commits/{sha}")));
        let payload: CommitPayload = fetch_json(
            request,
            &format!("commit {sha}"),
            &[StatusCode::NOT_FOUND, StatusCode::UNPROCESSABLE_ENTITY],
            self.timeout,
        )
        .await?;
        Ok(payload.into_commit())
    }

    async fn search_pull_requests(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<SearchHit>, LookupError> {
        let (sort, order) = query.sort.api_params();
        let per_page = limit.max(1).to_string();
        let request = self.http.get(format!("{}/search/issues", self.api_base)).query(&[
            ("q", query.terms.as_str()),
            ("sort", sort),
            ("order", order),
            ("per_page", per_page.as_str()),
        ]);
        let payload: SearchPayload =
            fetch_json(request, "pull request search", &[], self.timeout).await?;

        debug!(
            event_name = "integration.github.search_completed",
            query = %query.terms,
            total_count = payload.total_count,
            "pull request search completed"
        );

        Ok(payload
            .items
            .into_iter()
            .take(limit)
            .map(|item| SearchHit {
                number: item.number,
                title: item.title,
                state: item.state,
                url: item.html_url,
            })
            .collect())
    }

    async fn review_summary(&self, number: u64) -> Result<ReviewSummary, LookupError> {
        let pull = self.pull_payload(number).await?;
        let request = self
            .http
            .get(self.repo_url(&format!("pulls/{number}/reviews")))
            .query(&[("per_page", REVIEWS_PER_PAGE)]);
        let reviews: Vec<ReviewPayload> = fetch_json(
            request,
            &format!("reviews for pull request #{number}"),
            &[StatusCode::NOT_FOUND],
            self.timeout,
        )
        .await?;

        let reviews = reviews
            .into_iter()
            .filter_map(|review| {
                Some(Review { reviewer: review.user?.login, state: review.state })
            })
            .collect::<Vec<_>>();
        let state =
            pull.mergeable_state.as_deref().map_or(MergeableState::Unknown, MergeableState::parse);

        Ok(ReviewSummary::tally(&reviews, state))
    }
}

#[derive(Debug, Deserialize)]
struct UserRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MilestoneRef {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PullPayload {
    number: u64,
    title: String,
    base: BranchRef,
    user: Option<UserRef>,
    created_at: DateTime<Utc>,
    milestone: Option<MilestoneRef>,
    state: String,
    #[serde(default)]
    review_comments: u64,
    mergeable: Option<bool>,
    mergeable_state: Option<String>,
    html_url: String,
}

impl PullPayload {
    fn into_pull_request(self) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title,
            base_branch: self.base.name,
            author: self.user.map(|user| user.login).unwrap_or_else(|| "unknown".to_owned()),
            created_at: self.created_at,
            milestone: self.milestone.map(|milestone| milestone.title),
            state: self.state,
            review_comment_count: self.review_comments,
            mergeable: self.mergeable,
            url: self.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: CommitAuthor,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    html_url: String,
    commit: CommitDetail,
    #[serde(default)]
    stats: DiffStats,
    #[serde(default)]
    files: Vec<FileChange>,
}

impl CommitPayload {
    fn into_commit(self) -> Commit {
        Commit {
            sha: self.sha,
            author: self.commit.author.name,
            date: self.commit.author.date,
            message: self.commit.message,
            stats: self.stats,
            files: self.files,
            url: self.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    user: Option<UserRef>,
    state: ReviewState,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: u64,
    title: String,
    state: String,
    html_url: String,
}
