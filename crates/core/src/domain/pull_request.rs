use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub base_branch: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub milestone: Option<String>,
    pub state: String,
    pub review_comment_count: u64,
    pub mergeable: Option<bool>,
    pub url: String,
}
