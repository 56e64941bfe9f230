//! REST collaborators for refbot.
//!
//! - `github` - pull requests, commits, reviews and issue search (source host)
//! - `jira` - issue lookups (issue tracker)

pub mod github;
mod http;
pub mod jira;

pub use github::GitHubClient;
pub use http::ClientError;
pub use jira::JiraClient;
