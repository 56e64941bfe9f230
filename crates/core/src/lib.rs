pub mod config;
pub mod cooldown;
pub mod domain;
pub mod errors;
pub mod matcher;
pub mod render;
pub mod sources;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use cooldown::CooldownCache;
pub use domain::commit::{Commit, DiffStats, FileChange};
pub use domain::issue::{Issue, IssueKey};
pub use domain::pull_request::PullRequest;
pub use domain::search::{
    Mergeability, MergeableState, QuickWin, Review, ReviewState, ReviewSummary, SearchHit,
    SearchQuery, SearchSort,
};
pub use errors::{DispatchError, ErrorKind, LookupError};
pub use matcher::{Category, Command, CommandKind, MatcherSettings, PhraseMatcher};
pub use render::ResponseFormatter;
pub use sources::{IssueTracker, SourceHost};
