use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSort {
    #[default]
    Newest,
    Oldest,
    Updated,
}

impl SearchSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Updated => "updated",
        }
    }

    /// `(sort, order)` query parameters understood by the search API.
    pub fn api_params(self) -> (&'static str, &'static str) {
        match self {
            Self::Newest => ("created", "desc"),
            Self::Oldest => ("created", "asc"),
            Self::Updated => ("updated", "desc"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub terms: String,
    pub sort: SearchSort,
}

impl SearchQuery {
    pub fn quick_wins(repository: &str, label: &str, milestone: &str, sort: SearchSort) -> Self {
        Self {
            terms: format!(
                "repo:{repository} is:pr is:open label:{} milestone:{}",
                quote_qualifier(label),
                quote_qualifier(milestone)
            ),
            sort,
        }
    }

    /// Pull requests in `repository` mentioning `text` anywhere.
    pub fn mentions(repository: &str, text: &str) -> Self {
        Self { terms: format!("repo:{repository} is:pr {text}"), sort: SearchSort::Newest }
    }
}

fn quote_qualifier(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value.to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    Clean,
    Dirty,
    Blocked,
    Behind,
    Unstable,
    Draft,
    HasHooks,
    #[serde(other)]
    Unknown,
}

impl MergeableState {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "clean" => Self::Clean,
            "dirty" => Self::Dirty,
            "blocked" => Self::Blocked,
            "behind" => Self::Behind,
            "unstable" => Self::Unstable,
            "draft" => Self::Draft,
            "has_hooks" => Self::HasHooks,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Review {
    pub reviewer: String,
    pub state: ReviewState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub approvals: u32,
    pub changes_requested: u32,
    pub mergeable_state: MergeableState,
}

impl ReviewSummary {
    /// Tallies each reviewer's latest decision. Reviews must be in submission order.
    pub fn tally(reviews: &[Review], mergeable_state: MergeableState) -> Self {
        let mut decisions: HashMap<&str, ReviewState> = HashMap::new();
        for review in reviews {
            match review.state {
                ReviewState::Approved | ReviewState::ChangesRequested => {
                    decisions.insert(review.reviewer.as_str(), review.state);
                }
                ReviewState::Dismissed => {
                    decisions.remove(review.reviewer.as_str());
                }
                ReviewState::Commented | ReviewState::Pending | ReviewState::Other => {}
            }
        }

        let approvals = decisions.values().filter(|state| **state == ReviewState::Approved).count();
        let changes_requested = decisions.len() - approvals;
        Self {
            approvals: u32::try_from(approvals).unwrap_or(u32::MAX),
            changes_requested: u32::try_from(changes_requested).unwrap_or(u32::MAX),
            mergeable_state,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mergeability {
    CanBeMerged { approvals: u32 },
    NeedsAnotherApproval,
    NeedsApprovals,
    ChangesRequested,
    Blocked,
}

impl Mergeability {
    pub fn derive(summary: &ReviewSummary) -> Self {
        if summary.mergeable_state != MergeableState::Clean {
            return if summary.changes_requested > 0 {
                Self::ChangesRequested
            } else {
                Self::Blocked
            };
        }

        match summary.approvals {
            0 => Self::NeedsApprovals,
            1 => Self::NeedsAnotherApproval,
            approvals => Self::CanBeMerged { approvals },
        }
    }
}

impl fmt::Display for Mergeability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CanBeMerged { approvals } => write!(f, "can be merged (+{approvals})"),
            Self::NeedsAnotherApproval => f.write_str("needs another +1"),
            Self::NeedsApprovals => f.write_str("needs ≥2 approvals"),
            Self::ChangesRequested => f.write_str("blocked, changes requested"),
            Self::Blocked => f.write_str("blocked (CI or merge conflict?)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuickWin {
    pub hit: SearchHit,
    pub reviews: ReviewSummary,
}
