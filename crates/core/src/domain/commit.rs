use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub stats: DiffStats,
    pub files: Vec<FileChange>,
    pub url: String,
}

impl Commit {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Commit, DiffStats};

    #[test]
    fn short_sha_tolerates_abbreviated_hashes() {
        let mut commit = Commit {
            sha: "6d1b695f3c0a".to_owned(),
            author: "Tim".to_owned(),
            date: Utc.with_ymd_and_hms(2018, 5, 1, 12, 0, 0).unwrap(),
            message: "Fix".to_owned(),
            stats: DiffStats::default(),
            files: Vec::new(),
            url: String::new(),
        };
        assert_eq!(commit.short_sha(), "6d1b695");

        commit.sha = "6d1b".to_owned();
        assert_eq!(commit.short_sha(), "6d1b");
    }
}
