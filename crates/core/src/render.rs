//! Slack mrkdwn renderings of fetched entities.

use regex::{Regex, RegexBuilder};

use crate::domain::commit::Commit;
use crate::domain::issue::{Issue, IssueKey};
use crate::domain::pull_request::PullRequest;
use crate::domain::search::{Mergeability, QuickWin, SearchHit, SearchSort};

pub const MISSING_ISSUE_LINK: &str = "No linked issue?";
pub const MAX_LISTED_FILES: usize = 3;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct ResponseFormatter {
    tracker_base_url: String,
    issue_key: Regex,
    project_key: String,
}

impl ResponseFormatter {
    pub fn new(tracker_base_url: &str, project_key: &str) -> Result<Self, regex::Error> {
        let project_key = project_key.trim().to_ascii_uppercase();
        let issue_key =
            RegexBuilder::new(&format!(r"{}-?([0-9]+)", regex::escape(&project_key)))
                .case_insensitive(true)
                .build()?;
        Ok(Self {
            tracker_base_url: tracker_base_url.trim_end_matches('/').to_owned(),
            issue_key,
            project_key,
        })
    }

    pub fn issue_url(&self, key: &IssueKey) -> String {
        format!("{}/browse/{key}", self.tracker_base_url)
    }

    /// Tracker key referenced in a pull request title, if any.
    pub fn linked_issue(&self, title: &str) -> Option<IssueKey> {
        let number = self.issue_key.captures(title)?.get(1)?.as_str().parse::<u64>().ok()?;
        Some(IssueKey::new(&self.project_key, number))
    }

    pub fn pull_request(&self, pull: &PullRequest) -> String {
        let tracker_link = match self.linked_issue(&pull.title) {
            Some(key) => format!(":clipboard: {}", self.issue_url(&key)),
            None => MISSING_ISSUE_LINK.to_owned(),
        };

        format!(
            "*PULL #{number}*: {title}\nPR for *{base}* by {author}, created {created}\nMilestone: {milestone}\tState: {state}\tReviews: {reviews}\tMergeable: {mergeable}\n{tracker_link}\n:github: {url}",
            number = pull.number,
            title = pull.title,
            base = pull.base_branch,
            author = pull.author,
            created = pull.created_at.format(TIMESTAMP_FORMAT),
            milestone = pull.milestone.as_deref().unwrap_or("none"),
            state = pull.state,
            reviews = pull.review_comment_count,
            mergeable = mergeable_text(pull.mergeable),
            url = pull.url,
        )
    }

    pub fn issue(&self, issue: &Issue, related: &[SearchHit]) -> String {
        let mut response = format!(
            "*ISSUE [{key}]*: {summary}\n{issue_type} reported by {reporter}, created {created}\nStatus: {status}\tPriority: {priority}\tAffects: {versions}\n:clipboard: {url}",
            key = issue.key,
            summary = issue.summary,
            issue_type = issue.issue_type.as_deref().unwrap_or("Issue"),
            reporter = issue.reporter,
            created = issue.created,
            status = issue.status,
            priority = issue.priority.as_deref().unwrap_or("none"),
            versions = issue.versions.join(","),
            url = self.issue_url(&issue.key),
        );

        if !related.is_empty() {
            response.push_str(&format!(
                "\n\n*Related pull requests* (by search for '{}'):\n",
                issue.key
            ));
            for hit in related {
                response.push_str(&format!(
                    ":github: *#{}* {} ({})\n{}\n",
                    hit.number, hit.title, hit.state, hit.url
                ));
            }
        }

        response
    }
}

fn mergeable_text(mergeable: Option<bool>) -> &'static str {
    match mergeable {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

pub fn commit(commit: &Commit) -> String {
    let mut response = format!(
        "Commit {sha} by {author} on {date} `+{additions}` `-{deletions}` `({total})`\n```{message}```\n{url}\n{count} files changed",
        sha = commit.short_sha(),
        author = commit.author,
        date = commit.date.format(TIMESTAMP_FORMAT),
        additions = commit.stats.additions,
        deletions = commit.stats.deletions,
        total = commit.stats.total,
        message = commit.message,
        url = commit.url,
        count = commit.files.len(),
    );

    if commit.files.len() > MAX_LISTED_FILES {
        response.push_str(" (suppressing details for >3 files, follow above link for more info)");
    } else if !commit.files.is_empty() {
        let files = commit
            .files
            .iter()
            .map(|file| {
                format!(
                    "{} `+{}` `-{}` `({})`",
                    file.filename, file.additions, file.deletions, file.changes
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        response.push_str(&format!("\n*Files*:\n{files}"));
    }

    response
}

pub fn quick_wins(milestone: &str, sort: SearchSort, results: &[QuickWin], limit: usize) -> String {
    if results.is_empty() {
        return format!("No open quick wins found for milestone *{milestone}*.");
    }

    let entries = results
        .iter()
        .take(limit)
        .map(|quick_win| {
            format!(
                ":github: *#{number}* {title} `+{approvals}` `-{changes}` {label}\n{url}",
                number = quick_win.hit.number,
                title = quick_win.hit.title,
                approvals = quick_win.reviews.approvals,
                changes = quick_win.reviews.changes_requested,
                label = Mergeability::derive(&quick_win.reviews),
                url = quick_win.hit.url,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("*Quick wins* for milestone *{milestone}* ({}):\n{entries}", sort.as_str())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{commit, quick_wins, ResponseFormatter, MISSING_ISSUE_LINK};
    use crate::domain::commit::{Commit, DiffStats, FileChange};
    use crate::domain::issue::{Issue, IssueKey};
    use crate::domain::pull_request::PullRequest;
    use crate::domain::search::{MergeableState, QuickWin, ReviewSummary, SearchHit, SearchSort};

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::new("https://jira.duraspace.org/", "DS").expect("formatter")
    }

    fn pull_request(title: &str) -> PullRequest {
        PullRequest {
            number: 2048,
            title: title.to_owned(),
            base_branch: "main".to_owned(),
            author: "kshepherd".to_owned(),
            created_at: Utc.with_ymd_and_hms(2018, 5, 1, 12, 30, 0).unwrap(),
            milestone: Some("7.0".to_owned()),
            state: "open".to_owned(),
            review_comment_count: 3,
            mergeable: Some(true),
            url: "https://github.com/DSpace/DSpace/pull/2048".to_owned(),
        }
    }

    fn commit_with_files(count: usize) -> Commit {
        Commit {
            sha: "6d1b695f0e9c0fe3b7a1".to_owned(),
            author: "Andrea".to_owned(),
            date: Utc.with_ymd_and_hms(2018, 6, 2, 8, 0, 5).unwrap(),
            message: "Fix item import".to_owned(),
            stats: DiffStats { additions: 10, deletions: 2, total: 12 },
            files: (0..count)
                .map(|index| FileChange {
                    filename: format!("src/File{index}.java"),
                    additions: 5,
                    deletions: 1,
                    changes: 6,
                })
                .collect(),
            url: "https://github.com/DSpace/DSpace/commit/6d1b695".to_owned(),
        }
    }

    #[test]
    fn pull_request_links_issue_key_from_title() {
        let rendered = formatter().pull_request(&pull_request("DS-1234 fix the thing"));

        assert_eq!(
            rendered,
            "*PULL #2048*: DS-1234 fix the thing\n\
             PR for *main* by kshepherd, created 2018-05-01 12:30:00\n\
             Milestone: 7.0\tState: open\tReviews: 3\tMergeable: yes\n\
             :clipboard: https://jira.duraspace.org/browse/DS-1234\n\
             :github: https://github.com/DSpace/DSpace/pull/2048"
        );
    }

    #[test]
    fn pull_request_without_issue_key_gets_disclaimer() {
        let mut pull = pull_request("Tidy up the build");
        pull.milestone = None;
        pull.mergeable = None;
        let rendered = formatter().pull_request(&pull);

        assert!(rendered.contains(MISSING_ISSUE_LINK));
        assert!(!rendered.contains("/browse/"));
        assert!(rendered.contains("Milestone: none"));
        assert!(rendered.contains("Mergeable: unknown"));
    }

    #[test]
    fn linked_issue_accepts_unhyphenated_keys() {
        assert_eq!(formatter().linked_issue("[ds3734] bump"), Some(IssueKey::new("DS", 3734)));
    }

    #[test]
    fn issue_appends_related_pull_requests() {
        let issue = Issue {
            key: IssueKey::new("DS", 3734),
            summary: "Item import fails".to_owned(),
            issue_type: Some("Bug".to_owned()),
            reporter: "Tim Donohue".to_owned(),
            created: "2018-01-02T10:00:00.000+0000".to_owned(),
            status: "Open".to_owned(),
            priority: Some("Major".to_owned()),
            versions: vec!["6.2".to_owned(), "7.0".to_owned()],
        };
        let related = vec![SearchHit {
            number: 2001,
            title: "DS-3734 fix import".to_owned(),
            state: "open".to_owned(),
            url: "https://github.com/DSpace/DSpace/pull/2001".to_owned(),
        }];

        let bare = formatter().issue(&issue, &[]);
        assert_eq!(
            bare,
            "*ISSUE [DS-3734]*: Item import fails\n\
             Bug reported by Tim Donohue, created 2018-01-02T10:00:00.000+0000\n\
             Status: Open\tPriority: Major\tAffects: 6.2,7.0\n\
             :clipboard: https://jira.duraspace.org/browse/DS-3734"
        );

        let with_related = formatter().issue(&issue, &related);
        assert!(with_related.starts_with(&bare));
        assert!(with_related.ends_with(
            "\n\n*Related pull requests* (by search for 'DS-3734'):\n\
             :github: *#2001* DS-3734 fix import (open)\n\
             https://github.com/DSpace/DSpace/pull/2001\n"
        ));
    }

    #[test]
    fn commit_with_many_files_suppresses_file_list() {
        let rendered = commit(&commit_with_files(4));

        assert!(!rendered.contains("src/File0.java"));
        assert!(!rendered.contains("*Files*"));
        assert!(rendered.ends_with(
            "4 files changed (suppressing details for >3 files, follow above link for more info)"
        ));
    }

    #[test]
    fn commit_with_few_files_lists_them() {
        let rendered = commit(&commit_with_files(2));

        assert_eq!(
            rendered,
            "Commit 6d1b695 by Andrea on 2018-06-02 08:00:05 `+10` `-2` `(12)`\n\
             ```Fix item import```\n\
             https://github.com/DSpace/DSpace/commit/6d1b695\n\
             2 files changed\n\
             *Files*:\n\
             src/File0.java `+5` `-1` `(6)`\n\
             src/File1.java `+5` `-1` `(6)`"
        );
    }

    #[test]
    fn quick_wins_are_capped_and_labelled() {
        let results = (1..=8)
            .map(|number| QuickWin {
                hit: SearchHit {
                    number,
                    title: format!("Quick fix {number}"),
                    state: "open".to_owned(),
                    url: format!("https://github.com/DSpace/DSpace/pull/{number}"),
                },
                reviews: ReviewSummary {
                    approvals: 2,
                    changes_requested: 0,
                    mergeable_state: MergeableState::Clean,
                },
            })
            .collect::<Vec<_>>();

        let rendered = quick_wins("7.0", SearchSort::Newest, &results, 5);

        assert!(rendered.starts_with("*Quick wins* for milestone *7.0* (newest):\n"));
        assert_eq!(rendered.matches(":github:").count(), 5);
        assert!(rendered.contains(":github: *#1* Quick fix 1 `+2` `-0` can be merged (+2)"));
        assert!(!rendered.contains("#6*"));
    }

    #[test]
    fn empty_quick_win_search_says_so() {
        assert_eq!(
            quick_wins("7.0", SearchSort::Oldest, &[], 5),
            "No open quick wins found for milestone *7.0*."
        );
    }
}
