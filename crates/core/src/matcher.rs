//! Classifies a chat line into at most one typed [`Command`].
//!
//! Categories are tried in a fixed priority order and the first one whose
//! pattern matches with every required slot captured wins. Overlapping
//! references are expected (a PR title often mentions an issue key), so the
//! order is the precedence: pull requests, issues, commits, quick-win search.
//! Only when none match is the message checked for a direct mention of the bot.

use std::collections::BTreeMap;

use regex::{Captures, Regex, RegexBuilder};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    GetPullRequest,
    GetIssue,
    GetCommit,
    QuickWinSearch,
    Mentioned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Keyword,
    Number,
    Sha,
    Milestone,
    Sort,
}

impl Slot {
    pub fn name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Number => "number",
            Self::Sha => "sha",
            Self::Milestone => "milestone",
            Self::Sort => "sort",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum CommandKind {
    GetPullRequest { keyword: String, number: String },
    GetIssue { keyword: String, number: String },
    GetCommit { sha: String },
    QuickWinSearch { milestone: String, sort: Option<String> },
    Mentioned { text: String },
}

impl CommandKind {
    pub fn category(&self) -> Category {
        match self {
            Self::GetPullRequest { .. } => Category::GetPullRequest,
            Self::GetIssue { .. } => Category::GetIssue,
            Self::GetCommit { .. } => Category::GetCommit,
            Self::QuickWinSearch { .. } => Category::QuickWinSearch,
            Self::Mentioned { .. } => Category::Mentioned,
        }
    }

    /// Cooldown key for this request. Mentions have none and are never rate limited.
    pub fn cooldown_label(&self, project_key: &str) -> Option<String> {
        match self {
            Self::GetPullRequest { number, .. } => Some(format!("PR-{}", label_number(number))),
            Self::GetIssue { number, .. } => {
                Some(format!("{project_key}-{}", label_number(number)))
            }
            Self::GetCommit { sha } => Some(format!("COMMIT-{}", sha.to_ascii_lowercase())),
            Self::QuickWinSearch { milestone, sort } => Some(match sort {
                Some(sort) => format!("QW-{milestone}/{}", sort.to_ascii_lowercase()),
                None => format!("QW-{milestone}"),
            }),
            Self::Mentioned { .. } => None,
        }
    }
}

/// Leading zeros name the same entity; captures that do not parse keep their raw text.
fn label_number(number: &str) -> String {
    let number = number.trim();
    number.parse::<u64>().map(|parsed| parsed.to_string()).unwrap_or_else(|_| number.to_owned())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Command {
    pub channel: String,
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl Command {
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Slot name to captured value, in declaration order.
    pub fn slots(&self) -> Vec<(&'static str, &str)> {
        match &self.kind {
            CommandKind::GetPullRequest { keyword, number }
            | CommandKind::GetIssue { keyword, number } => {
                vec![(Slot::Keyword.name(), keyword.as_str()), (Slot::Number.name(), number.as_str())]
            }
            CommandKind::GetCommit { sha } => vec![(Slot::Sha.name(), sha.as_str())],
            CommandKind::QuickWinSearch { milestone, sort } => {
                let mut slots = vec![(Slot::Milestone.name(), milestone.as_str())];
                if let Some(sort) = sort {
                    slots.push((Slot::Sort.name(), sort.as_str()));
                }
                slots
            }
            CommandKind::Mentioned { text } => vec![("text", text.as_str())],
        }
    }
}

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("invalid pattern for {category:?}: {source}")]
    Pattern {
        category: Category,
        #[source]
        source: regex::Error,
    },
}

#[derive(Clone, Debug)]
pub struct MatcherSettings {
    pub project_key: String,
    pub bot_user_id: Option<String>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self { project_key: "DS".to_owned(), bot_user_id: None }
    }
}

struct PhraseCategory {
    name: Category,
    pattern: Regex,
    required: &'static [Slot],
    optional: &'static [Slot],
}

impl PhraseCategory {
    fn new(
        name: Category,
        pattern: &str,
        required: &'static [Slot],
        optional: &'static [Slot],
    ) -> Result<Self, MatcherError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| MatcherError::Pattern { category: name, source })?;
        Ok(Self { name, pattern, required, optional })
    }

    fn extract(&self, text: &str) -> Option<CommandKind> {
        let captures = self.pattern.captures(text)?;
        let mut slots = BTreeMap::new();
        for slot in self.required {
            slots.insert(slot.name(), captured(&captures, *slot)?);
        }
        for slot in self.optional {
            if let Some(value) = captured(&captures, *slot) {
                slots.insert(slot.name(), value);
            }
        }
        build_kind(self.name, slots)
    }
}

fn captured(captures: &Captures<'_>, slot: Slot) -> Option<String> {
    captures
        .name(slot.name())
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn build_kind(category: Category, mut slots: BTreeMap<&'static str, String>) -> Option<CommandKind> {
    let mut take = |slot: Slot| slots.remove(slot.name());
    Some(match category {
        Category::GetPullRequest => {
            CommandKind::GetPullRequest { keyword: take(Slot::Keyword)?, number: take(Slot::Number)? }
        }
        Category::GetIssue => {
            CommandKind::GetIssue { keyword: take(Slot::Keyword)?, number: take(Slot::Number)? }
        }
        Category::GetCommit => CommandKind::GetCommit { sha: take(Slot::Sha)? },
        Category::QuickWinSearch => CommandKind::QuickWinSearch {
            milestone: take(Slot::Milestone)?,
            sort: take(Slot::Sort),
        },
        Category::Mentioned => return None,
    })
}

pub struct PhraseMatcher {
    categories: Vec<PhraseCategory>,
    mention: Regex,
    bot_user_id: Option<String>,
}

impl PhraseMatcher {
    pub fn new(settings: &MatcherSettings) -> Result<Self, MatcherError> {
        let key = regex::escape(settings.project_key.trim());
        let categories = vec![
            PhraseCategory::new(
                Category::GetPullRequest,
                &format!(r"\b(?P<keyword>PR|{key}PR)\s?[-#]?(?P<number>[0-9]+)"),
                &[Slot::Keyword, Slot::Number],
                &[],
            )?,
            PhraseCategory::new(
                Category::GetIssue,
                &format!(r"\b(?P<keyword>{key})\s?[-#]?(?P<number>[0-9]+)"),
                &[Slot::Keyword, Slot::Number],
                &[],
            )?,
            PhraseCategory::new(
                Category::GetCommit,
                r"\bcommit\s+(?P<sha>[0-9a-f]{6,40})\b",
                &[Slot::Sha],
                &[],
            )?,
            PhraseCategory::new(
                Category::QuickWinSearch,
                r"\bquick[\s-]?wins?(?:\s+(?:for|in))?(?:\s+milestone)?\s+(?P<milestone>[0-9]+(?:[.\-][0-9A-Za-z]+)*)(?:\s+(?:(?:sorted\s+)?by\s+)?(?P<sort>newest|oldest|updated)\b)?",
                &[Slot::Milestone],
                &[Slot::Sort],
            )?,
        ];
        let mention = Regex::new(r"(?s)^<@(?P<user>[UW][A-Z0-9]+)(?:\|[^>]*)?>\s*(?P<text>.*)$")
            .map_err(|source| MatcherError::Pattern { category: Category::Mentioned, source })?;

        Ok(Self { categories, mention, bot_user_id: settings.bot_user_id.clone() })
    }

    pub fn classify(&self, text: &str, channel: &str) -> Option<Command> {
        let kind = self
            .categories
            .iter()
            .find_map(|category| category.extract(text))
            .or_else(|| self.direct_mention(text))?;

        Some(Command { channel: channel.to_owned(), kind })
    }

    fn direct_mention(&self, text: &str) -> Option<CommandKind> {
        let bot_user_id = self.bot_user_id.as_deref()?;
        let captures = self.mention.captures(text.trim_start())?;
        if captures.name("user")?.as_str() != bot_user_id {
            return None;
        }
        let text = captures.name("text").map(|value| value.as_str().trim()).unwrap_or_default();
        Some(CommandKind::Mentioned { text: text.to_owned() })
    }
}
