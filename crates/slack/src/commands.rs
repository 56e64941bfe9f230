use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use refbot_core::config::{AppConfig, MAX_SEARCH_RESULTS};
use refbot_core::cooldown::CooldownCache;
use refbot_core::domain::issue::IssueKey;
use refbot_core::domain::search::{QuickWin, SearchQuery, SearchSort};
use refbot_core::errors::{DispatchError, LookupError};
use refbot_core::matcher::{Command, CommandKind, Slot};
use refbot_core::render::{self, ResponseFormatter};
use refbot_core::sources::{IssueTracker, SourceHost};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Reply(OutboundMessage),
    NotFound(OutboundMessage),
    CoolingDown { label: String },
    Suppressed { label: String, error: DispatchError },
}

impl DispatchOutcome {
    pub fn into_message(self) -> Option<OutboundMessage> {
        match self {
            Self::Reply(message) | Self::NotFound(message) => Some(message),
            Self::CoolingDown { .. } | Self::Suppressed { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub project_key: String,
    pub repository: String,
    pub quick_win_label: String,
    pub search_limit: usize,
    pub request_timeout: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            project_key: config.tracker.project_key.trim().to_ascii_uppercase(),
            repository: config.github.repository.trim().to_owned(),
            quick_win_label: config.github.quick_win_label.clone(),
            search_limit: config.dispatch.search_limit,
            request_timeout: config.dispatch.request_timeout(),
        }
    }

    fn limit(&self) -> usize {
        self.search_limit.clamp(1, MAX_SEARCH_RESULTS)
    }
}

/// Turns classified commands into channel replies.
///
/// Each labelled command is checked against the cooldown cache before any
/// remote call is made. The label is marked even when the lookup later fails,
/// so a missing entity is not re-fetched until the window passes.
pub struct CommandDispatcher {
    source: Arc<dyn SourceHost>,
    tracker: Arc<dyn IssueTracker>,
    cooldown: Arc<CooldownCache>,
    formatter: ResponseFormatter,
    settings: DispatchSettings,
}

impl CommandDispatcher {
    pub fn new(
        source: Arc<dyn SourceHost>,
        tracker: Arc<dyn IssueTracker>,
        cooldown: Arc<CooldownCache>,
        formatter: ResponseFormatter,
        settings: DispatchSettings,
    ) -> Self {
        Self { source, tracker, cooldown, formatter, settings }
    }

    pub fn cooldown(&self) -> &Arc<CooldownCache> {
        &self.cooldown
    }

    /// Cooldown key for a command; mentions are never rate limited.
    pub fn label(&self, kind: &CommandKind) -> Option<String> {
        kind.cooldown_label(&self.settings.project_key)
    }

    pub async fn dispatch(&self, command: &Command) -> Option<OutboundMessage> {
        self.execute(command).await.into_message()
    }

    pub async fn execute(&self, command: &Command) -> DispatchOutcome {
        let Some(label) = self.label(&command.kind) else {
            let text = match &command.kind {
                CommandKind::Mentioned { text } => self.mention_reply(text),
                _ => help_text(&self.settings.project_key),
            };
            return DispatchOutcome::Reply(OutboundMessage { channel: command.channel.clone(), text });
        };

        if self.cooldown.check_and_mark(&label) {
            debug!(
                event_name = "dispatch.cooldown.suppressed",
                channel_id = %command.channel,
                label = %label,
                "label served recently; dropping request"
            );
            return DispatchOutcome::CoolingDown { label };
        }

        match self.fetch(&command.kind).await {
            Ok(text) => {
                info!(
                    event_name = "dispatch.reply.rendered",
                    channel_id = %command.channel,
                    label = %label,
                    category = ?command.category(),
                    "rendered reply"
                );
                DispatchOutcome::Reply(OutboundMessage { channel: command.channel.clone(), text })
            }
            Err(error) if error.is_user_visible() => {
                info!(
                    event_name = "dispatch.lookup.not_found",
                    channel_id = %command.channel,
                    label = %label,
                    error = %error,
                    "referenced entity does not exist"
                );
                DispatchOutcome::NotFound(OutboundMessage {
                    channel: command.channel.clone(),
                    text: not_found_text(&command.kind, &self.settings.project_key),
                })
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.lookup.failed",
                    channel_id = %command.channel,
                    label = %label,
                    error_kind = ?error.kind(),
                    error = %error,
                    "lookup failed; no reply sent"
                );
                DispatchOutcome::Suppressed { label, error }
            }
        }
    }

    async fn fetch(&self, kind: &CommandKind) -> Result<String, DispatchError> {
        match kind {
            CommandKind::GetPullRequest { number, .. } => {
                let number = parse_number(number)?;
                let pull = self.call("fetch pull request", self.source.pull_request(number)).await?;
                Ok(self.formatter.pull_request(&pull))
            }
            CommandKind::GetIssue { number, .. } => {
                let key = IssueKey::new(&self.settings.project_key, parse_number(number)?);
                let issue = self.call("fetch issue", self.tracker.issue(&key)).await?;
                let query = SearchQuery::mentions(&self.settings.repository, key.as_str());
                let related = match self
                    .call(
                        "search related pull requests",
                        self.source.search_pull_requests(&query, self.settings.limit()),
                    )
                    .await
                {
                    Ok(mut hits) => {
                        hits.truncate(self.settings.limit());
                        hits
                    }
                    Err(error) => {
                        warn!(
                            event_name = "dispatch.related_search.failed",
                            issue_key = %key,
                            error = %error,
                            "related pull request search failed; rendering issue alone"
                        );
                        Vec::new()
                    }
                };
                Ok(self.formatter.issue(&issue, &related))
            }
            CommandKind::GetCommit { sha } => {
                let commit =
                    self.call("fetch commit", self.source.commit(&sha.to_ascii_lowercase())).await?;
                Ok(render::commit(&commit))
            }
            CommandKind::QuickWinSearch { milestone, sort } => {
                let sort = sort.as_deref().and_then(SearchSort::parse).unwrap_or_default();
                let limit = self.settings.limit();
                let query = SearchQuery::quick_wins(
                    &self.settings.repository,
                    &self.settings.quick_win_label,
                    milestone,
                    sort,
                );
                let mut hits = self
                    .call("search quick wins", self.source.search_pull_requests(&query, limit))
                    .await?;
                hits.truncate(limit);

                // A missing hit is not the milestone the user asked about.
                let reviews = try_join_all(hits.iter().map(|hit| async move {
                    self.call("fetch review summary", self.source.review_summary(hit.number))
                        .await
                        .map_err(|error| match error {
                            LookupError::NotFound { entity } => LookupError::Integration(format!(
                                "review summary for search hit: {entity} not found"
                            )),
                            other => other,
                        })
                }))
                .await?;
                let quick_wins = hits
                    .into_iter()
                    .zip(reviews)
                    .map(|(hit, reviews)| QuickWin { hit, reviews })
                    .collect::<Vec<_>>();

                Ok(render::quick_wins(milestone, sort, &quick_wins, limit))
            }
            CommandKind::Mentioned { text } => Ok(self.mention_reply(text)),
        }
    }

    async fn call<T, F>(&self, operation: &str, future: F) -> Result<T, LookupError>
    where
        F: Future<Output = Result<T, LookupError>>,
    {
        let timeout = self.settings.request_timeout;
        tokio::time::timeout(timeout, future).await.unwrap_or_else(|_| {
            Err(LookupError::Timeout { operation: operation.to_owned(), secs: timeout.as_secs() })
        })
    }

    fn mention_reply(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("help") {
            help_text(&self.settings.project_key)
        } else {
            "Not sure what you mean. Mention me with `help` to see what I can look up.".to_owned()
        }
    }
}

fn parse_number(value: &str) -> Result<u64, DispatchError> {
    value.trim().parse::<u64>().map_err(|_| DispatchError::MalformedCapture {
        slot: Slot::Number.name(),
        value: value.to_owned(),
    })
}

fn not_found_text(kind: &CommandKind, project_key: &str) -> String {
    match kind {
        CommandKind::GetPullRequest { number, .. } => {
            format!("Could not find a pull request with number {}.", number.trim())
        }
        CommandKind::GetIssue { number, .. } => {
            format!("Could not find an issue with key {project_key}-{}.", number.trim())
        }
        CommandKind::GetCommit { sha } => format!("Could not find a commit with hash {sha}."),
        CommandKind::QuickWinSearch { milestone, .. } => {
            format!("Could not find milestone {milestone}.")
        }
        CommandKind::Mentioned { .. } => "Could not find that.".to_owned(),
    }
}

pub fn help_text(project_key: &str) -> String {
    format!(
        "I look up references mentioned in this channel:\n\
         • `PR 2048` or `{project_key}PR#2048` - a pull request\n\
         • `{project_key}-1234` - an issue\n\
         • `commit 6d1b695` - a commit\n\
         • `quick wins 7.0` (optionally `by newest`, `by oldest` or `by updated`) - open quick-win pull requests in a milestone\n\
         Each reference is answered at most once a minute."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use refbot_core::cooldown::CooldownCache;
    use refbot_core::domain::commit::Commit;
    use refbot_core::domain::issue::{Issue, IssueKey};
    use refbot_core::domain::pull_request::PullRequest;
    use refbot_core::domain::search::{MergeableState, ReviewSummary, SearchHit, SearchQuery};
    use refbot_core::errors::{DispatchError, ErrorKind, LookupError};
    use refbot_core::matcher::{Command, CommandKind, MatcherSettings, PhraseMatcher};
    use refbot_core::render::ResponseFormatter;
    use refbot_core::sources::{IssueTracker, SourceHost};

    use super::{CommandDispatcher, DispatchOutcome, DispatchSettings, OutboundMessage};

    struct FakeSourceHost {
        pull: Result<PullRequest, LookupError>,
        search: Result<Vec<SearchHit>, LookupError>,
        review: Result<ReviewSummary, LookupError>,
        delay: Duration,
        pull_calls: AtomicUsize,
        search_calls: AtomicUsize,
        review_calls: AtomicUsize,
        queries: std::sync::Mutex<Vec<SearchQuery>>,
    }

    impl FakeSourceHost {
        fn new(pull: Result<PullRequest, LookupError>) -> Self {
            Self {
                pull,
                search: Ok(Vec::new()),
                review: Ok(ReviewSummary {
                    approvals: 1,
                    changes_requested: 0,
                    mergeable_state: MergeableState::Clean,
                }),
                delay: Duration::ZERO,
                pull_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                review_calls: AtomicUsize::new(0),
                queries: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn with_search(mut self, search: Result<Vec<SearchHit>, LookupError>) -> Self {
            self.search = search;
            self
        }

        fn with_review(mut self, review: Result<ReviewSummary, LookupError>) -> Self {
            self.review = review;
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl SourceHost for FakeSourceHost {
        async fn pull_request(&self, _number: u64) -> Result<PullRequest, LookupError> {
            self.pull_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.pull.clone()
        }

        async fn commit(&self, sha: &str) -> Result<Commit, LookupError> {
            Err(LookupError::not_found(format!("commit {sha}")))
        }

        async fn search_pull_requests(
            &self,
            query: &SearchQuery,
            _limit: usize,
        ) -> Result<Vec<SearchHit>, LookupError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().expect("queries lock").push(query.clone());
            self.search.clone()
        }

        async fn review_summary(&self, _number: u64) -> Result<ReviewSummary, LookupError> {
            self.review_calls.fetch_add(1, Ordering::SeqCst);
            self.review.clone()
        }
    }

    struct FakeTracker;

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn issue(&self, key: &IssueKey) -> Result<Issue, LookupError> {
            Ok(Issue {
                key: key.clone(),
                summary: "Item import fails".to_owned(),
                issue_type: Some("Bug".to_owned()),
                reporter: "Tim Donohue".to_owned(),
                created: "2018-01-02T10:00:00.000+0000".to_owned(),
                status: "Open".to_owned(),
                priority: Some("Major".to_owned()),
                versions: vec!["7.0".to_owned()],
            })
        }
    }

    fn fixed_pull_request() -> PullRequest {
        PullRequest {
            number: 2048,
            title: "DS-3734 fix item import".to_owned(),
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

    fn hits(count: u64) -> Vec<SearchHit> {
        (1..=count)
            .map(|number| SearchHit {
                number,
                title: format!("Fix {number}"),
                state: "open".to_owned(),
                url: format!("https://github.com/DSpace/DSpace/pull/{number}"),
            })
            .collect()
    }

    fn settings(request_timeout: Duration) -> DispatchSettings {
        DispatchSettings {
            project_key: "DS".to_owned(),
            repository: "DSpace/DSpace".to_owned(),
            quick_win_label: "quick win".to_owned(),
            search_limit: 5,
            request_timeout,
        }
    }

    fn dispatcher_with(source: Arc<FakeSourceHost>, cooldown: CooldownCache) -> CommandDispatcher {
        CommandDispatcher::new(
            source,
            Arc::new(FakeTracker),
            Arc::new(cooldown),
            ResponseFormatter::new("https://jira.duraspace.org", "DS").expect("formatter"),
            settings(Duration::from_secs(5)),
        )
    }

    fn dispatcher(source: Arc<FakeSourceHost>) -> CommandDispatcher {
        dispatcher_with(source, CooldownCache::new(Duration::from_secs(60)))
    }

    fn pull_command(number: &str) -> Command {
        Command {
            channel: "C1".to_owned(),
            kind: CommandKind::GetPullRequest {
                keyword: "PR".to_owned(),
                number: number.to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn mention_with_pull_request_reference_renders_exact_block() {
        let matcher = PhraseMatcher::new(&MatcherSettings {
            project_key: "DS".to_owned(),
            bot_user_id: Some("UBOT".to_owned()),
        })
        .expect("matcher");
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())));
        let dispatcher = dispatcher(source.clone());

        let command = matcher.classify("<@UBOT> PR 2048", "C1").expect("classified");
        let reply = dispatcher.dispatch(&command).await;

        assert_eq!(
            reply,
            Some(OutboundMessage {
                channel: "C1".to_owned(),
                text: "*PULL #2048*: DS-3734 fix item import\n\
                       PR for *main* by kshepherd, created 2018-05-01 12:30:00\n\
                       Milestone: 7.0\tState: open\tReviews: 3\tMergeable: yes\n\
                       :clipboard: https://jira.duraspace.org/browse/DS-3734\n\
                       :github: https://github.com/DSpace/DSpace/pull/2048"
                    .to_owned(),
            })
        );
        assert_eq!(source.pull_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_label_inside_window_is_fetched_once() {
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())));
        let dispatcher = dispatcher(source.clone());

        let first = dispatcher.execute(&pull_command("2048")).await;
        let second = dispatcher.execute(&pull_command("2048")).await;

        assert!(matches!(first, DispatchOutcome::Reply(_)));
        assert_eq!(second, DispatchOutcome::CoolingDown { label: "PR-2048".to_owned() });
        assert_eq!(source.pull_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn label_is_served_again_after_window_passes() {
        let now = Arc::new(AtomicU64::new(1_000_000));
        let clock = now.clone();
        let cooldown = CooldownCache::with_clock(
            Duration::from_secs(60),
            Arc::new(move || clock.load(Ordering::SeqCst)),
        );
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())));
        let dispatcher = dispatcher_with(source.clone(), cooldown);

        assert!(dispatcher.dispatch(&pull_command("2048")).await.is_some());
        now.fetch_add(30_000, Ordering::SeqCst);
        assert!(dispatcher.dispatch(&pull_command("2048")).await.is_none());
        now.fetch_add(31_000, Ordering::SeqCst);
        assert!(dispatcher.dispatch(&pull_command("2048")).await.is_some());
        assert_eq!(source.pull_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_for_one_label_fetch_once() {
        let source = Arc::new(
            FakeSourceHost::new(Ok(fixed_pull_request())).with_delay(Duration::from_millis(20)),
        );
        let dispatcher = Arc::new(dispatcher(source.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move { dispatcher.dispatch(&pull_command("2048")).await });
        }
        let mut replies = 0;
        while let Some(result) = tasks.join_next().await {
            if result.expect("task").is_some() {
                replies += 1;
            }
        }

        assert_eq!(replies, 1);
        assert_eq!(source.pull_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_entity_gets_reply_and_still_consumes_window() {
        let source =
            Arc::new(FakeSourceHost::new(Err(LookupError::not_found("pull request #99999"))));
        let dispatcher = dispatcher(source.clone());

        let first = dispatcher.execute(&pull_command("99999")).await;
        assert_eq!(
            first,
            DispatchOutcome::NotFound(OutboundMessage {
                channel: "C1".to_owned(),
                text: "Could not find a pull request with number 99999.".to_owned(),
            })
        );

        let second = dispatcher.execute(&pull_command("99999")).await;
        assert!(matches!(second, DispatchOutcome::CoolingDown { .. }));
        assert_eq!(source.pull_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn collaborator_failures_are_swallowed() {
        let source = Arc::new(FakeSourceHost::new(Err(LookupError::Unauthorized(
            "pull request #7: status 401".to_owned(),
        ))));
        let dispatcher = dispatcher(source.clone());

        let outcome = dispatcher.execute(&pull_command("7")).await;

        match outcome {
            DispatchOutcome::Suppressed { label, error } => {
                assert_eq!(label, "PR-7");
                assert_eq!(error.kind(), ErrorKind::CollaboratorFailure);
            }
            other => panic!("expected suppressed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_number_is_dropped_before_any_fetch() {
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())));
        let dispatcher = dispatcher(source.clone());
        let oversized = "99999999999999999999999";

        let outcome = dispatcher.execute(&pull_command(oversized)).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Suppressed {
                label: format!("PR-{oversized}"),
                error: DispatchError::MalformedCapture {
                    slot: "number",
                    value: oversized.to_owned(),
                },
            }
        );
        assert_eq!(source.pull_calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            dispatcher.execute(&pull_command(oversized)).await,
            DispatchOutcome::CoolingDown { .. }
        ));
    }

    #[tokio::test]
    async fn slow_collaborator_times_out_without_reply() {
        let source = Arc::new(
            FakeSourceHost::new(Ok(fixed_pull_request())).with_delay(Duration::from_millis(500)),
        );
        let dispatcher = CommandDispatcher::new(
            source,
            Arc::new(FakeTracker),
            Arc::new(CooldownCache::new(Duration::from_secs(60))),
            ResponseFormatter::new("https://jira.duraspace.org", "DS").expect("formatter"),
            settings(Duration::from_millis(20)),
        );

        let outcome = dispatcher.execute(&pull_command("2048")).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Suppressed { error: DispatchError::Lookup(LookupError::Timeout { .. }), .. }
        ));
    }

    #[tokio::test]
    async fn quick_wins_are_capped_at_five() {
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())).with_search(Ok(hits(8))));
        let dispatcher = dispatcher(source.clone());
        let command = Command {
            channel: "C1".to_owned(),
            kind: CommandKind::QuickWinSearch {
                milestone: "7.0".to_owned(),
                sort: Some("Oldest".to_owned()),
            },
        };

        let reply = dispatcher.dispatch(&command).await.expect("reply");

        assert!(reply.text.starts_with("*Quick wins* for milestone *7.0* (oldest):\n"));
        assert_eq!(reply.text.matches(":github:").count(), 5);
        assert!(reply.text.contains("`+1` `-0` needs another +1"));
        assert_eq!(source.review_calls.load(Ordering::SeqCst), 5);
        assert_eq!(dispatcher.label(&command.kind).as_deref(), Some("QW-7.0/oldest"));
    }

    #[tokio::test]
    async fn missing_review_for_a_quick_win_hit_is_not_reported_as_missing_milestone() {
        let source = Arc::new(
            FakeSourceHost::new(Ok(fixed_pull_request()))
                .with_search(Ok(hits(1)))
                .with_review(Err(LookupError::not_found("pull request #1"))),
        );
        let dispatcher = dispatcher(source.clone());
        let command = Command {
            channel: "C1".to_owned(),
            kind: CommandKind::QuickWinSearch { milestone: "7.0".to_owned(), sort: None },
        };

        let outcome = dispatcher.execute(&command).await;

        match outcome {
            DispatchOutcome::Suppressed { label, error } => {
                assert_eq!(label, "QW-7.0");
                assert_eq!(error.kind(), ErrorKind::CollaboratorFailure);
            }
            other => panic!("expected suppressed outcome, got {other:?}"),
        }
        assert_eq!(source.review_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn issue_renders_even_when_related_search_fails() {
        let source = Arc::new(
            FakeSourceHost::new(Ok(fixed_pull_request()))
                .with_search(Err(LookupError::Integration("search down".to_owned()))),
        );
        let dispatcher = dispatcher(source.clone());
        let command = Command {
            channel: "C2".to_owned(),
            kind: CommandKind::GetIssue { keyword: "ds".to_owned(), number: "3734".to_owned() },
        };

        let reply = dispatcher.dispatch(&command).await.expect("reply");

        assert!(reply.text.starts_with("*ISSUE [DS-3734]*: Item import fails"));
        assert!(!reply.text.contains("Related pull requests"));
        assert_eq!(source.search_calls.load(Ordering::SeqCst), 1);
        let queries = source.queries.lock().expect("queries lock");
        assert_eq!(queries[0].terms, "repo:DSpace/DSpace is:pr DS-3734");
    }

    #[tokio::test]
    async fn issue_lists_at_most_five_related_pull_requests() {
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())).with_search(Ok(hits(7))));
        let dispatcher = dispatcher(source);
        let command = Command {
            channel: "C2".to_owned(),
            kind: CommandKind::GetIssue { keyword: "DS".to_owned(), number: "3734".to_owned() },
        };

        let reply = dispatcher.dispatch(&command).await.expect("reply");

        assert!(reply.text.contains("*Related pull requests* (by search for 'DS-3734'):"));
        assert_eq!(reply.text.matches(":github:").count(), 5);
    }

    #[tokio::test]
    async fn unknown_commit_gets_not_found_reply() {
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())));
        let dispatcher = dispatcher(source);
        let command = Command {
            channel: "C3".to_owned(),
            kind: CommandKind::GetCommit { sha: "ABCDEF".to_owned() },
        };

        assert_eq!(dispatcher.label(&command.kind).as_deref(), Some("COMMIT-abcdef"));
        let reply = dispatcher.dispatch(&command).await.expect("reply");
        assert_eq!(reply.text, "Could not find a commit with hash ABCDEF.");
    }

    #[tokio::test]
    async fn mention_replies_with_help_and_is_never_rate_limited() {
        let source = Arc::new(FakeSourceHost::new(Ok(fixed_pull_request())));
        let dispatcher = dispatcher(source);
        let help = Command {
            channel: "C1".to_owned(),
            kind: CommandKind::Mentioned { text: "help".to_owned() },
        };
        let chatter = Command {
            channel: "C1".to_owned(),
            kind: CommandKind::Mentioned { text: "how are you?".to_owned() },
        };

        let first = dispatcher.dispatch(&help).await.expect("help reply");
        let second = dispatcher.dispatch(&help).await.expect("help reply again");
        assert_eq!(first, second);
        assert!(first.text.contains("`DS-1234` - an issue"));

        let hint = dispatcher.dispatch(&chatter).await.expect("hint reply");
        assert!(hint.text.starts_with("Not sure what you mean"));
        assert!(dispatcher.cooldown().is_empty());
    }
}
