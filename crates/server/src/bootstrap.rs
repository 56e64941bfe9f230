use std::sync::Arc;

use refbot_core::config::{AppConfig, ConfigError};
use refbot_core::cooldown::CooldownCache;
use refbot_core::matcher::{MatcherError, MatcherSettings, PhraseMatcher};
use refbot_core::render::ResponseFormatter;
use refbot_integrations::{ClientError, GitHubClient, JiraClient};
use refbot_slack::commands::{CommandDispatcher, DispatchSettings};
use refbot_slack::events::{message_dispatcher, MessageHandler};
use refbot_slack::socket::{ReconnectPolicy, SocketModeRunner};
use refbot_slack::transport::WebSocketTransport;
use refbot_slack::web::{SlackApiError, SlackWebClient};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub bot_user_id: String,
    pub cooldown: Arc<CooldownCache>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("slack auth.test failed; check slack.bot_token: {0}")]
    SlackIdentity(#[source] SlackApiError),
    #[error(transparent)]
    Integration(#[from] ClientError),
    #[error(transparent)]
    Matcher(#[from] MatcherError),
    #[error("response formatter setup failed: {0}")]
    Formatter(#[source] regex::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        repository = %config.github.repository,
        project_key = %config.tracker.project_key,
        "starting application bootstrap"
    );
    config.validate()?;

    let timeout = config.dispatch.request_timeout();
    let web = SlackWebClient::new(&config.slack, timeout).map_err(BootstrapError::SlackClient)?;
    let bot_user_id = web.resolve_bot_user_id().await.map_err(BootstrapError::SlackIdentity)?;
    info!(
        event_name = "system.bootstrap.slack_identity",
        correlation_id = "bootstrap",
        bot_user_id = %bot_user_id,
        "resolved bot user id"
    );

    let source = Arc::new(GitHubClient::new(&config.github, timeout)?);
    let tracker = Arc::new(JiraClient::new(&config.tracker, timeout)?);
    let cooldown = Arc::new(CooldownCache::new(config.cooldown.window()));
    let formatter = ResponseFormatter::new(&config.tracker.base_url, &config.tracker.project_key)
        .map_err(BootstrapError::Formatter)?;
    let matcher = PhraseMatcher::new(&MatcherSettings {
        project_key: config.tracker.project_key.clone(),
        bot_user_id: Some(bot_user_id.clone()),
    })?;

    let commands = CommandDispatcher::new(
        source,
        tracker,
        cooldown.clone(),
        formatter,
        DispatchSettings::from_config(&config),
    );
    let handler =
        MessageHandler::new(Arc::new(matcher), Arc::new(commands), Some(bot_user_id.clone()));
    let transport = Arc::new(WebSocketTransport::new(web.clone(), config.dispatch.poll_interval()));
    let slack_runner = SocketModeRunner::new(
        transport,
        message_dispatcher(handler),
        Arc::new(web),
        ReconnectPolicy::default(),
        config.dispatch.max_in_flight,
    );
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        max_in_flight = config.dispatch.max_in_flight,
        cooldown_window_secs = config.cooldown.window_secs,
        "application wiring complete"
    );

    Ok(Application { config, bot_user_id, cooldown, slack_runner })
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use refbot_core::config::AppConfig;
    use serde_json::json;

    use super::{bootstrap_with_config, BootstrapError};

    fn config(slack_api_base: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.slack.app_token = "xapp-test".to_owned().into();
        config.slack.bot_token = "xoxb-test".to_owned().into();
        config.slack.api_base = slack_api_base.to_owned();
        config
    }

    #[tokio::test]
    async fn bootstrap_resolves_bot_identity_and_wires_runner() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200).json_body(json!({ "ok": true, "user_id": "UBOT" }));
        });

        let app = bootstrap_with_config(config(&server.base_url())).await.expect("bootstrap");

        auth.assert_calls(1);
        assert_eq!(app.bot_user_id, "UBOT");
        assert!(app.cooldown.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_fails_when_bot_token_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200).json_body(json!({ "ok": false, "error": "invalid_auth" }));
        });

        let error = bootstrap_with_config(config(&server.base_url()))
            .await
            .err()
            .expect("bootstrap should fail");

        assert!(matches!(error, BootstrapError::SlackIdentity(_)));
        assert!(error.to_string().contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_slack_tokens() {
        let mut config = config("http://127.0.0.1:9");
        config.slack.app_token = "invalid-token".to_owned().into();

        let error = bootstrap_with_config(config).await.err().expect("bootstrap should fail");

        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("slack.app_token"));
    }
}
