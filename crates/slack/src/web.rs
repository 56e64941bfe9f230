//! Slack Web API calls used by the bot: identity, socket URL and message posting.

use std::time::Duration;

use async_trait::async_trait;
use refbot_core::config::SlackConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::commands::OutboundMessage;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("failed to create slack api client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("slack {method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack {method} failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("slack {method} did not return `{field}`")]
    MissingField { method: &'static str, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    user_id: Option<String>,
    url: Option<String>,
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SlackApiError>;
}

#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    app_token: SecretString,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig, timeout: Duration) -> Result<Self, SlackApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("refbot"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout.max(Duration::from_millis(1)))
            .build()
            .map_err(SlackApiError::Build)?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            app_token: config.app_token.clone(),
            bot_token: config.bot_token.clone(),
        })
    }

    /// Resolves the bot's own user id via `auth.test`.
    pub async fn resolve_bot_user_id(&self) -> Result<String, SlackApiError> {
        let response = self.call("auth.test", &self.bot_token, None).await?;
        response
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or(SlackApiError::MissingField { method: "auth.test", field: "user_id" })
    }

    /// Requests a fresh Socket Mode WebSocket URL.
    pub async fn open_socket_connection(&self) -> Result<String, SlackApiError> {
        let response = self.call("apps.connections.open", &self.app_token, None).await?;
        response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or(SlackApiError::MissingField { method: "apps.connections.open", field: "url" })
    }

    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackApiError> {
        let payload = json!({
            "channel": channel,
            "text": text,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        self.call("chat.postMessage", &self.bot_token, Some(payload)).await.map(|_| ())
    }

    async fn call(
        &self,
        method: &'static str,
        token: &SecretString,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, SlackApiError> {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response: ApiResponse = decode(method, request.send().await).await?;
        if !response.ok {
            return Err(SlackApiError::Api {
                method,
                error: response.error.unwrap_or_else(|| "unknown error".to_owned()),
            });
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(
    method: &'static str,
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, SlackApiError> {
    let response = response
        .and_then(reqwest::Response::error_for_status)
        .map_err(|source| SlackApiError::Http { method, source })?;
    response.json::<T>().await.map_err(|source| SlackApiError::Http { method, source })
}

#[async_trait]
impl MessageSink for SlackWebClient {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SlackApiError> {
        self.post_message(&message.channel, &message.text).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use refbot_core::config::SlackConfig;
    use serde_json::json;

    use super::{MessageSink, SlackApiError, SlackWebClient};
    use crate::commands::OutboundMessage;

    fn client(server: &MockServer) -> SlackWebClient {
        let config = SlackConfig {
            app_token: "xapp-test".to_owned().into(),
            bot_token: "xoxb-test".to_owned().into(),
            api_base: server.base_url(),
        };
        SlackWebClient::new(&config, Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn auth_test_resolves_bot_user_id_with_bot_token() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/auth.test").header("authorization", "Bearer xoxb-test");
            then.status(200).json_body(json!({ "ok": true, "user_id": "UBOT" }));
        });

        let user_id = client(&server).resolve_bot_user_id().await.expect("bot user id");

        auth.assert_calls(1);
        assert_eq!(user_id, "UBOT");
    }

    #[tokio::test]
    async fn socket_url_is_opened_with_app_token() {
        let server = MockServer::start();
        let open = server.mock(|when, then| {
            when.method(POST)
                .path("/apps.connections.open")
                .header("authorization", "Bearer xapp-test");
            then.status(200).json_body(json!({ "ok": true, "url": "wss://example.test/link" }));
        });

        let url = client(&server).open_socket_connection().await.expect("socket url");

        open.assert_calls(1);
        assert_eq!(url, "wss://example.test/link");
    }

    #[tokio::test]
    async fn sink_posts_channel_and_text() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .body_includes("\"channel\":\"C1\"")
                .body_includes("*PULL #12*");
            then.status(200).json_body(json!({ "ok": true, "channel": "C1", "ts": "1.0" }));
        });

        client(&server)
            .send(&OutboundMessage { channel: "C1".to_owned(), text: "*PULL #12*: x".to_owned() })
            .await
            .expect("posted");

        post.assert_calls(1);
    }

    #[tokio::test]
    async fn api_level_failures_surface_slack_error_code() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(200).json_body(json!({ "ok": false, "error": "channel_not_found" }));
        });

        let error = client(&server).post_message("C404", "hello").await.expect_err("api error");

        assert!(matches!(
            error,
            SlackApiError::Api { method: "chat.postMessage", ref error } if error == "channel_not_found"
        ));
    }
}
