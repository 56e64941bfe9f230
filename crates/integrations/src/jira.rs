//! Jira REST v2 client backing [`IssueTracker`].

use std::time::Duration;

use async_trait::async_trait;
use refbot_core::config::TrackerConfig;
use refbot_core::domain::issue::{Issue, IssueKey};
use refbot_core::errors::LookupError;
use refbot_core::sources::IssueTracker;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::http::{build_client, fetch_json, ClientError};

#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, SecretString)>,
    timeout: Duration,
}

impl JiraClient {
    pub fn new(config: &TrackerConfig, timeout: Duration) -> Result<Self, ClientError> {
        let http = build_client("application/json", None, &[], timeout)?;
        let credentials = match (&config.username, &config.api_token) {
            (Some(username), Some(token)) => Some((username.clone(), token.clone())),
            _ => None,
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            credentials,
            timeout,
        })
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn issue(&self, key: &IssueKey) -> Result<Issue, LookupError> {
        let mut request = self
            .http
            .get(format!("{}/rest/api/2/issue/{key}", self.base_url))
            .query(&[("fields", "summary,issuetype,reporter,created,status,priority,versions")]);
        if let Some((username, token)) = &self.credentials {
            request = request.basic_auth(username, Some(token.expose_secret()));
        }

        let payload: IssuePayload =
            fetch_json(request, &format!("issue {key}"), &[StatusCode::NOT_FOUND], self.timeout)
                .await?;
        Ok(payload.into_issue(key))
    }
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    display_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    summary: String,
    issuetype: Option<Named>,
    reporter: Option<Person>,
    #[serde(default)]
    created: String,
    status: Option<Named>,
    priority: Option<Named>,
    #[serde(default)]
    versions: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    key: Option<String>,
    fields: IssueFields,
}

impl IssuePayload {
    fn into_issue(self, requested: &IssueKey) -> Issue {
        let fields = self.fields;
        let reporter = fields
            .reporter
            .and_then(|person| person.display_name.or(person.name))
            .unwrap_or_else(|| "unknown".to_owned());

        Issue {
            key: self.key.map(IssueKey).unwrap_or_else(|| requested.clone()),
            summary: fields.summary,
            issue_type: fields.issuetype.map(|named| named.name),
            reporter,
            created: fields.created,
            status: fields.status.map(|named| named.name).unwrap_or_else(|| "Unknown".to_owned()),
            priority: fields.priority.map(|named| named.name),
            versions: fields.versions.into_iter().map(|named| named.name).collect(),
        }
    }
}
