//! Shared request plumbing for the REST collaborators.

use std::time::Duration;

use refbot_core::errors::LookupError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

const USER_AGENT_VALUE: &str = "refbot";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid `{header}` header value")]
    InvalidHeader { header: &'static str },
    #[error("repository must look like `owner/name`, got `{0}`")]
    InvalidRepository(String),
    #[error("failed to create http client: {0}")]
    Build(#[source] reqwest::Error),
}

pub(crate) fn build_client(
    accept: &'static str,
    authorization: Option<String>,
    extra: &[(&'static str, &'static str)],
    timeout: Duration,
) -> Result<reqwest::Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    for (name, value) in extra {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if let Some(authorization) = authorization {
        let mut value = HeaderValue::from_str(&authorization)
            .map_err(|_| ClientError::InvalidHeader { header: "authorization" })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout.max(Duration::from_millis(1)))
        .build()
        .map_err(ClientError::Build)
}

/// Sends `request` and decodes a JSON body, mapping HTTP failures onto [`LookupError`].
///
/// `entity` names the thing being fetched and becomes the not-found message;
/// `not_found` lists the statuses that mean the entity does not exist.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    entity: &str,
    not_found: &[StatusCode],
    timeout: Duration,
) -> Result<T, LookupError> {
    let response = request.send().await.map_err(|error| transport_error(entity, timeout, error))?;
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|error| LookupError::Decode(format!("{entity}: {error}")));
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, entity, not_found, &body))
}

pub(crate) fn status_error(
    status: StatusCode,
    entity: &str,
    not_found: &[StatusCode],
    body: &str,
) -> LookupError {
    if not_found.contains(&status) {
        return LookupError::not_found(entity);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LookupError::Unauthorized(format!("{entity}: status {}", status.as_u16()))
        }
        _ => LookupError::Integration(format!(
            "{entity}: status {}: {}",
            status.as_u16(),
            truncate_for_error(body)
        )),
    }
}

fn transport_error(entity: &str, timeout: Duration, error: reqwest::Error) -> LookupError {
    if error.is_timeout() {
        LookupError::Timeout { operation: format!("fetch {entity}"), secs: timeout.as_secs() }
    } else {
        LookupError::Integration(format!("{entity}: {error}"))
    }
}

fn truncate_for_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_owned();
    }
    let mut truncated = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
    truncated.push_str("...");
    truncated
}
