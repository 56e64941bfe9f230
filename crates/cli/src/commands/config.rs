use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use refbot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let mut lines = ConfigLines {
        doc: load_config_file_doc(config_file_path.as_deref()),
        path: config_file_path,
        lines: vec!["effective config (source precedence: env > file > default):".to_string()],
    };

    lines.push(
        "slack.app_token",
        redact_token(config.slack.app_token.expose_secret()),
        &["REFBOT_SLACK_APP_TOKEN"],
    );
    lines.push(
        "slack.bot_token",
        redact_token(config.slack.bot_token.expose_secret()),
        &["REFBOT_SLACK_BOT_TOKEN"],
    );
    lines.push("slack.api_base", config.slack.api_base.clone(), &["REFBOT_SLACK_API_BASE"]);

    lines.push("github.token", redact_optional(config.github.token.as_ref()), &["REFBOT_GITHUB_TOKEN"]);
    lines.push("github.api_base", config.github.api_base.clone(), &["REFBOT_GITHUB_API_BASE"]);
    lines.push("github.repository", config.github.repository.clone(), &["REFBOT_GITHUB_REPOSITORY"]);
    lines.push(
        "github.quick_win_label",
        config.github.quick_win_label.clone(),
        &["REFBOT_GITHUB_QUICK_WIN_LABEL"],
    );

    lines.push("tracker.base_url", config.tracker.base_url.clone(), &["REFBOT_TRACKER_BASE_URL"]);
    lines.push(
        "tracker.project_key",
        config.tracker.project_key.clone(),
        &["REFBOT_TRACKER_PROJECT_KEY"],
    );
    lines.push(
        "tracker.username",
        config.tracker.username.clone().unwrap_or_else(|| "<unset>".to_string()),
        &["REFBOT_TRACKER_USERNAME"],
    );
    lines.push(
        "tracker.api_token",
        redact_optional(config.tracker.api_token.as_ref()),
        &["REFBOT_TRACKER_API_TOKEN"],
    );

    lines.push(
        "cooldown.window_secs",
        config.cooldown.window_secs.to_string(),
        &["REFBOT_COOLDOWN_WINDOW_SECS"],
    );
    lines.push(
        "dispatch.poll_interval_ms",
        config.dispatch.poll_interval_ms.to_string(),
        &["REFBOT_DISPATCH_POLL_INTERVAL_MS"],
    );
    lines.push(
        "dispatch.request_timeout_secs",
        config.dispatch.request_timeout_secs.to_string(),
        &["REFBOT_DISPATCH_REQUEST_TIMEOUT_SECS"],
    );
    lines.push(
        "dispatch.max_in_flight",
        config.dispatch.max_in_flight.to_string(),
        &["REFBOT_DISPATCH_MAX_IN_FLIGHT"],
    );
    lines.push(
        "dispatch.search_limit",
        config.dispatch.search_limit.to_string(),
        &["REFBOT_DISPATCH_SEARCH_LIMIT"],
    );

    lines.push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["REFBOT_SERVER_BIND_ADDRESS"],
    );
    lines.push(
        "server.health_check_port",
        config.server.health_check_port.to_string(),
        &["REFBOT_SERVER_HEALTH_CHECK_PORT"],
    );

    lines.push("logging.level", config.logging.level.clone(), &["REFBOT_LOGGING_LEVEL", "REFBOT_LOG_LEVEL"]);
    lines.push(
        "logging.format",
        format!("{:?}", config.logging.format),
        &["REFBOT_LOGGING_FORMAT", "REFBOT_LOG_FORMAT"],
    );

    lines.lines.join("\n")
}

struct ConfigLines {
    doc: Option<Value>,
    path: Option<PathBuf>,
    lines: Vec<String>,
}

impl ConfigLines {
    fn push(&mut self, key: &str, value: String, env_keys: &[&str]) {
        let source = field_source(key, env_keys, self.doc.as_ref(), self.path.as_deref());
        self.lines.push(render_line(key, &value, source));
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("refbot.toml"), PathBuf::from("config/refbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    match secret {
        Some(_) => "<redacted>".to_string(),
        None => "<unset>".to_string(),
    }
}

/// Keeps the token family prefix (`xapp`, `xoxb`) so misplaced tokens are still spotted.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
