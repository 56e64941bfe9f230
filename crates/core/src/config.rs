use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_SEARCH_RESULTS: usize = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub github: GithubConfig,
    pub tracker: TrackerConfig,
    pub cooldown: CooldownConfig,
    pub dispatch: DispatchConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub api_base: String,
}

#[derive(Clone, Debug)]
pub struct GithubConfig {
    pub token: Option<SecretString>,
    pub api_base: String,
    pub repository: String,
    pub quick_win_label: String,
}

impl GithubConfig {
    /// `(owner, name)` of the configured repository.
    pub fn repository_parts(&self) -> Option<(&str, &str)> {
        let (owner, name) = self.repository.trim().split_once('/')?;
        (!owner.is_empty() && !name.is_empty() && !name.contains('/')).then_some((owner, name))
    }
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub base_url: String,
    pub project_key: String,
    pub username: Option<String>,
    pub api_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct CooldownConfig {
    pub window_secs: u64,
}

impl CooldownConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub max_in_flight: usize,
    pub search_limit: usize,
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base: Option<String>,
    pub github_token: Option<String>,
    pub github_api_base: Option<String>,
    pub github_repository: Option<String>,
    pub tracker_base_url: Option<String>,
    pub tracker_project_key: Option<String>,
    pub cooldown_window_secs: Option<u64>,
    pub max_in_flight: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                api_base: "https://slack.com/api".to_string(),
            },
            github: GithubConfig {
                token: None,
                api_base: "https://api.github.com".to_string(),
                repository: "DSpace/DSpace".to_string(),
                quick_win_label: "quick win".to_string(),
            },
            tracker: TrackerConfig {
                base_url: "https://jira.duraspace.org".to_string(),
                project_key: "DS".to_string(),
                username: None,
                api_token: None,
            },
            cooldown: CooldownConfig { window_secs: 60 },
            dispatch: DispatchConfig {
                poll_interval_ms: 1_000,
                request_timeout_secs: 10,
                max_in_flight: 4,
                search_limit: MAX_SEARCH_RESULTS,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("refbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = secret_value(app_token);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(api_base) = slack.api_base {
                self.slack.api_base = api_base;
            }
        }

        if let Some(github) = patch.github {
            if let Some(token) = github.token {
                self.github.token = Some(secret_value(token));
            }
            if let Some(api_base) = github.api_base {
                self.github.api_base = api_base;
            }
            if let Some(repository) = github.repository {
                self.github.repository = repository;
            }
            if let Some(quick_win_label) = github.quick_win_label {
                self.github.quick_win_label = quick_win_label;
            }
        }

        if let Some(tracker) = patch.tracker {
            if let Some(base_url) = tracker.base_url {
                self.tracker.base_url = base_url;
            }
            if let Some(project_key) = tracker.project_key {
                self.tracker.project_key = project_key;
            }
            if let Some(username) = tracker.username {
                self.tracker.username = Some(username);
            }
            if let Some(api_token) = tracker.api_token {
                self.tracker.api_token = Some(secret_value(api_token));
            }
        }

        if let Some(cooldown) = patch.cooldown {
            if let Some(window_secs) = cooldown.window_secs {
                self.cooldown.window_secs = window_secs;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(poll_interval_ms) = dispatch.poll_interval_ms {
                self.dispatch.poll_interval_ms = poll_interval_ms;
            }
            if let Some(request_timeout_secs) = dispatch.request_timeout_secs {
                self.dispatch.request_timeout_secs = request_timeout_secs;
            }
            if let Some(max_in_flight) = dispatch.max_in_flight {
                self.dispatch.max_in_flight = max_in_flight;
            }
            if let Some(search_limit) = dispatch.search_limit {
                self.dispatch.search_limit = search_limit;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("REFBOT_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("REFBOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("REFBOT_SLACK_API_BASE") {
            self.slack.api_base = value;
        }

        if let Some(value) = read_env("REFBOT_GITHUB_TOKEN") {
            self.github.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("REFBOT_GITHUB_API_BASE") {
            self.github.api_base = value;
        }
        if let Some(value) = read_env("REFBOT_GITHUB_REPOSITORY") {
            self.github.repository = value;
        }
        if let Some(value) = read_env("REFBOT_GITHUB_QUICK_WIN_LABEL") {
            self.github.quick_win_label = value;
        }

        if let Some(value) = read_env("REFBOT_TRACKER_BASE_URL") {
            self.tracker.base_url = value;
        }
        if let Some(value) = read_env("REFBOT_TRACKER_PROJECT_KEY") {
            self.tracker.project_key = value;
        }
        if let Some(value) = read_env("REFBOT_TRACKER_USERNAME") {
            self.tracker.username = Some(value);
        }
        if let Some(value) = read_env("REFBOT_TRACKER_API_TOKEN") {
            self.tracker.api_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("REFBOT_COOLDOWN_WINDOW_SECS") {
            self.cooldown.window_secs = parse_u64("REFBOT_COOLDOWN_WINDOW_SECS", &value)?;
        }

        if let Some(value) = read_env("REFBOT_DISPATCH_POLL_INTERVAL_MS") {
            self.dispatch.poll_interval_ms = parse_u64("REFBOT_DISPATCH_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("REFBOT_DISPATCH_REQUEST_TIMEOUT_SECS") {
            self.dispatch.request_timeout_secs =
                parse_u64("REFBOT_DISPATCH_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("REFBOT_DISPATCH_MAX_IN_FLIGHT") {
            self.dispatch.max_in_flight = parse_usize("REFBOT_DISPATCH_MAX_IN_FLIGHT", &value)?;
        }
        if let Some(value) = read_env("REFBOT_DISPATCH_SEARCH_LIMIT") {
            self.dispatch.search_limit = parse_usize("REFBOT_DISPATCH_SEARCH_LIMIT", &value)?;
        }

        if let Some(value) = read_env("REFBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("REFBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("REFBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("REFBOT_LOGGING_LEVEL").or_else(|| read_env("REFBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("REFBOT_LOGGING_FORMAT").or_else(|| read_env("REFBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(slack_api_base) = overrides.slack_api_base {
            self.slack.api_base = slack_api_base;
        }
        if let Some(github_token) = overrides.github_token {
            self.github.token = Some(secret_value(github_token));
        }
        if let Some(github_api_base) = overrides.github_api_base {
            self.github.api_base = github_api_base;
        }
        if let Some(github_repository) = overrides.github_repository {
            self.github.repository = github_repository;
        }
        if let Some(tracker_base_url) = overrides.tracker_base_url {
            self.tracker.base_url = tracker_base_url;
        }
        if let Some(tracker_project_key) = overrides.tracker_project_key {
            self.tracker.project_key = tracker_project_key;
        }
        if let Some(window_secs) = overrides.cooldown_window_secs {
            self.cooldown.window_secs = window_secs;
        }
        if let Some(max_in_flight) = overrides.max_in_flight {
            self.dispatch.max_in_flight = max_in_flight;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_github(&self.github)?;
        validate_tracker(&self.tracker)?;
        validate_cooldown(&self.cooldown)?;
        validate_dispatch(&self.dispatch)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("refbot.toml"), PathBuf::from("config/refbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    validate_http_url("slack.api_base", &slack.api_base)
}

fn validate_github(github: &GithubConfig) -> Result<(), ConfigError> {
    validate_http_url("github.api_base", &github.api_base)?;

    if github.repository_parts().is_none() {
        return Err(ConfigError::Validation(format!(
            "github.repository must look like `owner/name`, got `{}`",
            github.repository
        )));
    }

    if github.quick_win_label.trim().is_empty() {
        return Err(ConfigError::Validation("github.quick_win_label must not be empty".to_string()));
    }

    Ok(())
}

fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ConfigError> {
    validate_http_url("tracker.base_url", &tracker.base_url)?;

    let key = tracker.project_key.trim();
    if key.is_empty() || !key.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ConfigError::Validation(
            "tracker.project_key must be a non-empty alphanumeric project key (e.g. `DS`)"
                .to_string(),
        ));
    }

    if tracker.api_token.is_some() && tracker.username.is_none() {
        return Err(ConfigError::Validation(
            "tracker.api_token is set but tracker.username is missing".to_string(),
        ));
    }

    Ok(())
}

fn validate_cooldown(cooldown: &CooldownConfig) -> Result<(), ConfigError> {
    if cooldown.window_secs == 0 || cooldown.window_secs > 86_400 {
        return Err(ConfigError::Validation(
            "cooldown.window_secs must be in range 1..=86400".to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "dispatch.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if dispatch.request_timeout_secs == 0 || dispatch.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "dispatch.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if dispatch.max_in_flight == 0 || dispatch.max_in_flight > 64 {
        return Err(ConfigError::Validation(
            "dispatch.max_in_flight must be in range 1..=64".to_string(),
        ));
    }

    if dispatch.search_limit == 0 || dispatch.search_limit > MAX_SEARCH_RESULTS {
        return Err(ConfigError::Validation(format!(
            "dispatch.search_limit must be in range 1..={MAX_SEARCH_RESULTS}"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    github: Option<GithubPatch>,
    tracker: Option<TrackerPatch>,
    cooldown: Option<CooldownPatch>,
    dispatch: Option<DispatchPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GithubPatch {
    token: Option<String>,
    api_base: Option<String>,
    repository: Option<String>,
    quick_win_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackerPatch {
    base_url: Option<String>,
    project_key: Option<String>,
    username: Option<String>,
    api_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CooldownPatch {
    window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    max_in_flight: Option<usize>,
    search_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
