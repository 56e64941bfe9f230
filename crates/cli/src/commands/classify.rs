use refbot_core::matcher::{MatcherSettings, PhraseMatcher};
use serde_json::json;

use super::CommandResult;

/// Runs the phrase matcher over `text` with no network access.
///
/// A recognised reference yields its category, captured slots and the
/// cooldown label it would be rate limited under; chatter yields a null result.
pub fn run(text: &str, project_key: &str, bot_user_id: Option<String>, channel: &str) -> CommandResult {
    let project_key = project_key.trim().to_ascii_uppercase();
    let matcher = match PhraseMatcher::new(&MatcherSettings {
        project_key: project_key.clone(),
        bot_user_id,
    }) {
        Ok(matcher) => matcher,
        Err(error) => return CommandResult::failure("classify", "matcher", error.to_string(), 3),
    };

    let Some(command) = matcher.classify(text, channel) else {
        return CommandResult::success("classify", "no reference recognised", None);
    };

    let result = json!({
        "command": command,
        "cooldown_label": command.kind.cooldown_label(&project_key),
    });
    let category = serde_json::to_value(command.category())
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();

    CommandResult::success("classify", format!("matched {category}"), Some(result))
}
