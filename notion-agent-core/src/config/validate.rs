//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
///
/// Credentials are not checked here; they are only required once the
/// assistant is actually built.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.agent.model.trim().is_empty() {
        errors.push("agent.model must not be empty".to_string());
    }
    if config.agent.app_name.trim().is_empty() {
        errors.push("agent.app_name must not be empty".to_string());
    }
    if config.agent.user_id.trim().is_empty() {
        errors.push("agent.user_id must not be empty".to_string());
    }
    if config.agent.max_tokens == 0 {
        errors.push("agent.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.agent.temperature) {
        errors.push("agent.temperature must be in [0.0, 2.0]".to_string());
    }
    if config.agent.max_tool_iterations == 0 {
        errors.push("agent.max_tool_iterations must be > 0".to_string());
    }

    let url = config.notion.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push("notion.url must be an http(s) URL".to_string());
    }
    if config.notion.timeout_secs == 0 {
        errors.push("notion.timeout_secs must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
