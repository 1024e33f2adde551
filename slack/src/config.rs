//! Slack credentials.

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::{SlackError, SlackResult};

/// Canonical names first, then the lower-case names older deployments used.
const BOT_TOKEN_VARS: &[&str] = &["SLACK_BOT_TOKEN", "slackbottoken"];
const APP_TOKEN_VARS: &[&str] = &["SLACK_APP_TOKEN", "slackapptoken"];

const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Clone)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...).
    bot_token: SecretString,
    /// App-level token for Socket Mode (xapp-...).
    app_token: SecretString,
    api_base_url: String,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            bot_token: SecretString::new(bot_token.into().into()),
            app_token: SecretString::new(app_token.into().into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Points the Web API client somewhere else, e.g. a mock server.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Reads `SLACK_BOT_TOKEN` and `SLACK_APP_TOKEN`, falling back to
    /// `slackbottoken` and `slackapptoken`.
    pub fn from_env() -> SlackResult<Self> {
        let bot_token = first_env(BOT_TOKEN_VARS)?;
        let app_token = first_env(APP_TOKEN_VARS)?;

        if !bot_token.starts_with("xoxb-") {
            warn!("Bot token doesn't start with 'xoxb-', this may be incorrect");
        }
        if !app_token.starts_with("xapp-") {
            warn!("App token doesn't start with 'xapp-', this may be incorrect");
        }

        Ok(Self::new(bot_token, app_token))
    }

    pub fn validate(&self) -> SlackResult<()> {
        if self.bot_token.expose_secret().is_empty() {
            return Err(SlackError::Config("bot token is empty".to_string()));
        }
        if self.app_token.expose_secret().is_empty() {
            return Err(SlackError::Config("app token is empty".to_string()));
        }
        if !self.bot_token.expose_secret().starts_with("xoxb-") {
            return Err(SlackError::Config(
                "bot token must start with 'xoxb-'".to_string(),
            ));
        }
        if !self.app_token.expose_secret().starts_with("xapp-") {
            return Err(SlackError::Config(
                "app token must start with 'xapp-'".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    pub fn app_token(&self) -> &str {
        self.app_token.expose_secret()
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

fn first_env(names: &[&str]) -> SlackResult<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| SlackError::Config(format!("{} not set", names[0])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_tokens() {
        let config = SlackConfig::new("xoxb-secret", "xapp-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn validate_checks_prefixes() {
        assert!(SlackConfig::new("xoxb-a", "xapp-b").validate().is_ok());
        assert!(SlackConfig::new("xoxp-a", "xapp-b").validate().is_err());
        assert!(SlackConfig::new("xoxb-a", "").validate().is_err());
    }

    #[test]
    fn base_url_is_normalized() {
        let config = SlackConfig::new("xoxb-a", "xapp-b").with_api_base_url("http://localhost:1/api/");
        assert_eq!(config.api_base_url(), "http://localhost:1/api");
    }

    #[test]
    fn missing_env_names_the_canonical_variable() {
        let err = first_env(&["BASEBONE_TEST_NEVER_SET_A", "basebone_test_never_set_b"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: BASEBONE_TEST_NEVER_SET_A not set"
        );
    }
}
