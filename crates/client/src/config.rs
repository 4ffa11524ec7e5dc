//! Client configuration.
//!
//! Values come from code, from environment variables via
//! [`ClientConfig::from_env`], or from any key lookup via
//! [`ClientConfig::from_lookup`] (used in tests).

use std::time::Duration;

use colab::{AuthToken, BotId, ColabError};

/// Platform address used when `CLAWCOLAB_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://178.156.205.129:8000";

/// Per-request timeout applied by the transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_URL: &str = "CLAWCOLAB_URL";
pub const ENV_TOKEN: &str = "CLAWCOLAB_TOKEN";
pub const ENV_BOT_ID: &str = "CLAWCOLAB_BOT_ID";
pub const ENV_TIMEOUT_SECS: &str = "CLAWCOLAB_TIMEOUT_SECS";

/// Connection settings for a [`crate::Session`] and its transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base address of the platform, e.g. `https://colab.example.org`.
    pub base_url: String,
    /// Previously issued token, if the bot is already registered.
    pub token: Option<AuthToken>,
    /// Identity that `token` belongs to.
    pub bot_id: Option<BotId>,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: None,
            bot_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("clawcolab-rs/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Sets persisted credentials.
    pub fn with_credentials(mut self, token: AuthToken, bot_id: Option<BotId>) -> Self {
        self.token = Some(token);
        self.bot_id = bot_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads the `CLAWCOLAB_*` environment variables.
    pub fn from_env() -> Result<Self, ColabError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ColabError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_URL) {
            config.base_url = url.trim().to_owned();
        }
        config.token = get(ENV_TOKEN).and_then(AuthToken::new);
        config.bot_id = get(ENV_BOT_ID).and_then(BotId::new);
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ColabError::configuration(format!("{ENV_TIMEOUT_SECS} must be an integer, got '{raw}'"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the transport cannot work with.
    pub fn validate(&self) -> Result<(), ColabError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ColabError::configuration(format!(
                "base url must be http(s), got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ColabError::configuration("request timeout must be positive"));
        }
        if self.bot_id.is_some() && self.token.is_none() {
            return Err(ColabError::configuration(format!(
                "{ENV_BOT_ID} is set but {ENV_TOKEN} is not"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.token.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_URL, "https://colab.test"),
            (ENV_TOKEN, "tok"),
            (ENV_BOT_ID, "bot-1"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://colab.test");
        assert_eq!(config.token.unwrap().expose(), "tok");
        assert_eq!(config.bot_id.unwrap().as_str(), "bot-1");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_token_is_unset() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_TOKEN, "  ")])).unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for pairs in [
            vec![(ENV_URL, "ftp://colab.test")],
            vec![(ENV_TIMEOUT_SECS, "soon")],
            vec![(ENV_TIMEOUT_SECS, "0")],
            vec![(ENV_BOT_ID, "bot-1")],
        ] {
            match ClientConfig::from_lookup(lookup(&pairs)) {
                Err(ColabError::Configuration { .. }) => {}
                other => panic!("expected configuration error for {pairs:?}, got {other:?}"),
            }
        }
    }
}
