//! Poll configuration.

use std::time::Duration;

use colab::{ColabError, Interests};

use crate::policy::{AutoActions, Backoff};

/// Shortest permitted poll interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
/// Items requested per cycle.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub const ENV_POLL_SECS: &str = "CLAWCOLAB_POLL_SECS";
pub const ENV_PAGE_SIZE: &str = "CLAWCOLAB_PAGE_SIZE";
pub const ENV_INTERESTS: &str = "CLAWCOLAB_INTERESTS";
pub const ENV_SEEN_CAPACITY: &str = "CLAWCOLAB_SEEN_CAPACITY";
pub const ENV_BACKOFF_MAX_SECS: &str = "CLAWCOLAB_BACKOFF_MAX_SECS";
pub const ENV_AUTO_UPVOTE: &str = "CLAWCOLAB_AUTO_UPVOTE";

/// Validated settings for one poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    interval: Duration,
    page_size: u32,
    interests: Interests,
    backoff: Backoff,
    seen_capacity: Option<usize>,
    auto_actions: AutoActions,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            interests: Interests::any(),
            backoff: Backoff::Fixed,
            seen_capacity: None,
            auto_actions: AutoActions::None,
        }
    }
}

impl PollConfig {
    pub fn builder() -> PollConfigBuilder {
        PollConfigBuilder::default()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn interests(&self) -> &Interests {
        &self.interests
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// `None` means the Seen-Set never evicts.
    pub fn seen_capacity(&self) -> Option<usize> {
        self.seen_capacity
    }

    pub fn auto_actions(&self) -> AutoActions {
        self.auto_actions
    }

    pub(crate) fn replace_interests(&mut self, interests: Interests) {
        self.interests = interests;
    }

    /// Reads the `CLAWCOLAB_*` polling variables.
    pub fn from_env() -> Result<Self, ColabError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ColabError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let mut builder = Self::builder();

        if let Some(raw) = get(ENV_POLL_SECS) {
            builder = builder.interval(Duration::from_secs(parse_number(ENV_POLL_SECS, &raw)?));
        }
        if let Some(raw) = get(ENV_PAGE_SIZE) {
            let size = parse_number(ENV_PAGE_SIZE, &raw)?;
            let size = u32::try_from(size)
                .map_err(|_| ColabError::configuration(format!("{ENV_PAGE_SIZE} is too large")))?;
            builder = builder.page_size(size);
        }
        if let Some(raw) = get(ENV_INTERESTS) {
            builder = builder.interests(Interests::parse_list(&raw));
        }
        if let Some(raw) = get(ENV_SEEN_CAPACITY) {
            let cap = parse_number(ENV_SEEN_CAPACITY, &raw)?;
            builder = builder.seen_capacity(usize::try_from(cap).unwrap_or(usize::MAX));
        }
        if let Some(raw) = get(ENV_BACKOFF_MAX_SECS) {
            builder = builder.backoff(Backoff::Exponential {
                max: Duration::from_secs(parse_number(ENV_BACKOFF_MAX_SECS, &raw)?),
            });
        }
        if let Some(raw) = get(ENV_AUTO_UPVOTE) {
            if matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on") {
                builder = builder.auto_actions(AutoActions::UpvoteMatches);
            }
        }

        builder.build()
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ColabError> {
    raw.parse()
        .map_err(|_| ColabError::configuration(format!("{key} must be a non-negative integer, got '{raw}'")))
}

/// Builder for [`PollConfig`]; [`PollConfigBuilder::build`] validates.
#[derive(Debug, Clone, Default)]
pub struct PollConfigBuilder {
    config: PollConfig,
}

impl PollConfigBuilder {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn interests(mut self, interests: Interests) -> Self {
        self.config.interests = interests;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Caps the Seen-Set at `capacity` ids (oldest evicted first).
    pub fn seen_capacity(mut self, capacity: usize) -> Self {
        self.config.seen_capacity = Some(capacity);
        self
    }

    pub fn auto_actions(mut self, auto_actions: AutoActions) -> Self {
        self.config.auto_actions = auto_actions;
        self
    }

    pub fn build(self) -> Result<PollConfig, ColabError> {
        let config = self.config;
        if config.interval < MIN_INTERVAL {
            return Err(ColabError::configuration(format!(
                "poll interval must be at least {}s, got {:?}",
                MIN_INTERVAL.as_secs(),
                config.interval
            )));
        }
        if config.page_size == 0 {
            return Err(ColabError::configuration("page size must be at least 1"));
        }
        if config.seen_capacity == Some(0) {
            return Err(ColabError::configuration("seen capacity must be at least 1"));
        }
        if let Some(cap) = config.seen_capacity {
            if cap < config.page_size as usize {
                // Smaller caps evict ids from the page being processed.
                return Err(ColabError::configuration(format!(
                    "seen capacity {cap} is smaller than page size {}",
                    config.page_size
                )));
            }
        }
        Ok(config)
    }
}
