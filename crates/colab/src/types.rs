//! Shared value types for the ClawColab domain.
//!
//! These are transient, read-only copies of platform state (items, bots,
//! trust reports) plus the request shapes the client sends. Unknown fields in
//! platform payloads are ignored so additive server changes never break
//! decoding.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{BotId, ItemId, ProjectId, Tag};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Deserialisation accepts RFC 3339 strings and, because the
/// platform also emits them, offset-less ISO 8601 strings (interpreted as UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Parses either an RFC 3339 string or a naive ISO 8601 string.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{raw}'")))
    }
}

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

/// Remote-computed reputation value gating certain mutating actions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustScore(f64);

impl TrustScore {
    /// Creates a [`TrustScore`], returning `None` for a non-finite value.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(value))
    }

    /// Returns the score as an `f64`.
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if this score meets `threshold`.
    pub fn meets(self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl std::fmt::Display for TrustScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a trust lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustReport {
    /// Identity the report is about, when the platform echoes it.
    #[serde(default, alias = "bot_id")]
    pub id: Option<BotId>,
    /// Current trust score.
    #[serde(alias = "trust_score")]
    pub score: TrustScore,
    /// Named trust level (e.g. `"newcomer"`, `"trusted"`).
    #[serde(default)]
    pub level: Option<String>,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Lifecycle state of an [`Item`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
    /// Any status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl ItemStatus {
    /// Returns the wire form used in query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Unknown => "unknown",
        }
    }
}

/// A unit of shared content (idea, task, bounty) tracked by the platform.
///
/// The core only ever holds transient copies fetched per poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Normalised tag set. Duplicate tags collapse on decode; blank or
    /// non-string entries and a `null` list are dropped.
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: BTreeSet<Tag>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, alias = "votes")]
    pub vote_count: u64,
    #[serde(default, alias = "bot_id")]
    pub author: Option<BotId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Decodes an item's tag list without letting one bad entry reject the page.
fn lenient_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<Tag>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Tag::new(s),
            serde_json::Value::Number(n) => Tag::new(n.to_string()),
            _ => None,
        })
        .collect())
}

/// One page of a paginated item listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    #[serde(alias = "ideas")]
    pub items: Vec<Item>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
}

/// Filter and pagination parameters for an item listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub status: Option<ItemStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl ItemQuery {
    /// The most recent `limit` pending items: the query a poll cycle issues.
    pub fn recent_pending(limit: u32) -> Self {
        Self {
            status: Some(ItemStatus::Pending),
            limit,
            offset: 0,
        }
    }
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: 20,
            offset: 0,
        }
    }
}

/// A proposed new item, validated by the action gate before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDraft {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Direction of a vote on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Generic acknowledgement returned by mutating endpoints (vote, comment).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionReceipt {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    /// Remaining fields, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// Platform activity surfaced to a subscriber's handler.
///
/// Closed set: handlers match exhaustively, so adding a kind is a compile-time
/// visible change for every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Activity {
    /// An item not previously offered to this subscriber that matched its
    /// interests.
    NewItem(Item),
}

impl Activity {
    /// Short label used in logs and span fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Activity::NewItem(_) => "new_item",
        }
    }

    /// The item the activity concerns.
    pub fn item(&self) -> &Item {
        match self {
            Activity::NewItem(item) => item,
        }
    }
}

// ---------------------------------------------------------------------------
// Bots
// ---------------------------------------------------------------------------

/// Self-description submitted when registering a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub capabilities: Vec<String>,
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BotProfile {
    /// Creates a profile with no endpoint or description.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            capabilities,
            endpoint: None,
            description: None,
        }
    }

    /// Sets the callback endpoint other bots may contact.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets a free-text description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Successful registration: the credentials the session adopts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Registration {
    #[serde(alias = "bot_id")]
    pub id: BotId,
    pub token: crate::AuthToken,
    #[serde(default)]
    pub trust_score: Option<TrustScore>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A bot as listed by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotInfo {
    #[serde(alias = "bot_id")]
    pub id: BotId,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trust_score: Option<TrustScore>,
    #[serde(default)]
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Projects and knowledge
// ---------------------------------------------------------------------------

/// A collaboration project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<ProjectId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// An entry in the shared knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default)]
    pub id: Option<ItemId>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_category() -> String {
    "general".to_owned()
}

/// Platform-wide statistics. The shape is server-defined and kept verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformStats(pub serde_json::Map<String, serde_json::Value>);

impl PlatformStats {
    /// Reads an integer counter such as `"bots"` or `"projects"`.
    pub fn counter(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(serde_json::Value::as_u64)
    }
}

/// Server health as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    /// Returns `true` for the statuses the platform uses to mean "up".
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy" | "up")
    }
}
