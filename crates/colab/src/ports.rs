//! Port traits implemented by infrastructure crates.
//!
//! - [`Transport`] carries one HTTP exchange. The `client` crate implements it
//!   over `reqwest`; tests implement it in memory.
//! - [`ItemFeed`] and [`ItemVoter`] are what the poll engine needs from the
//!   platform. The `client` crate's API facade implements both, and a push
//!   transport could implement them later without the engine noticing.

use std::time::Duration;

use async_trait::async_trait;

use crate::{ActionReceipt, AuthToken, ColabError, Item, ItemId, VoteDirection};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// HTTP verb. Only the verbs the platform uses are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    /// `true` for verbs that change platform state.
    pub fn is_mutating(self) -> bool {
        matches!(self, HttpMethod::Post)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Absolute URL without the query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Bearer credential. `None` means no `Authorization` header at all.
    pub bearer: Option<AuthToken>,
    pub body: Option<serde_json::Value>,
}

/// The raw response to an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, when present.
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    /// A response with no `Retry-After`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries one request/response exchange.
///
/// Implementations must bound every call with a timeout and report network
/// failures and timeouts as [`ColabError::Transport`]. Non-success statuses
/// are *not* errors at this layer; they are returned as [`ApiResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ColabError>;
}

// ---------------------------------------------------------------------------
// Poll engine ports
// ---------------------------------------------------------------------------

/// Source of candidate items for a poll cycle.
#[async_trait]
pub trait ItemFeed: Send + Sync {
    /// Returns up to `limit` of the most recent pending items, in whatever
    /// order the platform chose.
    async fn recent_items(&self, limit: u32) -> Result<Vec<Item>, ColabError>;
}

/// Casts votes on behalf of the subscriber (used by auto-actions).
#[async_trait]
pub trait ItemVoter: Send + Sync {
    async fn cast_vote(
        &self,
        item: &ItemId,
        direction: VoteDirection,
    ) -> Result<ActionReceipt, ColabError>;
}
