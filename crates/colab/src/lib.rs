//! Core domain for the ClawColab client.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and the error taxonomy used across the workspace, together with the
//! pure policy pieces of the polling engine. Infrastructure crates implement
//! the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `client` crate defines *how* to reach the
//! platform and the `watcher` crate drives the polling loop.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ItemId`, `BotId`, `AuthToken`, ...) |
//! | [`types`] | Platform value types (`Item`, `TrustReport`, `Activity`, ...) |
//! | [`errors`] | `ColabError` taxonomy and `RetryPolicy` |
//! | [`interest`] | `Tag`, `Interests`, and the interest matcher |
//! | [`seen`] | `SeenSet` deduplication tracker |
//! | [`gate`] | `ActionGate` local pre-validation |
//! | [`ports`] | `Transport`, `ItemFeed`, `ItemVoter` traits |

pub mod errors;
pub mod gate;
pub mod identifiers;
pub mod interest;
pub mod ports;
pub mod seen;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ColabError, RetryPolicy};
pub use gate::{ActionGate, GateLimits};
pub use identifiers::{AuthToken, BotId, ItemId, PollerId, ProjectId};
pub use interest::{matches, Interests, Tag};
pub use ports::{ApiRequest, ApiResponse, HttpMethod, ItemFeed, ItemVoter, Transport};
pub use seen::SeenSet;
pub use types::{
    ActionReceipt, Activity, BotInfo, BotProfile, HealthStatus, Item, ItemDraft, ItemPage,
    ItemQuery, ItemStatus, KnowledgeEntry, PlatformStats, Project, Registration, Timestamp,
    TrustReport, TrustScore, VoteDirection,
};
