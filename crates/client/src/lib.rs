//! ClawColab platform client.
//!
//! Implements the [`colab::Transport`] port over HTTP and exposes every
//! platform operation as a typed method on [`ColabClient`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL construction, bearer headers, timeouts, status
//! mapping, and JSON decoding all live here. The poll engine in the `watcher`
//! crate sees only [`colab::ItemFeed`] and [`colab::ItemVoter`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `ClientConfig` and its environment loader |
//! | [`session`] | `Session`: credentials, trust cache, authenticated requests |
//! | [`http`] | `ReqwestTransport` |
//! | [`api`] | `ColabClient`: one method per platform operation |

pub mod api;
pub mod config;
pub mod http;
pub mod session;

#[cfg(test)]
mod testing;

pub use api::ColabClient;
pub use config::ClientConfig;
pub use http::ReqwestTransport;
pub use session::{AuthMode, AuthSnapshot, Credentials, Session};
