//! Interest-driven poll engine.
//!
//! Repeatedly fetches recent items through a [`colab::ItemFeed`], drops the
//! ones already seen, filters the rest by subscriber interests, and hands each
//! match to an [`ActivityHandler`].
//!
//! ## Architectural Layer
//!
//! **Orchestration.** Depends only on the ports in `colab`; the HTTP client is
//! injected by the composition root.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`handler`] | `ActivityHandler` trait and the closure adapter |
//! | [`config`] | `PollConfig`, its builder, and environment loader |
//! | [`policy`] | `Backoff` and `AutoActions` |
//! | [`cycle`] | `PollCycle`: one fetch-filter-dispatch pass |
//! | [`poller`] | Poll loop, `PollHandle`, and the `Watcher` facade |

pub mod config;
pub mod cycle;
pub mod handler;
pub mod poller;
pub mod policy;

#[cfg(test)]
mod testing;

pub use config::{PollConfig, PollConfigBuilder};
pub use cycle::{CycleReport, PollCycle};
pub use handler::{from_fn, ActivityHandler, FnHandler, HandlerError};
pub use poller::{start_polling, LoopState, PollHandle, PollSummary, Watcher};
pub use policy::{AutoActions, Backoff};
