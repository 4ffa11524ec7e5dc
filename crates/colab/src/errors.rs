//! Error and retry-policy types for the ClawColab client.
//!
//! [`ColabError`] is the single taxonomy surfaced by every operation. The
//! variants split into two families so callers can tell "never sent" from
//! "sent and refused":
//!
//! - **Local**: [`ColabError::Unauthenticated`], [`ColabError::Validation`],
//!   [`ColabError::Policy`], [`ColabError::Configuration`]. No request left
//!   the process.
//! - **Remote / transport**: everything else.
//!
//! [`RetryPolicy`] tells the poll loop (or any caller) whether re-issuing the
//! operation can help.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: network failures, timeouts, 5xx responses, rate
///   limiting, undecodable bodies.
/// - `NonRetryable` errors: local gate rejections, authentication failures,
///   4xx policy rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt, when the platform said so
        /// (`Retry-After`). `None` means apply the caller's own schedule.
        after: Option<Duration>,
    },
    /// Retrying the same request cannot succeed.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Client errors
// ---------------------------------------------------------------------------

/// Every failure an SDK operation or a poll cycle can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColabError {
    /// The request could not be completed: connection failure, DNS, TLS, or
    /// the per-request timeout elapsed.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// `true` when the failure was the request timeout.
        timed_out: bool,
    },

    /// The platform rejected registration or the presented credentials.
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    /// An authenticated operation was attempted with no stored token.
    /// Detected before any network call.
    #[error("'{operation}' requires authentication but no token is set")]
    Unauthenticated { operation: String },

    /// A deterministic local check failed (length, count).
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// A policy check against locally known state failed (trust threshold).
    #[error("policy violation: {message}")]
    Policy { message: String },

    /// The platform answered with a non-success status despite local gating.
    /// `message` is the response body verbatim.
    #[error("remote rejected request ({status}): {message}")]
    RemoteRejection {
        status: u16,
        message: String,
        /// Parsed `Retry-After`, when present.
        retry_after: Option<Duration>,
    },

    /// A success response whose body could not be decoded.
    #[error("malformed response from '{path}': {message}")]
    MalformedResponse { path: String, message: String },

    /// A subscriber handler failed or panicked while processing an activity.
    #[error("handler failed: {message}")]
    Handler { message: String },

    /// Invalid client or poll configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl ColabError {
    /// Shorthand for a [`ColabError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        ColabError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`ColabError::Policy`].
    pub fn policy(message: impl Into<String>) -> Self {
        ColabError::Policy {
            message: message.into(),
        }
    }

    /// Shorthand for a non-timeout [`ColabError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        ColabError::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Shorthand for a [`ColabError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        ColabError::Configuration {
            message: message.into(),
        }
    }

    /// Returns `false` when the operation failed before any request was sent.
    pub fn was_sent(&self) -> bool {
        !matches!(
            self,
            ColabError::Unauthenticated { .. }
                | ColabError::Validation { .. }
                | ColabError::Policy { .. }
                | ColabError::Configuration { .. }
        )
    }

    /// Classifies the error for retry decisions.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            ColabError::Transport { .. } | ColabError::MalformedResponse { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            ColabError::RemoteRejection {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            // A handler may succeed on a later item even if this one failed.
            ColabError::Handler { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_errors_were_never_sent() {
        assert!(!ColabError::validation("comment too long").was_sent());
        assert!(!ColabError::policy("insufficient trust").was_sent());
        assert!(!ColabError::Unauthenticated {
            operation: "vote".into()
        }
        .was_sent());
        assert!(ColabError::RemoteRejection {
            status: 403,
            message: "no".into(),
            retry_after: None
        }
        .was_sent());
    }

    #[test]
    fn retry_policy_follows_status_class() {
        let server = ColabError::RemoteRejection {
            status: 503,
            message: String::new(),
            retry_after: None,
        };
        let limited = ColabError::RemoteRejection {
            status: 429,
            message: String::new(),
            retry_after: Some(Duration::from_secs(7)),
        };
        let refused = ColabError::RemoteRejection {
            status: 422,
            message: String::new(),
            retry_after: None,
        };

        assert_eq!(server.retry_policy(), RetryPolicy::Retryable { after: None });
        assert_eq!(
            limited.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(7))
            }
        );
        assert_eq!(refused.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(
            ColabError::transport("reset").retry_policy(),
            RetryPolicy::Retryable { after: None }
        );
        assert_eq!(
            ColabError::Auth {
                status: 401,
                message: String::new()
            }
            .retry_policy(),
            RetryPolicy::NonRetryable
        );
    }
}
