//! Client-side action gate.
//!
//! Mirrors the subset of platform policy that can be checked locally so an
//! invalid action fails before a network round trip. The gate is a latency
//! optimisation, not an authority: passing it never guarantees the platform
//! will accept the action, and callers must still handle
//! [`ColabError::RemoteRejection`].
//!
//! Two kinds of rule exist:
//!
//! - **Deterministic** rules (lengths, counts) are always enforced.
//! - **State-dependent** rules (trust thresholds) are enforced only when the
//!   relevant state is known locally; unknown state passes through.

use tracing::debug;

use crate::{ColabError, ItemDraft, TrustScore, VoteDirection};

/// Numeric limits enforced by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct GateLimits {
    pub max_comment_chars: usize,
    pub min_downvote_trust: f64,
    pub title_chars: std::ops::RangeInclusive<usize>,
    pub description_chars: std::ops::RangeInclusive<usize>,
    pub tag_count: std::ops::RangeInclusive<usize>,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            max_comment_chars: 500,
            min_downvote_trust: 5.0,
            title_chars: 30..=150,
            description_chars: 200..=1500,
            tag_count: 3..=5,
        }
    }
}

/// Local pre-validation for mutating actions.
#[derive(Debug, Clone, Default)]
pub struct ActionGate {
    limits: GateLimits,
}

impl ActionGate {
    pub fn new(limits: GateLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &GateLimits {
        &self.limits
    }

    /// Rejects comments longer than the platform accepts.
    pub fn check_comment(&self, content: &str) -> Result<(), ColabError> {
        let chars = content.chars().count();
        if chars > self.limits.max_comment_chars {
            debug!(chars, max = self.limits.max_comment_chars, "gate rejected comment");
            return Err(ColabError::validation("comment too long"));
        }
        Ok(())
    }

    /// Rejects a downvote when the actor's trust is known and too low.
    ///
    /// `known_trust` is the locally cached score; `None` defers to the
    /// platform.
    pub fn check_vote(
        &self,
        direction: VoteDirection,
        known_trust: Option<TrustScore>,
    ) -> Result<(), ColabError> {
        if direction != VoteDirection::Down {
            return Ok(());
        }
        match known_trust {
            Some(score) if !score.meets(self.limits.min_downvote_trust) => {
                debug!(%score, required = self.limits.min_downvote_trust, "gate rejected downvote");
                Err(ColabError::policy("insufficient trust"))
            }
            _ => Ok(()),
        }
    }

    /// Checks title, description, and tag-count bounds of a new item.
    pub fn check_item(&self, draft: &ItemDraft) -> Result<(), ColabError> {
        check_range("title", draft.title.chars().count(), &self.limits.title_chars, "characters")?;
        check_range(
            "description",
            draft.description.chars().count(),
            &self.limits.description_chars,
            "characters",
        )?;
        check_range("tags", draft.tags.len(), &self.limits.tag_count, "entries")
    }
}

fn check_range(
    field: &str,
    actual: usize,
    bounds: &std::ops::RangeInclusive<usize>,
    unit: &str,
) -> Result<(), ColabError> {
    if bounds.contains(&actual) {
        return Ok(());
    }
    let below = actual < *bounds.start();
    let problem = match (field, below) {
        ("tags", true) => "too few tags".to_owned(),
        ("tags", false) => "too many tags".to_owned(),
        (_, true) => format!("{field} too short"),
        (_, false) => format!("{field} too long"),
    };
    Err(ColabError::validation(format!(
        "{problem}: {actual} (expected {}-{} {unit})",
        bounds.start(),
        bounds.end()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: usize, description: usize, tags: usize) -> ItemDraft {
        ItemDraft {
            title: "t".repeat(title),
            description: "d".repeat(description),
            tags: (0..tags).map(|i| format!("tag{i}")).collect(),
        }
    }

    #[test]
    fn comment_boundary_is_500_characters() {
        let gate = ActionGate::default();
        assert!(gate.check_comment(&"x".repeat(500)).is_ok());
        assert_eq!(
            gate.check_comment(&"x".repeat(501)),
            Err(ColabError::validation("comment too long"))
        );
    }

    #[test]
    fn comment_length_counts_characters_not_bytes() {
        let gate = ActionGate::default();
        assert!(gate.check_comment(&"é".repeat(500)).is_ok());
    }

    #[test]
    fn downvote_with_low_known_trust_is_rejected() {
        let gate = ActionGate::default();
        let low = TrustScore::new(3.0);
        let enough = TrustScore::new(5.0);

        assert_eq!(
            gate.check_vote(VoteDirection::Down, low),
            Err(ColabError::policy("insufficient trust"))
        );
        assert!(gate.check_vote(VoteDirection::Down, enough).is_ok());
        assert!(gate.check_vote(VoteDirection::Up, low).is_ok());
    }

    #[test]
    fn downvote_with_unknown_trust_passes_through() {
        assert!(ActionGate::default().check_vote(VoteDirection::Down, None).is_ok());
    }

    #[test]
    fn item_bounds_are_inclusive() {
        let gate = ActionGate::default();
        assert!(gate.check_item(&draft(30, 200, 3)).is_ok());
        assert!(gate.check_item(&draft(150, 1500, 5)).is_ok());
    }

    #[test]
    fn item_bounds_reject_each_field() {
        let gate = ActionGate::default();
        let cases = [
            (draft(29, 200, 3), "title too short"),
            (draft(151, 200, 3), "title too long"),
            (draft(30, 199, 3), "description too short"),
            (draft(30, 1501, 3), "description too long"),
            (draft(30, 200, 2), "too few tags"),
            (draft(30, 200, 6), "too many tags"),
        ];
        for (input, expected) in cases {
            match gate.check_item(&input) {
                Err(ColabError::Validation { message }) => {
                    assert!(message.starts_with(expected), "{message}")
                }
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }
}
