//! Interest matching.
//!
//! A subscriber declares an [`Interests`] set; an item is relevant when any of
//! its tags appears in that set. The empty set is the unconfigured state and
//! matches everything.
//!
//! Tags are normalised the way the platform normalises them on write: leading
//! and trailing whitespace is trimmed and ASCII letters are lower-cased.
//! Comparison after normalisation is exact string equality.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// A normalised tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Normalises `raw`, returning `None` if nothing is left after trimming.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_ascii_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Tag::new(&raw).ok_or_else(|| serde::de::Error::custom("tag must not be blank"))
    }
}

/// A subscriber's interest set. Order is irrelevant; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interests(BTreeSet<Tag>);

impl Interests {
    /// The unconfigured interest set, which matches every item.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builds an interest set from raw strings, dropping blank entries.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(tags.into_iter().filter_map(Tag::new).collect())
    }

    /// Parses a comma-separated list such as `"rust, infra,ml"`.
    pub fn parse_list(raw: &str) -> Self {
        Self::from_tags(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Returns `true` if an item carrying `item_tags` is relevant.
    pub fn matches<'a, I>(&self, item_tags: I) -> bool
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        matches(item_tags, self)
    }
}

impl std::fmt::Display for Interests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        let joined: Vec<&str> = self.0.iter().map(Tag::as_str).collect();
        f.write_str(&joined.join(","))
    }
}

/// Decides whether an item with `item_tags` is relevant to `interests`.
///
/// Empty `interests` match everything; otherwise the tag sets must intersect.
pub fn matches<'a, I>(item_tags: I, interests: &Interests) -> bool
where
    I: IntoIterator<Item = &'a Tag>,
{
    if interests.is_empty() {
        return true;
    }
    item_tags.into_iter().any(|tag| interests.0.contains(tag))
}
