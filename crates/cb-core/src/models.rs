//! # Domain Models
//!
//! These structs represent the core entities of Confession Board.
//! Confessions, comments and reactions use UUID v7 for time-ordered,
//! globally unique identification. Voters are identified by their
//! 5-digit anonymous id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::media::MediaItem;
use crate::tally::Tally;

/// A 5-digit pseudonymous identifier in the range 10000..=99999.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnonymousId(String);

impl AnonymousId {
    pub const MIN: u32 = 10_000;
    pub const MAX: u32 = 99_999;

    /// Parses a cached or stored value. Anything other than exactly five
    /// ASCII digits with a non-zero lead is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let valid = trimmed.len() == 5
            && trimmed.bytes().all(|b| b.is_ascii_digit())
            && !trimmed.starts_with('0');
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(AppError::validation(format!("invalid anonymous id: {raw:?}")))
        }
    }

    /// Clamps `n` into the valid range.
    pub fn saturating(n: u32) -> Self {
        Self(n.clamp(Self::MIN, Self::MAX).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnonymousId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AnonymousId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AnonymousId> for String {
    fn from(id: AnonymousId) -> Self {
        id.0
    }
}

/// The identity a device settles on. Never mutated once cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousIdentity {
    pub id: AnonymousId,
    pub fingerprint_hash: String,
}

/// Row written when a device claims a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
    pub id: AnonymousId,
    /// Truncated raw fingerprint, kept for diagnostics only
    pub fingerprint: String,
    pub fingerprint_hash: String,
}

/// Like or dislike. Stored as `is_like` by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn from_is_like(is_like: bool) -> Self {
        if is_like {
            Polarity::Like
        } else {
            Polarity::Dislike
        }
    }

    pub fn is_like(self) -> bool {
        matches!(self, Polarity::Like)
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Like => f.write_str("like"),
            Polarity::Dislike => f.write_str("dislike"),
        }
    }
}

/// Anything that accumulates reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VotableEntity {
    Confession(Uuid),
    Comment(Uuid),
}

impl VotableEntity {
    pub fn id(&self) -> Uuid {
        match self {
            VotableEntity::Confession(id) | VotableEntity::Comment(id) => *id,
        }
    }
}

impl fmt::Display for VotableEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotableEntity::Confession(id) => write!(f, "confession:{id}"),
            VotableEntity::Comment(id) => write!(f, "comment:{id}"),
        }
    }
}

/// A single voter's polarity toward one entity.
/// At most one row exists per (entity, voter_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub entity: VotableEntity,
    pub voter_id: AnonymousId,
    pub polarity: Polarity,
    pub created_at: DateTime<Utc>,
}

/// The slice of a reaction row that travels with list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: AnonymousId,
    pub polarity: Polarity,
}

impl Vote {
    pub fn new(voter_id: AnonymousId, polarity: Polarity) -> Self {
        Self { voter_id, polarity }
    }
}

/// A top-level post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confession {
    pub id: Uuid,
    pub author_id: AnonymousId,
    pub content: Option<String>,
    pub media: Vec<MediaItem>,
    pub created_at: DateTime<Utc>,
}

/// A confession as it comes back from a joined listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfessionRow {
    pub confession: Confession,
    pub votes: Vec<Vote>,
    pub comments_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub confession_id: Uuid,
    /// `None` for a top-level comment, the parent's id for a reply
    pub parent_comment_id: Option<Uuid>,
    pub author_id: AnonymousId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

/// A comment row decorated with its own reaction rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatComment {
    pub comment: Comment,
    pub votes: Vec<Vote>,
}

/// A confession decorated for display: counts and the viewer's reaction
/// are derived from the joined rows of the latest read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfessionView {
    #[serde(flatten)]
    pub confession: Confession,
    #[serde(flatten)]
    pub tally: Tally,
    pub comments_count: usize,
}

impl ConfessionView {
    pub fn from_row(row: ConfessionRow, viewer: Option<&AnonymousId>) -> Self {
        let tally = Tally::from_votes(&row.votes, viewer);
        Self {
            confession: row.confession,
            tally,
            comments_count: row.comments_count,
        }
    }
}

/// Creation-time ordering requested from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOrder {
    NewestFirst,
    OldestFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_id_parse() {
        assert_eq!(AnonymousId::parse("12345").unwrap().as_str(), "12345");
        assert_eq!(AnonymousId::parse(" 99999\n").unwrap().as_str(), "99999");
        assert!(AnonymousId::parse("01234").is_err());
        assert!(AnonymousId::parse("1234").is_err());
        assert!(AnonymousId::parse("123456").is_err());
        assert!(AnonymousId::parse("12a45").is_err());
    }

    #[test]
    fn test_anonymous_id_saturating_bounds() {
        assert_eq!(AnonymousId::saturating(10_000).as_str(), "10000");
        assert_eq!(AnonymousId::saturating(5).as_str(), "10000");
        assert_eq!(AnonymousId::saturating(u32::MAX).as_str(), "99999");
    }

    #[test]
    fn test_votable_entity_serde_shape() {
        let id = Uuid::now_v7();
        let json = serde_json::to_value(VotableEntity::Comment(id)).unwrap();
        assert_eq!(json["kind"], "comment");
        assert_eq!(json["id"], id.to_string());
    }
}
