//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Store adapters report uniqueness violations as `AppError::Conflict` and
//! transient failures as `AppError::Unavailable`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::fingerprint::DeviceFingerprint;
use crate::models::{
    AnonymousId, AnonymousIdentity, Comment, Confession, ConfessionRow, FlatComment, ListOrder,
    NewIdentity, Polarity, Reaction, VotableEntity,
};

/// Remote persistence for anonymous identities.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_fingerprint_hash(&self, fingerprint_hash: &str) -> Result<Option<AnonymousIdentity>>;

    /// Fails with `Conflict` when the id or the fingerprint hash is already taken.
    async fn insert_identity(&self, identity: NewIdentity) -> Result<AnonymousIdentity>;
}

/// Reaction rows for confessions and comments, keyed by (entity, voter).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReactionStore: Send + Sync {
    async fn find_reaction(&self, entity: VotableEntity, voter_id: &AnonymousId) -> Result<Option<Reaction>>;
    async fn insert_reaction(
        &self,
        entity: VotableEntity,
        voter_id: &AnonymousId,
        polarity: Polarity,
    ) -> Result<Reaction>;
    async fn update_reaction(&self, reaction: &Reaction, polarity: Polarity) -> Result<()>;
    async fn delete_reaction(&self, reaction: &Reaction) -> Result<()>;
}

/// Confessions and their comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ConfessionStore: Send + Sync {
    // Confession Operations
    async fn insert_confession(&self, confession: Confession) -> Result<()>;
    async fn get_confession(&self, id: Uuid) -> Result<Option<Confession>>;
    /// Joined with reaction rows and comment counts, ordered by creation time.
    async fn list_confessions(&self, order: ListOrder, limit: usize) -> Result<Vec<ConfessionRow>>;
    /// The same joined read for a single confession.
    async fn get_confession_row(&self, id: Uuid) -> Result<Option<ConfessionRow>>;

    // Comment Operations
    async fn insert_comment(&self, comment: Comment) -> Result<()>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    /// Joined with reaction rows, ascending creation time.
    async fn list_comments(&self, confession_id: Uuid) -> Result<Vec<FlatComment>>;
}

/// Device-scoped persistent key-value cache.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    /// Callers treat failures as non-fatal.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Binary object storage for uploaded media.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes under `name` and returns the public URL.
    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Source of device fingerprint signals.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait DeviceProbe: Send + Sync {
    fn fingerprint(&self) -> DeviceFingerprint;
}

/// Source of candidate ids for new identities.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdSource: Send + Sync {
    fn candidate(&self) -> AnonymousId;
}
