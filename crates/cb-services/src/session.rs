//! # Session context
//!
//! Owned by the top-level controller for one interactive session and
//! dropped when the session ends. Holds the resolved identity and the
//! services, and discards refresh results that a newer refresh of the
//! same target has superseded.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use cb_core::{
    AnonymousIdentity, Comment, CommentTree, Confession, ConfessionView, DeviceProbe, Polarity,
    Result, VotableEntity,
};

use crate::feed::{FeedService, FeedSort};
use crate::identity::{IdentityResolver, Resolution};
use crate::reactions::{ReactionChange, ReactionCoordinator};
use crate::submission::ConfessionDraft;

/// What a refresh reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    Feed,
    Thread(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    target: RefreshTarget,
    generation: u64,
}

/// Monotonic generation counter per refresh target.
#[derive(Debug, Default)]
pub struct RequestGuard {
    generations: DashMap<RefreshTarget, u64>,
}

impl RequestGuard {
    pub fn begin(&self, target: RefreshTarget) -> RequestTicket {
        let mut generation = self.generations.entry(target).or_insert(0);
        *generation += 1;
        RequestTicket { target, generation: *generation }
    }

    /// True while no later request for the same target has begun.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.generations
            .get(&ticket.target)
            .is_some_and(|latest| *latest == ticket.generation)
    }
}

pub struct Session {
    resolver: IdentityResolver,
    probe: Arc<dyn DeviceProbe>,
    reactions: ReactionCoordinator,
    feed: FeedService,
    resolution: OnceCell<Resolution>,
    guard: RequestGuard,
}

impl Session {
    pub fn new(
        resolver: IdentityResolver,
        probe: Arc<dyn DeviceProbe>,
        reactions: ReactionCoordinator,
        feed: FeedService,
    ) -> Self {
        Self {
            resolver,
            probe,
            reactions,
            feed,
            resolution: OnceCell::new(),
            guard: RequestGuard::default(),
        }
    }

    /// Resolves on first use; later calls return the same resolution.
    pub async fn resolution(&self) -> &Resolution {
        self.resolution
            .get_or_init(|| async {
                let fingerprint = self.probe.fingerprint();
                self.resolver.resolve(&fingerprint).await
            })
            .await
    }

    pub async fn identity(&self) -> &AnonymousIdentity {
        &self.resolution().await.identity
    }

    /// `Ok(None)` when a newer feed refresh started meanwhile.
    pub async fn refresh_feed(&self, sort: FeedSort) -> Result<Option<Vec<ConfessionView>>> {
        let ticket = self.guard.begin(RefreshTarget::Feed);
        let viewer = &self.identity().await.id;
        let views = self.feed.fetch_feed(sort, Some(viewer)).await?;
        Ok(self.keep_if_current(&ticket, views))
    }

    /// `Ok(None)` when a newer refresh of this thread started meanwhile.
    pub async fn refresh_thread(&self, confession_id: Uuid) -> Result<Option<Vec<CommentTree>>> {
        let ticket = self.guard.begin(RefreshTarget::Thread(confession_id));
        let viewer = &self.identity().await.id;
        let trees = self.feed.fetch_thread(confession_id, Some(viewer)).await?;
        Ok(self.keep_if_current(&ticket, trees))
    }

    /// Applies the toggle. Callers refresh afterwards to see the counts.
    pub async fn react(&self, entity: VotableEntity, desired: Polarity) -> Result<ReactionChange> {
        let voter = &self.identity().await.id;
        self.reactions.apply_reaction(entity, voter, desired).await
    }

    pub async fn post_confession(&self, draft: ConfessionDraft) -> Result<Confession> {
        let author = &self.identity().await.id;
        self.feed.post_confession(author, draft).await
    }

    pub async fn post_comment(&self, confession_id: Uuid, parent: Option<Uuid>, content: &str) -> Result<Comment> {
        let author = &self.identity().await.id;
        self.feed.post_comment(author, confession_id, parent, content).await
    }

    /// A single confession as this device sees it, wherever it sits in the feed.
    pub async fn confession(&self, id: Uuid) -> Result<ConfessionView> {
        let viewer = &self.identity().await.id;
        self.feed.fetch_confession(id, Some(viewer)).await
    }

    pub async fn comment(&self, id: Uuid) -> Result<Comment> {
        self.feed.load_comment(id).await
    }

    pub fn guard(&self) -> &RequestGuard {
        &self.guard
    }

    fn keep_if_current<T>(&self, ticket: &RequestTicket, value: T) -> Option<T> {
        if self.guard.is_current(ticket) {
            Some(value)
        } else {
            debug!(refresh = ?ticket.target, generation = ticket.generation, "discarding superseded response");
            None
        }
    }
}
