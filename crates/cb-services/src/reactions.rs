//! # Reaction coordination
//!
//! One voter, one entity, at most one reaction row. Clicking the same
//! polarity again retracts it; clicking the other one switches it in place.
//! Nothing is counted here: callers re-read tallies after every change.

use std::sync::Arc;

use tracing::debug;

use cb_core::{AnonymousId, Polarity, ReactionStore, Result, VotableEntity};

/// The mutation that was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChange {
    Added(Polarity),
    Retracted(Polarity),
    Switched { from: Polarity, to: Polarity },
}

impl ReactionChange {
    /// The voter's reaction after the change.
    pub fn resulting(&self) -> Option<Polarity> {
        match self {
            ReactionChange::Added(p) => Some(*p),
            ReactionChange::Retracted(_) => None,
            ReactionChange::Switched { to, .. } => Some(*to),
        }
    }
}

/// Transition function of the per-voter toggle.
pub fn next_state(current: Option<Polarity>, desired: Polarity) -> Option<Polarity> {
    match current {
        Some(existing) if existing == desired => None,
        _ => Some(desired),
    }
}

pub struct ReactionCoordinator {
    store: Arc<dyn ReactionStore>,
}

impl ReactionCoordinator {
    pub fn new(store: Arc<dyn ReactionStore>) -> Self {
        Self { store }
    }

    /// Reads the voter's current reaction, then issues exactly one
    /// insert, delete or update. Store errors are returned untouched.
    pub async fn apply_reaction(
        &self,
        entity: VotableEntity,
        voter_id: &AnonymousId,
        desired: Polarity,
    ) -> Result<ReactionChange> {
        let change = match self.store.find_reaction(entity, voter_id).await? {
            None => {
                self.store.insert_reaction(entity, voter_id, desired).await?;
                ReactionChange::Added(desired)
            }
            Some(existing) if existing.polarity == desired => {
                self.store.delete_reaction(&existing).await?;
                ReactionChange::Retracted(desired)
            }
            Some(existing) => {
                self.store.update_reaction(&existing, desired).await?;
                ReactionChange::Switched { from: existing.polarity, to: desired }
            }
        };

        debug!(%entity, voter = %voter_id, ?change, "reaction applied");
        Ok(change)
    }
}
