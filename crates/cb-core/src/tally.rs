//! Read-time vote aggregation. Counts are always derived from reaction
//! rows, never stored or adjusted locally.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{AnonymousId, Polarity, Vote};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub likes_count: usize,
    pub dislikes_count: usize,
    /// The viewer's own reaction. `None` means no reaction, not a dislike.
    pub viewer_reaction: Option<Polarity>,
}

impl Tally {
    /// Counts votes, keeping only the first row seen for each voter.
    pub fn from_votes(votes: &[Vote], viewer: Option<&AnonymousId>) -> Self {
        let mut seen: HashSet<&AnonymousId> = HashSet::with_capacity(votes.len());
        let mut tally = Tally::default();

        for vote in votes {
            if !seen.insert(&vote.voter_id) {
                continue;
            }
            match vote.polarity {
                Polarity::Like => tally.likes_count += 1,
                Polarity::Dislike => tally.dislikes_count += 1,
            }
            if viewer == Some(&vote.voter_id) {
                tally.viewer_reaction = Some(vote.polarity);
            }
        }
        tally
    }

    /// Net score used for popularity ordering.
    pub fn score(&self) -> i64 {
        self.likes_count as i64 - self.dislikes_count as i64
    }
}
