//! # Thread assembly
//!
//! Turns the flat, joined comment listing of one confession into parents
//! with their direct replies. Pure data transformation, no I/O.
//!
//! Nesting is one level deep. A reply to a reply is attached to the
//! top-level ancestor of its chain; a reply whose chain does not reach a
//! top-level comment in `rows` is dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AnonymousId, Comment, FlatComment};
use crate::tally::Tally;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(flatten)]
    pub tally: Tally,
}

impl CommentView {
    fn from_flat(row: &FlatComment, viewer: Option<&AnonymousId>) -> Self {
        Self {
            comment: row.comment.clone(),
            tally: Tally::from_votes(&row.votes, viewer),
        }
    }
}

/// A top-level comment and its replies, both in ascending creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentTree {
    #[serde(flatten)]
    pub parent: CommentView,
    pub replies: Vec<CommentView>,
}

/// Follows parent links until a top-level comment is reached.
/// Returns `None` for missing parents and for cycles.
fn top_level_ancestor(start: Uuid, parents: &HashMap<Uuid, Option<Uuid>>) -> Option<Uuid> {
    let mut current = start;
    for _ in 0..=parents.len() {
        match parents.get(&current)? {
            None => return Some(current),
            Some(next) => current = *next,
        }
    }
    None
}

pub fn assemble(rows: &[FlatComment], viewer: Option<&AnonymousId>) -> Vec<CommentTree> {
    let mut ordered: Vec<&FlatComment> = rows.iter().collect();
    // Stable: rows sharing a timestamp keep their listing order.
    ordered.sort_by_key(|row| row.comment.created_at);

    let parents: HashMap<Uuid, Option<Uuid>> = ordered
        .iter()
        .map(|row| (row.comment.id, row.comment.parent_comment_id))
        .collect();

    let mut trees: Vec<CommentTree> = Vec::new();
    let mut slot: HashMap<Uuid, usize> = HashMap::new();

    for row in ordered.iter().filter(|row| !row.comment.is_reply()) {
        slot.insert(row.comment.id, trees.len());
        trees.push(CommentTree {
            parent: CommentView::from_flat(row, viewer),
            replies: Vec::new(),
        });
    }

    for row in ordered.iter().filter(|row| row.comment.is_reply()) {
        let root = row
            .comment
            .parent_comment_id
            .and_then(|parent| top_level_ancestor(parent, &parents));
        if let Some(index) = root.and_then(|id| slot.get(&id)) {
            trees[*index].replies.push(CommentView::from_flat(row, viewer));
        }
    }

    trees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Polarity, Vote};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(offset)
    }

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn row(id: u128, parent: Option<u128>, offset: i64) -> FlatComment {
        FlatComment {
            comment: Comment {
                id: uid(id),
                confession_id: uid(999),
                parent_comment_id: parent.map(uid),
                author_id: AnonymousId::parse("12345").unwrap(),
                content: format!("comment {id}"),
                created_at: at(offset),
            },
            votes: Vec::new(),
        }
    }

    fn ids(views: &[CommentView]) -> Vec<Uuid> {
        views.iter().map(|v| v.comment.id).collect()
    }

    #[test]
    fn test_parents_and_replies_in_creation_order() {
        let rows = vec![row(1, None, 0), row(2, Some(1), 1), row(3, Some(1), 2), row(4, None, 3)];
        let trees = assemble(&rows, None);

        let parents: Vec<Uuid> = trees.iter().map(|t| t.parent.comment.id).collect();
        assert_eq!(parents, vec![uid(1), uid(4)]);
        assert_eq!(ids(&trees[0].replies), vec![uid(2), uid(3)]);
        assert!(trees[1].replies.is_empty());
    }

    #[test]
    fn test_unsorted_input_is_ordered_by_creation_time() {
        let rows = vec![row(4, None, 3), row(3, Some(1), 2), row(1, None, 0), row(2, Some(1), 1)];
        let trees = assemble(&rows, None);
        assert_eq!(trees[0].parent.comment.id, uid(1));
        assert_eq!(ids(&trees[0].replies), vec![uid(2), uid(3)]);
    }

    #[test]
    fn test_orphan_reply_is_dropped() {
        let rows = vec![row(1, None, 0), row(2, Some(77), 1)];
        let trees = assemble(&rows, None);
        assert_eq!(trees.len(), 1);
        assert!(trees[0].replies.is_empty());
    }

    #[test]
    fn test_reply_to_reply_is_flattened_under_top_level() {
        let rows = vec![row(1, None, 0), row(2, Some(1), 1), row(3, Some(2), 2)];
        let trees = assemble(&rows, None);
        assert_eq!(trees.len(), 1);
        assert_eq!(ids(&trees[0].replies), vec![uid(2), uid(3)]);
    }

    #[test]
    fn test_cycle_is_dropped() {
        let rows = vec![row(1, Some(2), 0), row(2, Some(1), 1), row(3, None, 2)];
        let trees = assemble(&rows, None);
        assert_eq!(trees.len(), 1);
        assert!(trees[0].replies.is_empty());
    }

    #[test]
    fn test_tallies_and_viewer_reaction() {
        let viewer = AnonymousId::parse("55555").unwrap();
        let mut parent = row(1, None, 0);
        parent.votes = vec![
            Vote::new(viewer.clone(), Polarity::Dislike),
            Vote::new(AnonymousId::parse("66666").unwrap(), Polarity::Like),
        ];
        let mut reply = row(2, Some(1), 1);
        reply.votes = vec![Vote::new(AnonymousId::parse("66666").unwrap(), Polarity::Like)];

        let trees = assemble(&[parent, reply], Some(&viewer));
        let tally = trees[0].parent.tally;
        assert_eq!((tally.likes_count, tally.dislikes_count), (1, 1));
        assert_eq!(tally.viewer_reaction, Some(Polarity::Dislike));
        assert_eq!(trees[0].replies[0].tally.viewer_reaction, None);

        let anonymous = assemble(&[row(1, None, 0)], None);
        assert_eq!(anonymous[0].parent.tally.viewer_reaction, None);
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(&[], None).is_empty());
    }
}
