//! # Feed service
//!
//! Reads and writes confessions and comments. Every read rebuilds counts
//! from the joined reaction rows; nothing is incremented locally.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use cb_core::{
    assemble, AnonymousId, AppError, Comment, CommentTree, Confession, ConfessionStore,
    ConfessionView, ListOrder, MediaItem, MediaStore, Result,
};

use crate::submission::{self, ConfessionDraft, SubmissionLimits};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Reply chains longer than this are refused rather than followed.
const MAX_REPLY_HOPS: usize = 32;

/// Top-level feed ordering. Comments are always chronological.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedSort {
    #[default]
    Latest,
    Oldest,
    Popular,
}

impl FromStr for FeedSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(FeedSort::Latest),
            "oldest" => Ok(FeedSort::Oldest),
            "popular" => Ok(FeedSort::Popular),
            other => Err(AppError::validation(format!("unknown sort option: {other}"))),
        }
    }
}

impl fmt::Display for FeedSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedSort::Latest => "latest",
            FeedSort::Oldest => "oldest",
            FeedSort::Popular => "popular",
        };
        f.write_str(name)
    }
}

pub struct FeedService {
    store: Arc<dyn ConfessionStore>,
    media: Arc<dyn MediaStore>,
    limits: SubmissionLimits,
    page_size: usize,
}

impl FeedService {
    pub fn new(store: Arc<dyn ConfessionStore>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            store,
            media,
            limits: SubmissionLimits::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_limits(mut self, limits: SubmissionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn fetch_feed(&self, sort: FeedSort, viewer: Option<&AnonymousId>) -> Result<Vec<ConfessionView>> {
        let order = match sort {
            FeedSort::Oldest => ListOrder::OldestFirst,
            FeedSort::Latest | FeedSort::Popular => ListOrder::NewestFirst,
        };
        let rows = self.store.list_confessions(order, self.page_size).await?;
        let mut views: Vec<ConfessionView> = rows
            .into_iter()
            .map(|row| ConfessionView::from_row(row, viewer))
            .collect();

        if sort == FeedSort::Popular {
            // Stable: equal scores stay newest first.
            views.sort_by_key(|view| Reverse(view.tally.score()));
        }
        debug!(%sort, count = views.len(), "feed fetched");
        Ok(views)
    }

    /// One confession with counts rebuilt from its reaction rows, paged or not.
    pub async fn fetch_confession(&self, id: Uuid, viewer: Option<&AnonymousId>) -> Result<ConfessionView> {
        let row = self
            .store
            .get_confession_row(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Confession".into(), id.to_string()))?;
        Ok(ConfessionView::from_row(row, viewer))
    }

    pub async fn fetch_thread(&self, confession_id: Uuid, viewer: Option<&AnonymousId>) -> Result<Vec<CommentTree>> {
        let rows = self.store.list_comments(confession_id).await?;
        Ok(assemble(&rows, viewer))
    }

    /// Validates, uploads every attachment, then inserts the confession.
    /// A single failed upload fails the whole post.
    pub async fn post_confession(&self, author: &AnonymousId, draft: ConfessionDraft) -> Result<Confession> {
        let valid = submission::validate_confession(draft, &self.limits)?;

        let stamp = Utc::now().timestamp_millis();
        let mut media = Vec::with_capacity(valid.attachments.len());
        for (index, (attachment, kind)) in valid.attachments.into_iter().enumerate() {
            let name = submission::upload_name(author, stamp, index, &attachment);
            let url = self
                .media
                .put(&name, attachment.bytes, &attachment.content_type)
                .await?;
            media.push(MediaItem { url, kind });
        }

        let confession = Confession {
            id: Uuid::now_v7(),
            author_id: author.clone(),
            content: valid.content,
            media,
            created_at: Utc::now(),
        };
        self.store.insert_confession(confession.clone()).await?;

        info!(confession_id = %confession.id, author = %author, media = confession.media.len(), "confession posted");
        Ok(confession)
    }

    /// Posts a top-level comment, or a reply when `parent` is given.
    /// Replies to replies are re-pointed at the top-level comment.
    pub async fn post_comment(
        &self,
        author: &AnonymousId,
        confession_id: Uuid,
        parent: Option<Uuid>,
        content: &str,
    ) -> Result<Comment> {
        let content = submission::validate_comment(content)?;

        if self.store.get_confession(confession_id).await?.is_none() {
            return Err(AppError::NotFound("Confession".into(), confession_id.to_string()));
        }

        let parent_comment_id = match parent {
            Some(parent_id) => Some(self.reply_target(confession_id, parent_id).await?),
            None => None,
        };

        let comment = Comment {
            id: Uuid::now_v7(),
            confession_id,
            parent_comment_id,
            author_id: author.clone(),
            content,
            created_at: Utc::now(),
        };
        self.store.insert_comment(comment.clone()).await?;

        info!(comment_id = %comment.id, %confession_id, reply = comment.is_reply(), "comment posted");
        Ok(comment)
    }

    async fn reply_target(&self, confession_id: Uuid, parent_id: Uuid) -> Result<Uuid> {
        let mut current = self.load_comment(parent_id).await?;
        if current.confession_id != confession_id {
            return Err(AppError::validation(format!(
                "comment {parent_id} belongs to another confession"
            )));
        }

        for _ in 0..MAX_REPLY_HOPS {
            let Some(up) = current.parent_comment_id else {
                if current.id != parent_id {
                    debug!(requested = %parent_id, flattened = %current.id, "reply re-pointed at top-level comment");
                }
                return Ok(current.id);
            };
            current = self.load_comment(up).await?;
        }
        Err(AppError::validation(format!("reply chain under {parent_id} is too deep")))
    }

    pub async fn load_comment(&self, id: Uuid) -> Result<Comment> {
        self.store
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment".into(), id.to_string()))
    }
}
