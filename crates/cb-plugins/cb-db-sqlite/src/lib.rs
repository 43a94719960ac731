//! # cb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `cb-core` domain models. One store serves all three record ports:
//! identities, reactions, and confessions with their comments.

use std::str::FromStr;

use async_trait::async_trait;
use cb_core::{
    decode_media_column, encode_media, AnonymousId, AnonymousIdentity, AppError, Comment,
    Confession, ConfessionRow, ConfessionStore, FlatComment, IdentityStore, ListOrder, NewIdentity,
    Polarity, Reaction, ReactionStore, Result, VotableEntity, Vote,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS anonymous_users (
    anonymous_id TEXT PRIMARY KEY,
    device_fingerprint TEXT NOT NULL,
    device_fingerprint_hash TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS confessions (
    id BLOB PRIMARY KEY,
    user_id TEXT NOT NULL,
    content TEXT,
    media_urls TEXT,
    media_type TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS confession_likes (
    id BLOB PRIMARY KEY,
    confession_id BLOB NOT NULL,
    user_id TEXT NOT NULL,
    is_like INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (confession_id, user_id)
);

CREATE TABLE IF NOT EXISTS confession_comments (
    id BLOB PRIMARY KEY,
    confession_id BLOB NOT NULL,
    parent_comment_id BLOB,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS comment_likes (
    id BLOB PRIMARY KEY,
    comment_id BLOB NOT NULL,
    user_id TEXT NOT NULL,
    is_like INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (comment_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_confessions_created ON confessions (created_at);
CREATE INDEX IF NOT EXISTS idx_comments_confession ON confession_comments (confession_id, created_at);
"#;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and applies the schema.
    /// `sqlite::memory:` gives a private database per store.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error)?
            .create_if_missing(true)
            .foreign_keys(true);

        // A single long-lived connection; in-memory databases vanish with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        let store = Self { pool };
        store.migrate().await?;
        info!("sqlite store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await.map_err(db_error)?;
        Ok(())
    }
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(blob).map_err(|e| AppError::Internal(format!("corrupt uuid column: {e}")))
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

/// Uniqueness violations become `Conflict`; everything else is `Unavailable`.
fn db_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(db_err.message().to_string())
        }
        other => AppError::Unavailable(other.to_string()),
    }
}

/// Joined rows for the same confession are adjacent; each vote row is folded in.
fn fold_confession_rows(rows: &[SqliteRow]) -> Result<Vec<ConfessionRow>> {
    let mut out: Vec<ConfessionRow> = Vec::new();
    for row in rows {
        let id = uuid_column(row, "id")?;
        if out.last().map(|r| r.confession.id) != Some(id) {
            let comments_count: i64 = column(row, "comments_count")?;
            out.push(ConfessionRow {
                confession: confession_from_row(row)?,
                votes: Vec::new(),
                comments_count: usize::try_from(comments_count).unwrap_or_default(),
            });
        }
        if let (Some(vote), Some(current)) = (joined_vote(row)?, out.last_mut()) {
            current.votes.push(vote);
        }
    }
    Ok(out)
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(db_error)
}

fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid> {
    blob_to_uuid(&column::<Vec<u8>>(row, name)?)
}

fn id_column(row: &SqliteRow, name: &str) -> Result<AnonymousId> {
    AnonymousId::parse(&column::<String>(row, name)?)
        .map_err(|e| AppError::Internal(format!("{name}: {e}")))
}

/// Table and key column holding reactions for one entity kind.
fn reaction_table(entity: VotableEntity) -> (&'static str, &'static str) {
    match entity {
        VotableEntity::Confession(_) => ("confession_likes", "confession_id"),
        VotableEntity::Comment(_) => ("comment_likes", "comment_id"),
    }
}

/// Reads the optional `voter_id`/`is_like` pair of a LEFT JOIN row.
fn joined_vote(row: &SqliteRow) -> Result<Option<Vote>> {
    let voter: Option<String> = column(row, "voter_id")?;
    let Some(voter) = voter else {
        return Ok(None);
    };
    let is_like: bool = column(row, "is_like")?;
    let voter = AnonymousId::parse(&voter).map_err(|e| AppError::Internal(format!("voter_id: {e}")))?;
    Ok(Some(Vote::new(voter, Polarity::from_is_like(is_like))))
}

fn confession_from_row(row: &SqliteRow) -> Result<Confession> {
    let media: Option<String> = column(row, "media_urls")?;
    Ok(Confession {
        id: uuid_column(row, "id")?,
        author_id: id_column(row, "user_id")?,
        content: column(row, "content")?,
        media: decode_media_column(media.as_deref()),
        created_at: from_micros(column(row, "created_at")?),
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    let parent: Option<Vec<u8>> = column(row, "parent_comment_id")?;
    Ok(Comment {
        id: uuid_column(row, "id")?,
        confession_id: uuid_column(row, "confession_id")?,
        parent_comment_id: parent.as_deref().map(blob_to_uuid).transpose()?,
        author_id: id_column(row, "user_id")?,
        content: column(row, "content")?,
        created_at: from_micros(column(row, "created_at")?),
    })
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn find_by_fingerprint_hash(&self, fingerprint_hash: &str) -> Result<Option<AnonymousIdentity>> {
        let row = sqlx::query(
            "SELECT anonymous_id, device_fingerprint_hash FROM anonymous_users WHERE device_fingerprint_hash = ?",
        )
        .bind(fingerprint_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(|row| {
            Ok(AnonymousIdentity {
                id: id_column(&row, "anonymous_id")?,
                fingerprint_hash: column(&row, "device_fingerprint_hash")?,
            })
        })
        .transpose()
    }

    async fn insert_identity(&self, identity: NewIdentity) -> Result<AnonymousIdentity> {
        sqlx::query(
            "INSERT INTO anonymous_users (anonymous_id, device_fingerprint, device_fingerprint_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(identity.id.as_str())
        .bind(&identity.fingerprint)
        .bind(&identity.fingerprint_hash)
        .bind(to_micros(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(anonymous_id = %identity.id, "identity inserted");
        Ok(AnonymousIdentity { id: identity.id, fingerprint_hash: identity.fingerprint_hash })
    }
}

#[async_trait]
impl ReactionStore for SqliteStore {
    async fn find_reaction(&self, entity: VotableEntity, voter_id: &AnonymousId) -> Result<Option<Reaction>> {
        let (table, key) = reaction_table(entity);
        let sql = format!("SELECT id, is_like, created_at FROM {table} WHERE {key} = ? AND user_id = ?");
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(entity.id()))
            .bind(voter_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(|row| {
            Ok(Reaction {
                id: uuid_column(&row, "id")?,
                entity,
                voter_id: voter_id.clone(),
                polarity: Polarity::from_is_like(column(&row, "is_like")?),
                created_at: from_micros(column(&row, "created_at")?),
            })
        })
        .transpose()
    }

    async fn insert_reaction(
        &self,
        entity: VotableEntity,
        voter_id: &AnonymousId,
        polarity: Polarity,
    ) -> Result<Reaction> {
        let reaction = Reaction {
            id: Uuid::now_v7(),
            entity,
            voter_id: voter_id.clone(),
            polarity,
            created_at: Utc::now(),
        };
        let (table, key) = reaction_table(entity);
        let sql = format!("INSERT INTO {table} (id, {key}, user_id, is_like, created_at) VALUES (?, ?, ?, ?, ?)");
        sqlx::query(&sql)
            .bind(uuid_to_blob(reaction.id))
            .bind(uuid_to_blob(entity.id()))
            .bind(voter_id.as_str())
            .bind(polarity.is_like())
            .bind(to_micros(reaction.created_at))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(reaction)
    }

    async fn update_reaction(&self, reaction: &Reaction, polarity: Polarity) -> Result<()> {
        let (table, _) = reaction_table(reaction.entity);
        let sql = format!("UPDATE {table} SET is_like = ? WHERE id = ?");
        let done = sqlx::query(&sql)
            .bind(polarity.is_like())
            .bind(uuid_to_blob(reaction.id))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if done.rows_affected() == 0 {
            return Err(AppError::NotFound("Reaction".into(), reaction.id.to_string()));
        }
        Ok(())
    }

    async fn delete_reaction(&self, reaction: &Reaction) -> Result<()> {
        let (table, _) = reaction_table(reaction.entity);
        let sql = format!("DELETE FROM {table} WHERE id = ?");
        sqlx::query(&sql)
            .bind(uuid_to_blob(reaction.id))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl ConfessionStore for SqliteStore {
    async fn insert_confession(&self, confession: Confession) -> Result<()> {
        let media_urls = (!confession.media.is_empty()).then(|| encode_media(&confession.media));
        let media_type = confession.media.first().map(|m| match m.kind {
            cb_core::MediaKind::Image => "image",
            cb_core::MediaKind::Video => "video",
        });

        sqlx::query(
            "INSERT INTO confessions (id, user_id, content, media_urls, media_type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(confession.id))
        .bind(confession.author_id.as_str())
        .bind(&confession.content)
        .bind(media_urls)
        .bind(media_type)
        .bind(to_micros(confession.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_confession(&self, id: Uuid) -> Result<Option<Confession>> {
        let row = sqlx::query("SELECT id, user_id, content, media_urls, created_at FROM confessions WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(confession_from_row).transpose()
    }

    /// One joined query; rows for the same confession are adjacent and folded.
    async fn list_confessions(&self, order: ListOrder, limit: usize) -> Result<Vec<ConfessionRow>> {
        let direction = match order {
            ListOrder::NewestFirst => "DESC",
            ListOrder::OldestFirst => "ASC",
        };
        let sql = format!(
            "SELECT c.id, c.user_id, c.content, c.media_urls, c.created_at, \
                    (SELECT COUNT(*) FROM confession_comments cc WHERE cc.confession_id = c.id) AS comments_count, \
                    l.user_id AS voter_id, l.is_like \
             FROM (SELECT * FROM confessions ORDER BY created_at {direction}, id {direction} LIMIT ?) c \
             LEFT JOIN confession_likes l ON l.confession_id = c.id \
             ORDER BY c.created_at {direction}, c.id {direction}, l.created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let out = fold_confession_rows(&rows)?;
        debug!(count = out.len(), "confessions listed");
        Ok(out)
    }

    async fn get_confession_row(&self, id: Uuid) -> Result<Option<ConfessionRow>> {
        let rows = sqlx::query(
            "SELECT c.id, c.user_id, c.content, c.media_urls, c.created_at, \
                    (SELECT COUNT(*) FROM confession_comments cc WHERE cc.confession_id = c.id) AS comments_count, \
                    l.user_id AS voter_id, l.is_like \
             FROM confessions c \
             LEFT JOIN confession_likes l ON l.confession_id = c.id \
             WHERE c.id = ? \
             ORDER BY l.created_at ASC",
        )
        .bind(uuid_to_blob(id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(fold_confession_rows(&rows)?.into_iter().next())
    }

    async fn insert_comment(&self, comment: Comment) -> Result<()> {
        sqlx::query(
            "INSERT INTO confession_comments (id, confession_id, parent_comment_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(comment.id))
        .bind(uuid_to_blob(comment.confession_id))
        .bind(comment.parent_comment_id.map(uuid_to_blob))
        .bind(comment.author_id.as_str())
        .bind(&comment.content)
        .bind(to_micros(comment.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, confession_id, parent_comment_id, user_id, content, created_at FROM confession_comments WHERE id = ?",
        )
        .bind(uuid_to_blob(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn list_comments(&self, confession_id: Uuid) -> Result<Vec<FlatComment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.confession_id, c.parent_comment_id, c.user_id, c.content, c.created_at, \
                    l.user_id AS voter_id, l.is_like \
             FROM confession_comments c \
             LEFT JOIN comment_likes l ON l.comment_id = c.id \
             WHERE c.confession_id = ? \
             ORDER BY c.created_at ASC, c.id ASC, l.created_at ASC",
        )
        .bind(uuid_to_blob(confession_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut out: Vec<FlatComment> = Vec::new();
        for row in &rows {
            let id = uuid_column(row, "id")?;
            if out.last().map(|c| c.comment.id) != Some(id) {
                out.push(FlatComment { comment: comment_from_row(row)?, votes: Vec::new() });
            }
            if let (Some(vote), Some(current)) = (joined_vote(row)?, out.last_mut()) {
                current.votes.push(vote);
            }
        }
        Ok(out)
    }
}
