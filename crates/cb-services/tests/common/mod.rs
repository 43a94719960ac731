//! In-memory doubles for the cb-core ports, shared by the service tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use cb_core::{
    AnonymousId, AnonymousIdentity, AppError, Comment, Confession, ConfessionRow, ConfessionStore,
    DeviceFingerprint, DeviceProbe, FlatComment, IdentityStore, KeyValueCache, ListOrder,
    MediaStore, NewIdentity, Polarity, Reaction, ReactionStore, Result, VotableEntity, Vote,
};

/// Record store with the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct InMemoryStore {
    identities: Mutex<Vec<AnonymousIdentity>>,
    reactions: Mutex<Vec<Reaction>>,
    confessions: Mutex<Vec<Confession>>,
    comments: Mutex<Vec<Comment>>,
    pub identity_lookups: AtomicUsize,
    pub identity_inserts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reactions_for(&self, entity: VotableEntity) -> Vec<Reaction> {
        self.reactions
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.entity == entity)
            .cloned()
            .collect()
    }

    pub fn seed_confession(&self, author: &AnonymousId, content: &str, created_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::now_v7();
        self.confessions.lock().unwrap().push(Confession {
            id,
            author_id: author.clone(),
            content: Some(content.to_string()),
            media: Vec::new(),
            created_at,
        });
        id
    }

    pub fn seed_vote(&self, entity: VotableEntity, voter: &AnonymousId, polarity: Polarity) {
        self.reactions.lock().unwrap().push(Reaction {
            id: Uuid::now_v7(),
            entity,
            voter_id: voter.clone(),
            polarity,
            created_at: Utc::now(),
        });
    }

    pub fn confession_count(&self) -> usize {
        self.confessions.lock().unwrap().len()
    }

    fn votes_for(&self, entity: VotableEntity) -> Vec<Vote> {
        self.reactions_for(entity)
            .into_iter()
            .map(|r| Vote::new(r.voter_id, r.polarity))
            .collect()
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_by_fingerprint_hash(&self, fingerprint_hash: &str) -> Result<Option<AnonymousIdentity>> {
        self.identity_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.fingerprint_hash == fingerprint_hash)
            .cloned())
    }

    async fn insert_identity(&self, identity: NewIdentity) -> Result<AnonymousIdentity> {
        self.identity_inserts.fetch_add(1, Ordering::SeqCst);
        let mut identities = self.identities.lock().unwrap();
        if identities
            .iter()
            .any(|i| i.id == identity.id || i.fingerprint_hash == identity.fingerprint_hash)
        {
            return Err(AppError::Conflict(format!("anonymous_id {}", identity.id)));
        }
        let stored = AnonymousIdentity { id: identity.id, fingerprint_hash: identity.fingerprint_hash };
        identities.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl ReactionStore for InMemoryStore {
    async fn find_reaction(&self, entity: VotableEntity, voter_id: &AnonymousId) -> Result<Option<Reaction>> {
        Ok(self
            .reactions
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.entity == entity && &r.voter_id == voter_id)
            .cloned())
    }

    async fn insert_reaction(&self, entity: VotableEntity, voter_id: &AnonymousId, polarity: Polarity) -> Result<Reaction> {
        let mut reactions = self.reactions.lock().unwrap();
        if reactions.iter().any(|r| r.entity == entity && &r.voter_id == voter_id) {
            return Err(AppError::Conflict(format!("{entity} already has a reaction from {voter_id}")));
        }
        let reaction = Reaction {
            id: Uuid::now_v7(),
            entity,
            voter_id: voter_id.clone(),
            polarity,
            created_at: Utc::now(),
        };
        reactions.push(reaction.clone());
        Ok(reaction)
    }

    async fn update_reaction(&self, reaction: &Reaction, polarity: Polarity) -> Result<()> {
        let mut reactions = self.reactions.lock().unwrap();
        let row = reactions
            .iter_mut()
            .find(|r| r.id == reaction.id)
            .ok_or_else(|| AppError::NotFound("Reaction".into(), reaction.id.to_string()))?;
        row.polarity = polarity;
        Ok(())
    }

    async fn delete_reaction(&self, reaction: &Reaction) -> Result<()> {
        self.reactions.lock().unwrap().retain(|r| r.id != reaction.id);
        Ok(())
    }
}

#[async_trait]
impl ConfessionStore for InMemoryStore {
    async fn insert_confession(&self, confession: Confession) -> Result<()> {
        self.confessions.lock().unwrap().push(confession);
        Ok(())
    }

    async fn get_confession(&self, id: Uuid) -> Result<Option<Confession>> {
        Ok(self.confessions.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn list_confessions(&self, order: ListOrder, limit: usize) -> Result<Vec<ConfessionRow>> {
        let mut confessions = self.confessions.lock().unwrap().clone();
        match order {
            ListOrder::NewestFirst => confessions.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ListOrder::OldestFirst => confessions.sort_by_key(|c| c.created_at),
        }
        let comments = self.comments.lock().unwrap().clone();
        Ok(confessions
            .into_iter()
            .take(limit)
            .map(|confession| ConfessionRow {
                votes: self.votes_for(VotableEntity::Confession(confession.id)),
                comments_count: comments.iter().filter(|c| c.confession_id == confession.id).count(),
                confession,
            })
            .collect())
    }

    async fn get_confession_row(&self, id: Uuid) -> Result<Option<ConfessionRow>> {
        let Some(confession) = self.confessions.lock().unwrap().iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        let comments_count = self.comments.lock().unwrap().iter().filter(|c| c.confession_id == id).count();
        Ok(Some(ConfessionRow {
            votes: self.votes_for(VotableEntity::Confession(id)),
            comments_count,
            confession,
        }))
    }

    async fn insert_comment(&self, comment: Comment) -> Result<()> {
        self.comments.lock().unwrap().push(comment);
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.comments.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, confession_id: Uuid) -> Result<Vec<FlatComment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.confession_id == confession_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments
            .into_iter()
            .map(|comment| FlatComment {
                votes: self.votes_for(VotableEntity::Comment(comment.id)),
                comment,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryCache(Mutex<HashMap<String, String>>);

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.0.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.0.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Media store that remembers every upload; can be told to fail one.
#[derive(Default)]
pub struct RecordingMedia {
    pub uploads: Mutex<Vec<(String, usize, String)>>,
    pub fail_on: Option<usize>,
}

#[async_trait]
impl MediaStore for RecordingMedia {
    async fn put(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap();
        if self.fail_on == Some(uploads.len()) {
            return Err(AppError::Unavailable("bucket offline".into()));
        }
        uploads.push((name.to_string(), data.len(), content_type.to_string()));
        Ok(format!("https://media.test/{name}"))
    }
}

pub struct FixedProbe;

impl DeviceProbe for FixedProbe {
    fn fingerprint(&self) -> DeviceFingerprint {
        DeviceFingerprint {
            user_agent: "confession-board/tests".into(),
            language: "en-US".into(),
            platform: "linux".into(),
            screen_resolution: "800x600".into(),
            timezone: "UTC".into(),
            canvas: "fixed".into(),
        }
    }
}

pub fn anon(id: &str) -> AnonymousId {
    AnonymousId::parse(id).unwrap()
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}
