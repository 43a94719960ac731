//! # Anonymous identity resolution
//!
//! Settles on one 5-digit id per device, in strict precedence:
//! device cache, remote lookup by fingerprint hash, fresh insert with
//! bounded conflict retries, and finally a deterministic fallback derived
//! from the fingerprint hash. Resolution never fails; it degrades.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use cb_core::{
    fallback_id, AnonymousId, AnonymousIdentity, DeviceFingerprint, IdSource, IdentityStore,
    KeyValueCache, NewIdentity,
};

pub const ANONYMOUS_ID_CACHE_KEY: &str = "anonymous_id";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Which transition out of UNRESOLVED produced the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Id found in the device cache; no remote call was made
    Cache,
    /// Existing identity found by fingerprint hash
    Remote,
    /// A fresh candidate id was inserted
    Created,
    /// A concurrent session created this device's identity first
    Adopted,
    /// The store could not hand out an id; derived from the hash
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: AnonymousIdentity,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Insert attempts before falling back
    pub max_attempts: u32,
    pub cache_key: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cache_key: ANONYMOUS_ID_CACHE_KEY.to_string(),
        }
    }
}

/// Draws candidates uniformly from 10000..=99999.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn candidate(&self) -> AnonymousId {
        let n = rand::thread_rng().gen_range(AnonymousId::MIN..=AnonymousId::MAX);
        AnonymousId::saturating(n)
    }
}

pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    cache: Arc<dyn KeyValueCache>,
    ids: Arc<dyn IdSource>,
    config: ResolverConfig,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        cache: Arc<dyn KeyValueCache>,
        ids: Arc<dyn IdSource>,
        config: ResolverConfig,
    ) -> Self {
        Self { store, cache, ids, config }
    }

    pub async fn resolve(&self, fingerprint: &DeviceFingerprint) -> Resolution {
        let fingerprint_hash = fingerprint.hash();

        if let Some(id) = self.cached_id() {
            debug!(anonymous_id = %id, "identity served from device cache");
            return Resolution {
                identity: AnonymousIdentity { id, fingerprint_hash },
                source: ResolutionSource::Cache,
            };
        }

        if let Some(identity) = self.lookup(&fingerprint_hash).await {
            return self.settle(identity, ResolutionSource::Remote);
        }

        for attempt in 1..=self.config.max_attempts {
            let candidate = NewIdentity {
                id: self.ids.candidate(),
                fingerprint: fingerprint.diagnostic(),
                fingerprint_hash: fingerprint_hash.clone(),
            };

            match self.store.insert_identity(candidate).await {
                Ok(identity) => return self.settle(identity, ResolutionSource::Created),
                Err(e) if e.is_conflict() => {
                    debug!(attempt, "candidate id already claimed");
                    if let Some(identity) = self.lookup(&fingerprint_hash).await {
                        return self.settle(identity, ResolutionSource::Adopted);
                    }
                }
                Err(e) => warn!(attempt, error = %e, "identity insert failed"),
            }
        }

        let id = fallback_id(&fingerprint_hash);
        warn!(
            anonymous_id = %id,
            attempts = self.config.max_attempts,
            "identity store exhausted, using deterministic fallback id"
        );
        self.settle(AnonymousIdentity { id, fingerprint_hash }, ResolutionSource::Fallback)
    }

    fn cached_id(&self) -> Option<AnonymousId> {
        let raw = self.cache.get(&self.config.cache_key)?;
        match AnonymousId::parse(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "ignoring malformed cached anonymous id");
                None
            }
        }
    }

    /// Store errors count as "not found"; creation is attempted next.
    async fn lookup(&self, fingerprint_hash: &str) -> Option<AnonymousIdentity> {
        match self.store.find_by_fingerprint_hash(fingerprint_hash).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "identity lookup failed");
                None
            }
        }
    }

    fn settle(&self, identity: AnonymousIdentity, source: ResolutionSource) -> Resolution {
        if let Err(e) = self.cache.set(&self.config.cache_key, identity.id.as_str()) {
            warn!(error = %e, "could not cache anonymous id, next session resolves remotely");
        }
        info!(anonymous_id = %identity.id, ?source, "anonymous identity resolved");
        Resolution { identity, source }
    }
}
