//! Participant resolution: authenticated identity → chat participant
//! profile, created lazily on first room interaction.
//!
//! The cache is an explicit session-scoped object with an injected clock
//! and TTL — owned here and passed by reference, never process-global.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use drift_proto::api::NewParticipantRequest;
use drift_proto::{Identity, Participant};
use drift_store::MessageStore;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::Clock;
use crate::error::EngineError;

pub struct ProfileCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Participant, DateTime<Utc>)>>,
}

impl ProfileCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, identity_id: &str) -> Option<Participant> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(identity_id) {
            Some((participant, cached_at)) if now - *cached_at < self.ttl => {
                Some(participant.clone())
            }
            Some(_) => {
                entries.remove(identity_id);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, identity_id: &str, participant: Participant) {
        self.entries
            .lock()
            .insert(identity_id.to_owned(), (participant, self.clock.now()));
    }
}

pub struct ParticipantResolver {
    store: Arc<dyn MessageStore>,
    cache: ProfileCache,
}

impl ParticipantResolver {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache: ProfileCache::new(clock, cache_ttl),
        }
    }

    /// Look up the participant profile for `identity`, creating one on
    /// first use. Idempotent under concurrency: the store enforces one
    /// profile per identity, and a create conflict resolves by re-fetching.
    pub async fn resolve(&self, identity: &Identity) -> Result<Participant, EngineError> {
        if let Some(cached) = self.cache.get(&identity.id) {
            return Ok(cached);
        }

        if let Some(found) = self.store.find_participant(&identity.id).await? {
            self.cache.put(&identity.id, found.clone());
            return Ok(found);
        }

        let request = NewParticipantRequest {
            identity_id: identity.id.clone(),
            display_name: identity.fallback_display_name(),
            avatar_url: None,
        };
        match self.store.create_participant(request).await {
            Ok(created) => {
                self.cache.put(&identity.id, created.clone());
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                // Someone else created the profile between our find and
                // create; the stored row wins.
                debug!(identity = identity.id.as_str(), "participant create conflict, re-fetching");
                match self.store.find_participant(&identity.id).await? {
                    Some(found) => {
                        self.cache.put(&identity.id, found.clone());
                        Ok(found)
                    }
                    None => Err(EngineError::NotFound(format!(
                        "participant for identity {} missing after create conflict",
                        identity.id
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
