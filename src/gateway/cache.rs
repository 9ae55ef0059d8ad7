//! Cross-network message identity cache.
//!
//! Maps the key of an origin message (`protocol + " " + id`) to the IDs its
//! relayed copies received on every destination. Edits, deletes and replies
//! use it to find the matching message on the other side.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

/// Maximum number of origin messages remembered.
pub const CACHE_CAPACITY: usize = 5000;

/// Where one relayed copy of a message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationId {
    /// Destination connection account, e.g. `slack.work`.
    pub account: String,
    pub protocol: String,
    pub name: String,
    /// `protocol + " " + raw id`.
    pub id: String,
    /// Descriptor ID of the destination channel.
    pub channel_id: String,
}

/// Bounded LRU store shared by the router and every gateway.
pub struct IdentityCache {
    entries: Mutex<LruCache<String, Vec<DestinationId>>>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<String, Vec<DestinationId>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Destination IDs recorded for `key`, marking it recently used.
    pub fn lookup(&self, key: &str) -> Option<Vec<DestinationId>> {
        self.entries().get(key).cloned()
    }

    /// Record destination IDs for `key`.
    ///
    /// Appends to an existing entry, skipping IDs already present.
    pub fn append(&self, key: &str, ids: Vec<DestinationId>) {
        if ids.is_empty() {
            return;
        }
        let mut entries = self.entries();
        match entries.get_mut(key) {
            Some(existing) => {
                for id in ids {
                    if !existing.contains(&id) {
                        existing.push(id);
                    }
                }
            }
            None => {
                entries.put(key.to_string(), ids);
            }
        }
    }

    /// Raw ID of the copy of `key` that went to `channel_id` on the given
    /// destination, with its protocol prefix stripped.
    pub fn find_destination_id(
        &self,
        key: &str,
        protocol: &str,
        name: &str,
        channel_id: &str,
    ) -> Option<String> {
        let mut entries = self.entries();
        let ids = entries.get(key)?;
        ids.iter()
            .find(|id| id.protocol == protocol && id.name == name && id.channel_id == channel_id)
            .map(|id| strip_protocol(&id.id, protocol).to_string())
    }

    /// Raw origin ID under which a message is keyed.
    ///
    /// `id` is a composite `protocol + " " + raw` ID. It may itself be a key,
    /// or the ID of a relayed copy, in which case the owning entry's origin
    /// ID is returned. Does not change recency.
    pub fn find_canonical_origin_id(&self, protocol: &str, id: &str) -> Option<String> {
        let entries = self.entries();
        if entries.contains(id) {
            return Some(strip_protocol(id, protocol).to_string());
        }

        entries
            .iter()
            .find(|(_, ids)| ids.iter().any(|dest| dest.id == id))
            .map(|(origin, _)| {
                origin
                    .split_once(' ')
                    .map(|(_, raw)| raw)
                    .unwrap_or(origin)
                    .to_string()
            })
    }
}

fn strip_protocol<'a>(id: &'a str, protocol: &str) -> &'a str {
    id.strip_prefix(protocol)
        .and_then(|rest| rest.strip_prefix(' '))
        .unwrap_or(id)
}
