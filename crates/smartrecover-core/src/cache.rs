//! Per-incident TTL cache of agent results.
//!
//! In-process only; a restart drops it. Entries expire lazily: an expired
//! entry is removed by the `get` that observes it. Reads and writes are safe
//! under concurrent HTTP handlers.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::AgentData;

/// Default time-to-live for cached agent results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    data: AgentData,
    expires_at: Instant,
}

/// TTL cache mapping incident ids to their [`AgentData`].
pub struct AgentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl AgentCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL)
    }

    /// Fetch cached results for an incident, evicting the entry if it has
    /// expired.
    pub fn get(&self, incident_id: &str) -> Option<AgentData> {
        {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(incident_id) {
                Some(entry) if Instant::now() < entry.expires_at => {
                    debug!(incident_id, "Agent cache hit");
                    metrics::counter!("smartrecover_cache_hits_total").increment(1);
                    return Some(entry.data.clone());
                }
                Some(_) => {}
                None => {
                    debug!(incident_id, "Agent cache miss");
                    metrics::counter!("smartrecover_cache_misses_total").increment(1);
                    return None;
                }
            }
        }

        // Expired: upgrade to a write lock and remove. Re-check under the
        // write lock since another writer may have refreshed the entry.
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if let Some(entry) = entries.get(incident_id) {
            if Instant::now() < entry.expires_at {
                return Some(entry.data.clone());
            }
            entries.remove(incident_id);
            debug!(incident_id, "Agent cache entry expired");
        }
        metrics::counter!("smartrecover_cache_misses_total").increment(1);
        None
    }

    /// Store results with the default TTL.
    pub fn put(&self, incident_id: &str, data: AgentData) {
        self.put_with_ttl(incident_id, data, self.default_ttl);
    }

    /// Store results with an explicit TTL.
    pub fn put_with_ttl(&self, incident_id: &str, data: AgentData, ttl: Duration) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(
            incident_id.to_string(),
            CacheEntry {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
        debug!(incident_id, ttl_secs = ttl.as_secs(), "Agent results cached");
    }

    /// Drop any entry for the incident.
    pub fn invalidate(&self, incident_id: &str) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if entries.remove(incident_id).is_some() {
            debug!(incident_id, "Agent cache invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
