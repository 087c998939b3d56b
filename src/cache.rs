//! TTL cache for rendered view data.
//!
//! Pages read through the cache; claim actions invalidate the keys that list
//! the claim. Entries are JSON documents, so any page can store its view.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CachedView {
    value: Value,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct ViewCache {
    entries: DashMap<String, CachedView>,
    ttl: Duration,
    enabled: bool,
}

/// Cache keys for the views claim actions touch
pub mod keys {
    pub fn lecturer_claims(user_id: &str) -> String {
        format!("lecturer:{}:claims", user_id)
    }

    pub fn center_claims(center_id: &str, status: Option<&str>) -> String {
        format!("{}{}", center_prefix(center_id), status.unwrap_or("all"))
    }

    pub fn center_prefix(center_id: &str) -> String {
        format!("center:{}:claims:", center_id)
    }

    pub fn dashboard(user_id: &str) -> String {
        format!("{}{}", DASHBOARD_PREFIX, user_id)
    }

    pub const DASHBOARD_PREFIX: &str = "dashboard:";
}

impl ViewCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(config.ttl_seconds),
            enabled: config.enabled,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        {
            let entry = self.entries.get(key)?;
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }
        // read guard must be released before removing
        self.entries.remove(key);
        None
    }

    pub fn put(&self, key: String, value: Value) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            key,
            CachedView {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Drop every view that lists claims of this lecturer or center
    pub fn invalidate_claim_views(&self, lecturer_id: &str, center_id: &str) {
        self.invalidate(&keys::lecturer_claims(lecturer_id));
        self.invalidate_prefix(&keys::center_prefix(center_id));
        self.invalidate_dashboards();
        tracing::debug!(lecturer_id, center_id, "Invalidated claim views");
    }

    /// Drop every dashboard; they embed user counts and center assignments
    pub fn invalidate_dashboards(&self) {
        self.invalidate_prefix(keys::DASHBOARD_PREFIX);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
