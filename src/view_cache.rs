//! Rendered-view hot cache
//!
//! Profile and dashboard views are assembled from several queries; the cache
//! keeps the rendered JSON keyed by (view, viewer) and is invalidated after
//! each mutation, so the UI layer can treat it as a read-through cache with
//! the database as the single source of truth.

use dashmap::DashMap;
use serde_json::Value;

/// Cache key: which view, for which viewer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    /// Profile page (identity + follow stats + badges)
    Profile(String),
    /// Dashboard subject listing
    Dashboard(String),
}

/// Concurrent cache of rendered views
pub struct ViewCache {
    entries: DashMap<ViewKey, Value>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &ViewKey) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn put(&self, key: ViewKey, value: Value) {
        self.entries.insert(key, value);
    }

    /// Drop one viewer's profile view
    pub fn invalidate_profile(&self, viewer_id: &str) {
        self.entries.remove(&ViewKey::Profile(viewer_id.to_string()));
    }

    /// Drop one viewer's dashboard view
    pub fn invalidate_dashboard(&self, viewer_id: &str) {
        self.entries.remove(&ViewKey::Dashboard(viewer_id.to_string()));
    }

    /// Drop every dashboard view. Uploads change what an audience of viewers
    /// can see, so the whole view class goes.
    pub fn invalidate_dashboards(&self) {
        self.entries.retain(|key, _| !matches!(key, ViewKey::Dashboard(_)));
    }

    /// Drop everything (bulk attribute migrations touch every view)
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}
