//! Social service - follow graph operations and profile views
//!
//! Manages directed follow edges between identities: idempotent toggling
//! with the resulting state returned explicitly, aggregate counts, and the
//! joined follower/following listings. Also assembles the profile view
//! (identity + stats + badges), cached until the next mutation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::db::{self, badges, follow_edges, identities, DbPool};
use crate::db::models::{Badge, Identity};
use crate::error::PortalError;
use crate::view_cache::{ViewCache, ViewKey};

use super::events::{EventBus, PortalEvent};

/// Result of a follow toggle: the state after the call
#[derive(Debug, Clone, Serialize)]
pub struct FollowToggle {
    pub following: bool,
}

/// One network listing entry: an identity plus the viewer's edge state
#[derive(Debug, Clone, Serialize)]
pub struct NetworkEntry {
    #[serde(flatten)]
    pub identity: Identity,
    pub is_following: bool,
}

/// Profile view: identity with follow stats and badges
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub identity: Identity,
    pub follower_count: i64,
    pub following_count: i64,
    pub badges: Vec<Badge>,
}

/// Social service for follow graph operations
pub struct SocialService {
    pool: DbPool,
    events: Arc<EventBus>,
    views: Arc<ViewCache>,
}

impl SocialService {
    pub fn new(pool: DbPool, events: Arc<EventBus>, views: Arc<ViewCache>) -> Self {
        Self { pool, events, views }
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Toggle the caller's edge toward the target and return the resulting
    /// state. Self-follow and empty targets are rejected.
    pub fn toggle_follow(
        &self,
        caller_id: &str,
        target_id: &str,
    ) -> Result<FollowToggle, PortalError> {
        if target_id.is_empty() {
            return Err(PortalError::InvalidInput("target id is required".into()));
        }

        if target_id == caller_id {
            return Err(PortalError::InvalidInput("cannot follow yourself".into()));
        }

        let mut conn = db::get_conn(&self.pool)?;
        let following = follow_edges::toggle_edge(&mut conn, caller_id, target_id)?;
        drop(conn);

        // Both parties' cached profile views carry follow counts
        self.views.invalidate_profile(caller_id);
        self.views.invalidate_profile(target_id);

        self.events.emit(PortalEvent::FollowToggled {
            follower_id: caller_id.to_string(),
            following_id: target_id.to_string(),
            following,
        });

        Ok(FollowToggle { following })
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Follower and following counts for an identity
    pub fn follow_stats(&self, identity_id: &str) -> Result<follow_edges::FollowStats, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        follow_edges::follow_stats(&mut conn, identity_id)
    }

    /// Whether the caller currently follows the target
    pub fn is_following(&self, caller_id: &str, target_id: &str) -> Result<bool, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        Ok(follow_edges::get_edge(&mut conn, caller_id, target_id)?.is_some())
    }

    /// Identities following the given identity, newest edge first
    pub fn list_followers(&self, identity_id: &str) -> Result<Vec<Identity>, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        follow_edges::list_followers(&mut conn, identity_id)
    }

    /// Identities the given identity follows, newest edge first
    pub fn list_following(&self, identity_id: &str) -> Result<Vec<Identity>, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        follow_edges::list_following(&mut conn, identity_id)
    }

    /// Every registered identity except the caller, annotated with the
    /// caller's current edge state
    pub fn list_network(&self, caller_id: &str) -> Result<Vec<NetworkEntry>, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;

        let others = identities::list_identities(
            &mut conn,
            &identities::IdentityQuery {
                exclude_id: Some(caller_id.to_string()),
                ..Default::default()
            },
        )?;

        let followed: HashSet<String> = follow_edges::following_ids(&mut conn, caller_id)?
            .into_iter()
            .collect();

        Ok(others
            .into_iter()
            .map(|identity| {
                let is_following = followed.contains(&identity.id);
                NetworkEntry {
                    identity,
                    is_following,
                }
            })
            .collect())
    }

    /// Profile view (identity + stats + badges), served through the view cache
    pub fn profile(&self, identity_id: &str) -> Result<serde_json::Value, PortalError> {
        let key = ViewKey::Profile(identity_id.to_string());
        if let Some(cached) = self.views.get(&key) {
            return Ok(cached);
        }

        let mut conn = db::get_conn(&self.pool)?;
        let identity = identities::get_identity(&mut conn, identity_id)?
            .ok_or_else(|| PortalError::NotFound(format!("Identity {} not found", identity_id)))?;

        let stats = follow_edges::follow_stats(&mut conn, identity_id)?;
        let identity_badges = badges::list_badges_for_usn(&mut conn, &identity.usn)?;

        let view = ProfileView {
            identity,
            follower_count: stats.follower_count,
            following_count: stats.following_count,
            badges: identity_badges,
        };

        let rendered = serde_json::to_value(&view)?;
        self.views.put(key, rendered.clone());
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::identities::{upsert_identity, UpsertIdentityInput};
    use crate::db::models::{badge_types, cycles, roles};
    use crate::db::open_in_memory_pool;

    fn setup() -> SocialService {
        let pool = open_in_memory_pool().unwrap();
        SocialService::new(pool, Arc::new(EventBus::new()), Arc::new(ViewCache::new()))
    }

    fn add_identity(service: &SocialService, id: &str) {
        let mut conn = db::get_conn(&service.pool).unwrap();
        upsert_identity(
            &mut conn,
            &UpsertIdentityInput {
                id: id.to_string(),
                name: format!("Student {}", id),
                email: None,
                usn: format!("USN-{}", id),
                branch: "CSE".to_string(),
                semester: "3".to_string(),
                cycle: cycles::NONE.to_string(),
                bio: None,
                role: roles::STUDENT.to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_toggle_returns_resulting_state() {
        let service = setup();

        let first = service.toggle_follow("a", "b").unwrap();
        assert!(first.following);

        let second = service.toggle_follow("a", "b").unwrap();
        assert!(!second.following);

        let stats = service.follow_stats("b").unwrap();
        assert_eq!(stats.follower_count, 0);
        assert_eq!(stats.following_count, 0);
    }

    #[test]
    fn test_self_follow_rejected() {
        let service = setup();
        let result = service.toggle_follow("a", "a");
        assert!(matches!(result, Err(PortalError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_target_rejected() {
        let service = setup();
        let result = service.toggle_follow("a", "");
        assert!(matches!(result, Err(PortalError::InvalidInput(_))));
    }

    #[test]
    fn test_network_annotates_edge_state() {
        let service = setup();
        add_identity(&service, "me");
        add_identity(&service, "friend");
        add_identity(&service, "stranger");

        service.toggle_follow("me", "friend").unwrap();

        let network = service.list_network("me").unwrap();
        assert_eq!(network.len(), 2);
        assert!(network.iter().all(|entry| entry.identity.id != "me"));

        let friend = network.iter().find(|e| e.identity.id == "friend").unwrap();
        assert!(friend.is_following);
        let stranger = network.iter().find(|e| e.identity.id == "stranger").unwrap();
        assert!(!stranger.is_following);
    }

    #[test]
    fn test_profile_view_includes_stats_and_badges() {
        let service = setup();
        add_identity(&service, "x");

        {
            let mut conn = db::get_conn(&service.pool).unwrap();
            badges::grant_badge(
                &mut conn,
                "USN-x",
                badge_types::CONTRIBUTOR,
                badge_types::image_ref(badge_types::CONTRIBUTOR),
            )
            .unwrap();
        }
        service.toggle_follow("a", "x").unwrap();
        service.toggle_follow("b", "x").unwrap();

        let profile = service.profile("x").unwrap();
        assert_eq!(profile["follower_count"].as_i64(), Some(2));
        assert_eq!(profile["badges"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_profile_cache_invalidated_by_toggle() {
        let service = setup();
        add_identity(&service, "x");

        let before = service.profile("x").unwrap();
        assert_eq!(before["follower_count"].as_i64(), Some(0));

        service.toggle_follow("a", "x").unwrap();

        let after = service.profile("x").unwrap();
        assert_eq!(after["follower_count"].as_i64(), Some(1));
    }
}
