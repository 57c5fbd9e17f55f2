//! Follow graph CRUD operations using Diesel
//!
//! Directed edges between identities. A unique index on
//! (follower_id, following_id) guarantees at most one edge per ordered pair;
//! the toggle runs in a transaction so a racing duplicate insert degrades to
//! "already following" instead of a second edge.

use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use uuid::Uuid;

use super::diesel_schema::{follow_edges, identities};
use super::models::{FollowEdge, Identity, NewFollowEdge};
use crate::error::PortalError;

/// Follower/following counts for one identity
#[derive(Debug, Clone, Serialize)]
pub struct FollowStats {
    pub follower_count: i64,
    pub following_count: i64,
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get the edge for an ordered (follower, following) pair
pub fn get_edge(
    conn: &mut SqliteConnection,
    follower_id: &str,
    following_id: &str,
) -> Result<Option<FollowEdge>, PortalError> {
    follow_edges::table
        .filter(follow_edges::follower_id.eq(follower_id))
        .filter(follow_edges::following_id.eq(following_id))
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// Follower and following counts, read in one connection
pub fn follow_stats(
    conn: &mut SqliteConnection,
    identity_id: &str,
) -> Result<FollowStats, PortalError> {
    let follower_count = follow_edges::table
        .filter(follow_edges::following_id.eq(identity_id))
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(format!("Count query failed: {}", e)))?;

    let following_count = follow_edges::table
        .filter(follow_edges::follower_id.eq(identity_id))
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(format!("Count query failed: {}", e)))?;

    Ok(FollowStats {
        follower_count,
        following_count,
    })
}

/// Identities following the given identity, newest edge first
pub fn list_followers(
    conn: &mut SqliteConnection,
    identity_id: &str,
) -> Result<Vec<Identity>, PortalError> {
    follow_edges::table
        .inner_join(identities::table.on(identities::id.eq(follow_edges::follower_id)))
        .filter(follow_edges::following_id.eq(identity_id))
        .order(follow_edges::created_at.desc())
        .select(Identity::as_select())
        .load(conn)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// Identities the given identity follows, newest edge first
pub fn list_following(
    conn: &mut SqliteConnection,
    identity_id: &str,
) -> Result<Vec<Identity>, PortalError> {
    follow_edges::table
        .inner_join(identities::table.on(identities::id.eq(follow_edges::following_id)))
        .filter(follow_edges::follower_id.eq(identity_id))
        .order(follow_edges::created_at.desc())
        .select(Identity::as_select())
        .load(conn)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// Ids of everyone the given identity follows (for annotating listings)
pub fn following_ids(
    conn: &mut SqliteConnection,
    follower_id: &str,
) -> Result<Vec<String>, PortalError> {
    follow_edges::table
        .filter(follow_edges::follower_id.eq(follower_id))
        .select(follow_edges::following_id)
        .load(conn)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

// ============================================================================
// Write Operations
// ============================================================================

/// Toggle the edge for an ordered pair inside one transaction.
/// Returns the resulting state: true when the call created the edge,
/// false when it removed an existing one.
pub fn toggle_edge(
    conn: &mut SqliteConnection,
    follower_id: &str,
    following_id: &str,
) -> Result<bool, PortalError> {
    conn.transaction(|conn| {
        let existing: Option<FollowEdge> = follow_edges::table
            .filter(follow_edges::follower_id.eq(follower_id))
            .filter(follow_edges::following_id.eq(following_id))
            .first(conn)
            .optional()?;

        if let Some(edge) = existing {
            diesel::delete(follow_edges::table.filter(follow_edges::id.eq(&edge.id)))
                .execute(conn)?;
            return Ok(false);
        }

        let id = Uuid::new_v4().to_string();
        let new_edge = NewFollowEdge {
            id: &id,
            follower_id,
            following_id,
        };

        match diesel::insert_into(follow_edges::table)
            .values(&new_edge)
            .execute(conn)
        {
            Ok(_) => Ok(true),
            // A concurrent toggle won the insert; the pair is followed either way
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(true)
            }
            Err(e) => Err(e),
        }
    })
    .map_err(|e: diesel::result::Error| PortalError::Database(format!("Toggle failed: {}", e)))
}

// ============================================================================
// Stats
// ============================================================================

/// Get total edge count
pub fn edge_count(conn: &mut SqliteConnection) -> Result<i64, PortalError> {
    follow_edges::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(format!("Count query failed: {}", e)))
}
