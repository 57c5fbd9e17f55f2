//! Badge CRUD operations using Diesel
//!
//! Badges are keyed by USN with no identity foreign key: a grant to an
//! unregistered USN succeeds, and granting the same type twice produces two
//! rows. Badges are never updated or deleted.

use diesel::prelude::*;
use uuid::Uuid;

use super::diesel_schema::badges;
use super::models::{Badge, NewBadge};
use crate::error::PortalError;

/// Get badge by ID
pub fn get_badge(conn: &mut SqliteConnection, id: &str) -> Result<Option<Badge>, PortalError> {
    badges::table
        .filter(badges::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// Insert a badge unconditionally
pub fn grant_badge(
    conn: &mut SqliteConnection,
    usn: &str,
    badge_type: &str,
    image_ref: &str,
) -> Result<Badge, PortalError> {
    let id = Uuid::new_v4().to_string();

    let new_badge = NewBadge {
        id: &id,
        usn,
        badge_type,
        image_ref,
    };

    diesel::insert_into(badges::table)
        .values(&new_badge)
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    get_badge(conn, &id)?
        .ok_or_else(|| PortalError::Internal("Badge not found after insert".into()))
}

/// List badges for a normalized USN, newest first
pub fn list_badges_for_usn(
    conn: &mut SqliteConnection,
    usn: &str,
) -> Result<Vec<Badge>, PortalError> {
    badges::table
        .filter(badges::usn.eq(usn))
        .order(badges::created_at.desc())
        .load(conn)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// Get badge count
pub fn badge_count(conn: &mut SqliteConnection) -> Result<i64, PortalError> {
    badges::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(format!("Count query failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::badge_types;
    use crate::db::schema::init_schema;

    fn setup_test_db() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");
        init_schema(&mut conn).expect("Failed to initialize schema");
        conn
    }

    #[test]
    fn test_duplicate_grants_produce_two_rows() {
        let mut conn = setup_test_db();

        let image = badge_types::image_ref(badge_types::CONTRIBUTOR);
        grant_badge(&mut conn, "4JC22CS001", badge_types::CONTRIBUTOR, image).unwrap();
        grant_badge(&mut conn, "4JC22CS001", badge_types::CONTRIBUTOR, image).unwrap();

        let listed = list_badges_for_usn(&mut conn, "4JC22CS001").unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_grant_to_unregistered_usn() {
        let mut conn = setup_test_db();

        // No identities exist at all; the grant still lands
        let badge = grant_badge(
            &mut conn,
            "4JC99XX999",
            badge_types::ELITE,
            badge_types::image_ref(badge_types::ELITE),
        )
        .unwrap();
        assert_eq!(badge.usn, "4JC99XX999");
        assert_eq!(badge_count(&mut conn).unwrap(), 1);
    }
}
