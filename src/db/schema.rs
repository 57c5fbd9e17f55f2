//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::PortalError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), PortalError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, PortalError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| PortalError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let version = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result::<VersionRow>(conn)
        .map(|row| row.version)
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), PortalError> {
    diesel::sql_query("DELETE FROM schema_version")
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Failed to clear schema_version: {}", e)))?;
    diesel::sql_query(format!("INSERT INTO schema_version (version) VALUES ({})", version))
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &mut SqliteConnection) -> Result<(), PortalError> {
    conn.batch_execute(IDENTITIES_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create identities table: {}", e)))?;

    conn.batch_execute(NOTES_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create notes table: {}", e)))?;

    conn.batch_execute(SOCIAL_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create social tables: {}", e)))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| PortalError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &mut SqliteConnection, from_version: i32) -> Result<(), PortalError> {
    // Add migration steps here as schema evolves
    match from_version {
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Identities table schema
const IDENTITIES_SCHEMA: &str = r#"
-- Registered users. The primary key is the external-auth key assigned by
-- the identity provider; rows are never hard-deleted.
CREATE TABLE IF NOT EXISTS identities (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    usn TEXT NOT NULL,
    branch TEXT NOT NULL,
    semester TEXT NOT NULL,
    cycle TEXT NOT NULL DEFAULT 'none',
    bio TEXT,
    role TEXT NOT NULL DEFAULT 'student',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- USN is unique across identities. The UNKNOWN sentinel (empty USN after
-- normalization) is exempt so placeholder rows can coexist.
CREATE UNIQUE INDEX IF NOT EXISTS idx_identities_usn
    ON identities(usn) WHERE usn != 'UNKNOWN';
"#;

/// Notes table schema
const NOTES_SCHEMA: &str = r#"
-- Shared study resources. Append-only: no exposed update or delete.
CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    subject TEXT NOT NULL,
    branch TEXT NOT NULL,
    semester TEXT NOT NULL,
    note_type TEXT NOT NULL DEFAULT 'notes',
    cycle TEXT NOT NULL DEFAULT 'none',
    uploaded_by TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Follow edges and badges schema
const SOCIAL_SCHEMA: &str = r#"
-- Directed follow graph. The unique pair index makes a racing duplicate
-- insert a constraint violation instead of a second edge.
CREATE TABLE IF NOT EXISTS follow_edges (
    id TEXT PRIMARY KEY NOT NULL,
    follower_id TEXT NOT NULL,
    following_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_follow_edges_pair
    ON follow_edges(follower_id, following_id);

-- Awarded badges, keyed by USN with no identity foreign key. Duplicate
-- grants are intentional.
CREATE TABLE IF NOT EXISTS badges (
    id TEXT PRIMARY KEY NOT NULL,
    usn TEXT NOT NULL,
    badge_type TEXT NOT NULL,
    image_ref TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
-- Identity indexes
CREATE INDEX IF NOT EXISTS idx_identities_semester ON identities(semester);
CREATE INDEX IF NOT EXISTS idx_identities_branch ON identities(branch);

-- Note indexes (visibility predicates filter on these)
CREATE INDEX IF NOT EXISTS idx_notes_semester ON notes(semester);
CREATE INDEX IF NOT EXISTS idx_notes_branch ON notes(branch);
CREATE INDEX IF NOT EXISTS idx_notes_subject ON notes(subject);
CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at);

-- Follow graph indexes (stats count both directions)
CREATE INDEX IF NOT EXISTS idx_follow_edges_follower ON follow_edges(follower_id);
CREATE INDEX IF NOT EXISTS idx_follow_edges_following ON follow_edges(following_id);

-- Badge indexes
CREATE INDEX IF NOT EXISTS idx_badges_usn ON badges(usn);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_fresh() {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");

        init_schema(&mut conn).unwrap();
        assert_eq!(get_schema_version(&mut conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_init_schema_idempotent() {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");

        init_schema(&mut conn).unwrap();
        init_schema(&mut conn).unwrap();
        assert_eq!(get_schema_version(&mut conn).unwrap(), SCHEMA_VERSION);
    }
}
