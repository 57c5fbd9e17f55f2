//! SQLite database module for portal records
//!
//! Fast local storage for identities, shared notes, the follow graph,
//! and badges, behind an r2d2 connection pool.
//!
//! ## Tables
//!
//! - `identities` - Registered users (auth key, USN, branch, semester, cycle)
//! - `notes` - Shared study resources (append-only)
//! - `follow_edges` - Directed follow graph with a unique pair constraint
//! - `badges` - Awarded credentials keyed by USN

pub mod schema;
pub mod diesel_schema;
pub mod models;
pub mod identities;
pub mod notes;
pub mod follow_edges;
pub mod badges;

use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use tracing::{debug, info};

use crate::error::PortalError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Open or create the portal database and return a connection pool
pub fn open_pool(db_path: &Path, max_connections: u32) -> Result<DbPool, PortalError> {
    info!("Opening SQLite database at {:?}", db_path);

    let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(max_connections)
        .build(manager)
        .map_err(|e| PortalError::Database(format!("Failed to build pool: {}", e)))?;

    let mut conn = get_conn(&pool)?;

    // Enable WAL mode for better concurrent read performance
    conn.batch_execute("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
        .map_err(|e| PortalError::Database(format!("Failed to set PRAGMA: {}", e)))?;

    schema::init_schema(&mut conn)?;

    Ok(pool)
}

/// Open an in-memory database (for testing).
/// A `:memory:` database exists per connection, so the pool holds exactly one.
pub fn open_in_memory_pool() -> Result<DbPool, PortalError> {
    debug!("Opening in-memory SQLite database");

    let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| PortalError::Database(format!("Failed to build pool: {}", e)))?;

    let mut conn = get_conn(&pool)?;
    schema::init_schema(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_conn(pool: &DbPool) -> Result<DbConn, PortalError> {
    pool.get()
        .map_err(|e| PortalError::Database(format!("Failed to get connection: {}", e)))
}

/// Get database statistics
pub fn stats(conn: &mut SqliteConnection) -> Result<DbStats, PortalError> {
    Ok(DbStats {
        identity_count: identities::identity_count(conn)? as u64,
        note_count: notes::note_count(conn)? as u64,
        follow_edge_count: follow_edges::edge_count(conn)? as u64,
        badge_count: badges::badge_count(conn)? as u64,
    })
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub identity_count: u64,
    pub note_count: u64,
    pub follow_edge_count: u64,
    pub badge_count: u64,
}

// Re-exports
pub use models::{Badge, FollowEdge, Identity, Note};
