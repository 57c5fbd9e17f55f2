//! Identity CRUD operations using Diesel
//!
//! Identities are keyed by the external-auth key from the identity provider.
//! USNs are normalized before storage; a partial unique index enforces
//! uniqueness for everything except the UNKNOWN sentinel.

use diesel::prelude::*;
use serde::Deserialize;

use super::diesel_schema::identities;
use super::models::{current_timestamp, roles, Identity, NewIdentity};
use crate::error::PortalError;

/// Sentinel stored when normalization yields an empty USN
pub const UNKNOWN_USN: &str = "UNKNOWN";

/// Normalize a raw institutional identifier: trim, uppercase, and fall back
/// to the UNKNOWN sentinel when nothing is left.
pub fn normalize_usn(raw: &str) -> String {
    let normalized = raw.trim().to_uppercase();
    if normalized.is_empty() {
        UNKNOWN_USN.to_string()
    } else {
        normalized
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Attribute set for creating or updating an identity.
/// The USN is expected to be normalized by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertIdentityInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub usn: String,
    pub branch: String,
    pub semester: String,
    pub cycle: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    roles::STUDENT.to_string()
}

/// Query parameters for listing identities
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityQuery {
    pub branch: Option<String>,
    pub semester: Option<String>,
    pub cycle: Option<String>,
    /// Exclude one identity (the viewer, on the network listing)
    pub exclude_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    500
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get identity by external-auth key
pub fn get_identity(conn: &mut SqliteConnection, id: &str) -> Result<Option<Identity>, PortalError> {
    identities::table
        .filter(identities::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// Find identity by normalized USN
pub fn find_by_usn(conn: &mut SqliteConnection, usn: &str) -> Result<Option<Identity>, PortalError> {
    identities::table
        .filter(identities::usn.eq(usn))
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// List identities with optional filters
pub fn list_identities(
    conn: &mut SqliteConnection,
    query: &IdentityQuery,
) -> Result<Vec<Identity>, PortalError> {
    let mut base_query = identities::table.into_boxed();

    if let Some(ref branch) = query.branch {
        base_query = base_query.filter(identities::branch.eq(branch));
    }

    if let Some(ref semester) = query.semester {
        base_query = base_query.filter(identities::semester.eq(semester));
    }

    if let Some(ref cycle) = query.cycle {
        base_query = base_query.filter(identities::cycle.eq(cycle));
    }

    if let Some(ref exclude_id) = query.exclude_id {
        base_query = base_query.filter(identities::id.ne(exclude_id));
    }

    base_query
        .order(identities::name.asc())
        .limit(query.limit)
        .offset(query.offset)
        .load(conn)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

// ============================================================================
// Write Operations
// ============================================================================

/// Create or update an identity keyed by external-auth key.
/// A re-submission overwrites the profile attributes but never the role,
/// so an admin grant survives onboarding edits.
pub fn upsert_identity(
    conn: &mut SqliteConnection,
    input: &UpsertIdentityInput,
) -> Result<Identity, PortalError> {
    let new_identity = NewIdentity {
        id: &input.id,
        name: &input.name,
        email: input.email.as_deref(),
        usn: &input.usn,
        branch: &input.branch,
        semester: &input.semester,
        cycle: &input.cycle,
        bio: input.bio.as_deref(),
        role: &input.role,
    };

    diesel::insert_into(identities::table)
        .values(&new_identity)
        .on_conflict(identities::id)
        .do_update()
        .set((
            identities::name.eq(&input.name),
            identities::email.eq(input.email.as_deref()),
            identities::usn.eq(&input.usn),
            identities::branch.eq(&input.branch),
            identities::semester.eq(&input.semester),
            identities::cycle.eq(&input.cycle),
            identities::bio.eq(input.bio.as_deref()),
            identities::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Upsert failed: {}", e)))?;

    get_identity(conn, &input.id)?
        .ok_or_else(|| PortalError::Internal("Failed to retrieve upserted identity".into()))
}

/// Overwrite an identity's bio
pub fn update_bio(
    conn: &mut SqliteConnection,
    id: &str,
    bio: &str,
) -> Result<Identity, PortalError> {
    let updated = diesel::update(identities::table.filter(identities::id.eq(id)))
        .set((
            identities::bio.eq(bio),
            identities::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    if updated == 0 {
        return Err(PortalError::NotFound(format!("Identity {} not found", id)));
    }

    get_identity(conn, id)?
        .ok_or_else(|| PortalError::Internal("Failed to retrieve updated identity".into()))
}

/// Set an identity's role
pub fn set_role(
    conn: &mut SqliteConnection,
    id: &str,
    role: &str,
) -> Result<Identity, PortalError> {
    diesel::update(identities::table.filter(identities::id.eq(id)))
        .set((
            identities::role.eq(role),
            identities::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Update failed: {}", e)))?;

    get_identity(conn, id)?
        .ok_or_else(|| PortalError::NotFound(format!("Identity {} not found", id)))
}

/// Move every identity at `from_semester` to `to_semester`, returning the
/// promoted rows for directory mirroring. All-or-nothing on the local store.
pub fn bulk_update_semester(
    conn: &mut SqliteConnection,
    from_semester: &str,
    to_semester: &str,
) -> Result<Vec<Identity>, PortalError> {
    conn.transaction(|conn| {
        let matched: Vec<String> = identities::table
            .filter(identities::semester.eq(from_semester))
            .select(identities::id)
            .load(conn)?;

        diesel::update(identities::table.filter(identities::semester.eq(from_semester)))
            .set((
                identities::semester.eq(to_semester),
                identities::updated_at.eq(current_timestamp()),
            ))
            .execute(conn)?;

        identities::table
            .filter(identities::id.eq_any(&matched))
            .load(conn)
    })
    .map_err(|e: diesel::result::Error| PortalError::Database(format!("Bulk update failed: {}", e)))
}

/// Move every entry-level identity at `from_cycle` to `to_cycle`, returning
/// the rotated rows for directory mirroring.
pub fn bulk_update_cycle(
    conn: &mut SqliteConnection,
    entry_semester: &str,
    from_cycle: &str,
    to_cycle: &str,
) -> Result<Vec<Identity>, PortalError> {
    conn.transaction(|conn| {
        let matched: Vec<String> = identities::table
            .filter(identities::semester.eq(entry_semester))
            .filter(identities::cycle.eq(from_cycle))
            .select(identities::id)
            .load(conn)?;

        diesel::update(
            identities::table
                .filter(identities::semester.eq(entry_semester))
                .filter(identities::cycle.eq(from_cycle)),
        )
        .set((
            identities::cycle.eq(to_cycle),
            identities::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;

        identities::table
            .filter(identities::id.eq_any(&matched))
            .load(conn)
    })
    .map_err(|e: diesel::result::Error| PortalError::Database(format!("Bulk update failed: {}", e)))
}

// ============================================================================
// Stats
// ============================================================================

/// Get identity count
pub fn identity_count(conn: &mut SqliteConnection) -> Result<i64, PortalError> {
    identities::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(format!("Count query failed: {}", e)))
}
