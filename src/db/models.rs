//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//!
//! Enum-like columns (semester, cycle, branch, note type, badge type, role)
//! are stored as TEXT and validated against the constant modules below.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Value Sets
// ============================================================================

/// Academic cycles. Only meaningful within the entry-level semester;
/// every other record carries NONE.
pub mod cycles {
    pub const P_CYCLE: &str = "P-Cycle";
    pub const C_CYCLE: &str = "C-Cycle";
    pub const NONE: &str = "none";

    pub const ALL: &[&str] = &[P_CYCLE, C_CYCLE, NONE];

    pub fn is_valid(cycle: &str) -> bool {
        ALL.contains(&cycle)
    }
}

/// Semester values. "1" is the entry-level semester, the only one
/// partitioned further by cycle.
pub mod semesters {
    pub const ENTRY_LEVEL: &str = "1";

    pub const ALL: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8"];

    pub fn is_valid(semester: &str) -> bool {
        ALL.contains(&semester)
    }

    pub fn is_entry_level(semester: &str) -> bool {
        semester == ENTRY_LEVEL
    }
}

/// Branch codes offered by the institution
pub mod branches {
    pub const ALL: &[&str] = &["CSE", "ISE", "ECE", "MECH", "CIVIL"];

    pub fn is_valid(branch: &str) -> bool {
        ALL.contains(&branch)
    }
}

/// Shared-resource content types
pub mod note_types {
    pub const NOTES: &str = "notes";
    pub const TEXTBOOK: &str = "textbook";
    pub const QUESTION_PAPER: &str = "qp";
    pub const LAB: &str = "lab";

    pub const ALL: &[&str] = &[NOTES, TEXTBOOK, QUESTION_PAPER, LAB];

    pub fn is_valid(note_type: &str) -> bool {
        ALL.contains(&note_type)
    }
}

/// Badge types and their fixed image references.
/// Unrecognized types fall back to the default image rather than failing.
pub mod badge_types {
    pub const CONTRIBUTOR: &str = "contributor";
    pub const MODERATOR: &str = "moderator";
    pub const ELITE: &str = "elite";

    pub const DEFAULT_IMAGE: &str = "/badges/default.png";

    pub fn image_ref(badge_type: &str) -> &'static str {
        match badge_type {
            CONTRIBUTOR => "/badges/contributor.png",
            MODERATOR => "/badges/moderator.png",
            ELITE => "/badges/elite.png",
            _ => DEFAULT_IMAGE,
        }
    }
}

/// Identity roles used by the administrative guard
pub mod roles {
    pub const STUDENT: &str = "student";
    pub const ADMIN: &str = "admin";
}

// ============================================================================
// Identity Models
// ============================================================================

/// Identity row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = identities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub usn: String,
    pub branch: String,
    pub semester: String,
    pub cycle: String,
    pub bio: Option<String>,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New identity for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = identities)]
pub struct NewIdentity<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub usn: &'a str,
    pub branch: &'a str,
    pub semester: &'a str,
    pub cycle: &'a str,
    pub bio: Option<&'a str>,
    pub role: &'a str,
}

// ============================================================================
// Note Models
// ============================================================================

/// Note row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = notes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Note {
    pub id: String,
    pub title: String,
    pub url: String,
    pub subject: String,
    pub branch: String,
    pub semester: String,
    pub note_type: String,
    pub cycle: String,
    pub uploaded_by: Option<String>,
    pub created_at: String,
}

/// New note for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notes)]
pub struct NewNote<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub subject: &'a str,
    pub branch: &'a str,
    pub semester: &'a str,
    pub note_type: &'a str,
    pub cycle: &'a str,
    pub uploaded_by: Option<&'a str>,
}

// ============================================================================
// Follow Edge Models
// ============================================================================

/// Directed follow edge row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = follow_edges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FollowEdge {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: String,
}

/// New follow edge for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = follow_edges)]
pub struct NewFollowEdge<'a> {
    pub id: &'a str,
    pub follower_id: &'a str,
    pub following_id: &'a str,
}

// ============================================================================
// Badge Models
// ============================================================================

/// Badge row from SELECT query.
/// Keyed by USN, not an identity foreign key; grants to unknown USNs are
/// allowed and duplicates are not de-duplicated.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = badges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Badge {
    pub id: String,
    pub usn: String,
    pub badge_type: String,
    pub image_ref: String,
    pub created_at: String,
}

/// New badge for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = badges)]
pub struct NewBadge<'a> {
    pub id: &'a str,
    pub usn: &'a str,
    pub badge_type: &'a str,
    pub image_ref: &'a str,
}
