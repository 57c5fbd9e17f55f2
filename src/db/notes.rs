//! Note CRUD operations using Diesel
//!
//! Notes are append-only: the portal exposes no update or delete. Listing
//! goes through `NoteFilter`, which the visibility resolver builds from the
//! viewer's branch, semester, and cycle.

use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::diesel_schema::notes;
use super::models::{cycles, note_types, NewNote, Note};
use crate::error::PortalError;

// ============================================================================
// Query Types
// ============================================================================

/// Input for creating a note
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNoteInput {
    pub title: String,
    pub url: String,
    pub subject: String,
    pub branch: String,
    pub semester: String,
    #[serde(default = "default_note_type")]
    pub note_type: String,
    #[serde(default = "default_cycle")]
    pub cycle: String,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

fn default_note_type() -> String {
    note_types::NOTES.to_string()
}

fn default_cycle() -> String {
    cycles::NONE.to_string()
}

/// Filter for listing notes. Empty `cycles` means any cycle.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub subject: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<String>,
    pub cycles: Vec<String>,
    pub limit: i64,
    pub offset: i64,
}

impl NoteFilter {
    pub fn new() -> Self {
        Self {
            limit: 500,
            ..Default::default()
        }
    }
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get note by ID
pub fn get_note(conn: &mut SqliteConnection, id: &str) -> Result<Option<Note>, PortalError> {
    notes::table
        .filter(notes::id.eq(id))
        .first(conn)
        .optional()
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

/// List notes matching a filter, newest first
pub fn list_notes(conn: &mut SqliteConnection, filter: &NoteFilter) -> Result<Vec<Note>, PortalError> {
    let mut base_query = notes::table.into_boxed();

    if let Some(ref subject) = filter.subject {
        base_query = base_query.filter(notes::subject.eq(subject));
    }

    if let Some(ref branch) = filter.branch {
        base_query = base_query.filter(notes::branch.eq(branch));
    }

    if let Some(ref semester) = filter.semester {
        base_query = base_query.filter(notes::semester.eq(semester));
    }

    if !filter.cycles.is_empty() {
        base_query = base_query.filter(notes::cycle.eq_any(&filter.cycles));
    }

    base_query
        .order(notes::created_at.desc())
        .limit(filter.limit)
        .offset(filter.offset)
        .load(conn)
        .map_err(|e| PortalError::Database(format!("Query failed: {}", e)))
}

// ============================================================================
// Write Operations
// ============================================================================

/// Insert a note unconditionally. No duplicate check.
pub fn create_note(conn: &mut SqliteConnection, input: &CreateNoteInput) -> Result<Note, PortalError> {
    let id = Uuid::new_v4().to_string();

    let new_note = NewNote {
        id: &id,
        title: &input.title,
        url: &input.url,
        subject: &input.subject,
        branch: &input.branch,
        semester: &input.semester,
        note_type: &input.note_type,
        cycle: &input.cycle,
        uploaded_by: input.uploaded_by.as_deref(),
    };

    diesel::insert_into(notes::table)
        .values(&new_note)
        .execute(conn)
        .map_err(|e| PortalError::Database(format!("Insert failed: {}", e)))?;

    get_note(conn, &id)?
        .ok_or_else(|| PortalError::Internal("Note not found after insert".into()))
}

// ============================================================================
// Stats
// ============================================================================

/// Get note count
pub fn note_count(conn: &mut SqliteConnection) -> Result<i64, PortalError> {
    notes::table
        .count()
        .get_result(conn)
        .map_err(|e| PortalError::Database(format!("Count query failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    fn setup_test_db() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");
        init_schema(&mut conn).expect("Failed to initialize schema");
        conn
    }

    fn sample_note(subject: &str, semester: &str, cycle: &str) -> CreateNoteInput {
        CreateNoteInput {
            title: "Module 1 - Introduction".to_string(),
            url: "https://drive.example/abc".to_string(),
            subject: subject.to_string(),
            branch: "CSE".to_string(),
            semester: semester.to_string(),
            note_type: note_types::NOTES.to_string(),
            cycle: cycle.to_string(),
            uploaded_by: Some("user-1".to_string()),
        }
    }

    #[test]
    fn test_create_and_get() {
        let mut conn = setup_test_db();

        let note = create_note(&mut conn, &sample_note("Maths III", "3", cycles::NONE)).unwrap();
        assert_eq!(note.subject, "Maths III");

        let fetched = get_note(&mut conn, &note.id).unwrap().unwrap();
        assert_eq!(fetched.title, "Module 1 - Introduction");
    }

    #[test]
    fn test_duplicate_inserts_allowed() {
        let mut conn = setup_test_db();

        create_note(&mut conn, &sample_note("Physics", "1", cycles::P_CYCLE)).unwrap();
        create_note(&mut conn, &sample_note("Physics", "1", cycles::P_CYCLE)).unwrap();
        assert_eq!(note_count(&mut conn).unwrap(), 2);
    }

    #[test]
    fn test_cycle_filter_matches_any_of() {
        let mut conn = setup_test_db();

        create_note(&mut conn, &sample_note("Physics", "1", cycles::P_CYCLE)).unwrap();
        create_note(&mut conn, &sample_note("Physics", "1", cycles::C_CYCLE)).unwrap();
        create_note(&mut conn, &sample_note("Physics", "1", cycles::NONE)).unwrap();

        let mut filter = NoteFilter::new();
        filter.semester = Some("1".to_string());
        filter.cycles = vec![cycles::P_CYCLE.to_string(), cycles::NONE.to_string()];

        let visible = list_notes(&mut conn, &filter).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|n| n.cycle != cycles::C_CYCLE));
    }

    #[test]
    fn test_branch_semester_filter() {
        let mut conn = setup_test_db();

        create_note(&mut conn, &sample_note("DBMS", "5", cycles::NONE)).unwrap();
        let mut other = sample_note("DBMS", "5", cycles::NONE);
        other.branch = "ECE".to_string();
        create_note(&mut conn, &other).unwrap();

        let mut filter = NoteFilter::new();
        filter.branch = Some("CSE".to_string());
        filter.semester = Some("5".to_string());

        let visible = list_notes(&mut conn, &filter).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].branch, "CSE");
    }
}
