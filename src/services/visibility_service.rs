//! Visibility service - content visibility resolution
//!
//! Computes which notes a viewer can see. Entry-level viewers match on
//! semester plus cycle, where general material tagged "none" is always
//! included alongside the viewer's own cycle; everyone else matches on
//! branch plus semester. The dashboard listing is grouped by subject and
//! served through the rendered-view cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::db::{self, identities, notes, DbPool};
use crate::db::models::{branches, cycles, note_types, semesters, Identity, Note};
use crate::error::PortalError;
use crate::view_cache::{ViewCache, ViewKey};

use super::events::{EventBus, PortalEvent};

/// One dashboard entry: a subject and the notes visible under it
#[derive(Debug, Clone, Serialize)]
pub struct SubjectGroup {
    pub subject: String,
    pub notes: Vec<Note>,
}

/// Visibility service for content listings and uploads
pub struct VisibilityService {
    pool: DbPool,
    events: Arc<EventBus>,
    views: Arc<ViewCache>,
}

impl VisibilityService {
    pub fn new(pool: DbPool, events: Arc<EventBus>, views: Arc<ViewCache>) -> Self {
        Self { pool, events, views }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Dashboard listing grouped by subject, served through the view cache
    pub fn dashboard(&self, viewer_id: &str) -> Result<serde_json::Value, PortalError> {
        let key = ViewKey::Dashboard(viewer_id.to_string());
        if let Some(cached) = self.views.get(&key) {
            return Ok(cached);
        }

        let groups = self.list_visible(viewer_id)?;
        let rendered = serde_json::to_value(&groups)?;
        self.views.put(key, rendered.clone());
        Ok(rendered)
    }

    /// All notes visible to a viewer, grouped by distinct subject label.
    /// Groups are ordered by subject name, notes within a group newest first.
    pub fn list_visible(&self, viewer_id: &str) -> Result<Vec<SubjectGroup>, PortalError> {
        let viewer = self.load_viewer(viewer_id)?;
        let filter = Self::scope_filter(&viewer, None);

        let mut conn = db::get_conn(&self.pool)?;
        let visible = notes::list_notes(&mut conn, &filter)?;

        let mut by_subject: BTreeMap<String, Vec<Note>> = BTreeMap::new();
        for note in visible {
            by_subject.entry(note.subject.clone()).or_default().push(note);
        }

        Ok(by_subject
            .into_iter()
            .map(|(subject, notes)| SubjectGroup { subject, notes })
            .collect())
    }

    /// Notes visible to a viewer within one subject label
    pub fn list_subject(&self, viewer_id: &str, subject: &str) -> Result<Vec<Note>, PortalError> {
        let viewer = self.load_viewer(viewer_id)?;
        let filter = Self::scope_filter(&viewer, Some(subject));

        let mut conn = db::get_conn(&self.pool)?;
        notes::list_notes(&mut conn, &filter)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Insert a note unconditionally (no duplicate or visibility check) and
    /// drop the dashboard views its audience may be holding.
    pub fn upload_note(
        &self,
        caller_id: &str,
        mut input: notes::CreateNoteInput,
    ) -> Result<Note, PortalError> {
        self.validate_note(&input)?;

        if !semesters::is_entry_level(&input.semester) {
            input.cycle = cycles::NONE.to_string();
        }
        input.uploaded_by = Some(caller_id.to_string());

        let mut conn = db::get_conn(&self.pool)?;
        let note = notes::create_note(&mut conn, &input)?;
        drop(conn);

        self.views.invalidate_dashboards();

        self.events.emit(PortalEvent::NoteUploaded {
            id: note.id.clone(),
            subject: note.subject.clone(),
            semester: note.semester.clone(),
        });

        Ok(note)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn load_viewer(&self, viewer_id: &str) -> Result<Identity, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        identities::get_identity(&mut conn, viewer_id)?
            .ok_or_else(|| PortalError::NotFound(format!("Identity {} not found", viewer_id)))
    }

    /// Build the note filter for a viewer.
    /// Entry-level: semester match, cycle in {viewer cycle, "none"}.
    /// Otherwise: branch and semester match.
    fn scope_filter(viewer: &Identity, subject: Option<&str>) -> notes::NoteFilter {
        let mut filter = notes::NoteFilter::new();
        filter.subject = subject.map(str::to_string);
        filter.semester = Some(viewer.semester.clone());

        if semesters::is_entry_level(&viewer.semester) {
            let mut visible_cycles = vec![viewer.cycle.clone()];
            if viewer.cycle != cycles::NONE {
                visible_cycles.push(cycles::NONE.to_string());
            }
            filter.cycles = visible_cycles;
        } else {
            filter.branch = Some(viewer.branch.clone());
        }

        filter
    }

    fn validate_note(&self, input: &notes::CreateNoteInput) -> Result<(), PortalError> {
        if input.title.trim().is_empty() {
            return Err(PortalError::InvalidInput("title is required".into()));
        }

        if input.url.trim().is_empty() {
            return Err(PortalError::InvalidInput("url is required".into()));
        }

        if input.subject.trim().is_empty() {
            return Err(PortalError::InvalidInput("subject is required".into()));
        }

        if !branches::is_valid(&input.branch) {
            return Err(PortalError::InvalidInput(format!(
                "branch '{}' is not valid. Valid branches: {:?}",
                input.branch,
                branches::ALL
            )));
        }

        if !semesters::is_valid(&input.semester) {
            return Err(PortalError::InvalidInput(format!(
                "semester '{}' is not valid. Valid semesters: {:?}",
                input.semester,
                semesters::ALL
            )));
        }

        if !note_types::is_valid(&input.note_type) {
            return Err(PortalError::InvalidInput(format!(
                "type '{}' is not valid. Valid types: {:?}",
                input.note_type,
                note_types::ALL
            )));
        }

        if !cycles::is_valid(&input.cycle) {
            return Err(PortalError::InvalidInput(format!(
                "cycle '{}' is not valid. Valid cycles: {:?}",
                input.cycle,
                cycles::ALL
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::identities::{upsert_identity, UpsertIdentityInput};
    use crate::db::models::roles;
    use crate::db::open_in_memory_pool;

    fn setup() -> VisibilityService {
        let pool = open_in_memory_pool().unwrap();
        VisibilityService::new(pool, Arc::new(EventBus::new()), Arc::new(ViewCache::new()))
    }

    fn add_viewer(service: &VisibilityService, id: &str, branch: &str, semester: &str, cycle: &str) {
        let mut conn = db::get_conn(&service.pool).unwrap();
        upsert_identity(
            &mut conn,
            &UpsertIdentityInput {
                id: id.to_string(),
                name: format!("Student {}", id),
                email: None,
                usn: format!("USN-{}", id),
                branch: branch.to_string(),
                semester: semester.to_string(),
                cycle: cycle.to_string(),
                bio: None,
                role: roles::STUDENT.to_string(),
            },
        )
        .unwrap();
    }

    fn note_input(subject: &str, branch: &str, semester: &str, cycle: &str) -> notes::CreateNoteInput {
        notes::CreateNoteInput {
            title: format!("{} module", subject),
            url: "https://drive.example/x".to_string(),
            subject: subject.to_string(),
            branch: branch.to_string(),
            semester: semester.to_string(),
            note_type: note_types::NOTES.to_string(),
            cycle: cycle.to_string(),
            uploaded_by: None,
        }
    }

    #[test]
    fn test_entry_level_cycle_visibility() {
        let service = setup();
        add_viewer(&service, "p-viewer", "CSE", "1", cycles::P_CYCLE);
        add_viewer(&service, "c-viewer", "CSE", "1", cycles::C_CYCLE);
        add_viewer(&service, "uploader", "CSE", "1", cycles::P_CYCLE);

        service
            .upload_note("uploader", note_input("Physics", "CSE", "1", cycles::P_CYCLE))
            .unwrap();
        service
            .upload_note("uploader", note_input("Physics", "CSE", "1", cycles::NONE))
            .unwrap();

        // P-Cycle viewer sees the cycle-exact note plus the general one
        let p_notes = service.list_subject("p-viewer", "Physics").unwrap();
        assert_eq!(p_notes.len(), 2);

        // C-Cycle viewer only sees the general note
        let c_notes = service.list_subject("c-viewer", "Physics").unwrap();
        assert_eq!(c_notes.len(), 1);
        assert_eq!(c_notes[0].cycle, cycles::NONE);
    }

    #[test]
    fn test_upper_semester_branch_visibility() {
        let service = setup();
        add_viewer(&service, "cse-5", "CSE", "5", cycles::NONE);
        add_viewer(&service, "ece-5", "ECE", "5", cycles::NONE);
        add_viewer(&service, "cse-3", "CSE", "3", cycles::NONE);
        add_viewer(&service, "uploader", "CSE", "5", cycles::NONE);

        service
            .upload_note("uploader", note_input("DBMS", "CSE", "5", cycles::NONE))
            .unwrap();

        assert_eq!(service.list_subject("cse-5", "DBMS").unwrap().len(), 1);
        assert!(service.list_subject("ece-5", "DBMS").unwrap().is_empty());
        assert!(service.list_subject("cse-3", "DBMS").unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_groups_by_subject() {
        let service = setup();
        add_viewer(&service, "viewer", "CSE", "5", cycles::NONE);
        add_viewer(&service, "uploader", "CSE", "5", cycles::NONE);

        service
            .upload_note("uploader", note_input("DBMS", "CSE", "5", cycles::NONE))
            .unwrap();
        service
            .upload_note("uploader", note_input("DBMS", "CSE", "5", cycles::NONE))
            .unwrap();
        service
            .upload_note("uploader", note_input("Networks", "CSE", "5", cycles::NONE))
            .unwrap();

        let groups = service.list_visible("viewer").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].subject, "DBMS");
        assert_eq!(groups[0].notes.len(), 2);
        assert_eq!(groups[1].subject, "Networks");
    }

    #[test]
    fn test_cycle_forced_for_upper_semester_upload() {
        let service = setup();
        add_viewer(&service, "uploader", "CSE", "5", cycles::NONE);

        let note = service
            .upload_note("uploader", note_input("DBMS", "CSE", "5", cycles::P_CYCLE))
            .unwrap();
        assert_eq!(note.cycle, cycles::NONE);
    }

    #[test]
    fn test_upload_rejects_unknown_type() {
        let service = setup();
        add_viewer(&service, "uploader", "CSE", "5", cycles::NONE);

        let mut input = note_input("DBMS", "CSE", "5", cycles::NONE);
        input.note_type = "slides".to_string();
        let result = service.upload_note("uploader", input);
        assert!(matches!(result, Err(PortalError::InvalidInput(_))));
    }

    #[test]
    fn test_dashboard_cached_until_upload() {
        let service = setup();
        add_viewer(&service, "viewer", "CSE", "5", cycles::NONE);
        add_viewer(&service, "uploader", "CSE", "5", cycles::NONE);

        let empty = service.dashboard("viewer").unwrap();
        assert_eq!(empty.as_array().unwrap().len(), 0);

        // Insert behind the service's back: the cached view must not change
        {
            let mut conn = db::get_conn(&service.pool).unwrap();
            notes::create_note(&mut conn, &note_input("DBMS", "CSE", "5", cycles::NONE)).unwrap();
        }
        let stale = service.dashboard("viewer").unwrap();
        assert_eq!(stale.as_array().unwrap().len(), 0);

        // An upload through the service invalidates the view class
        service
            .upload_note("uploader", note_input("Networks", "CSE", "5", cycles::NONE))
            .unwrap();
        let fresh = service.dashboard("viewer").unwrap();
        assert_eq!(fresh.as_array().unwrap().len(), 2);
    }
}
