//! Onboarding service - identity establishment and profile policy
//!
//! Normalizes and validates declared attributes, enforces USN uniqueness,
//! and keeps the local identity row and the external directory profile in
//! step. The local store is the source of truth and is written first; the
//! directory mirror is best-effort, with `sync_profile` as the repair path.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::db::{self, identities, DbPool};
use crate::db::models::{branches, cycles, roles, semesters, Identity};
use crate::directory::{DirectoryProfile, DirectoryProvider};
use crate::error::PortalError;
use crate::view_cache::ViewCache;

use super::events::{EventBus, PortalEvent};

/// Onboarding form submission
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingSubmission {
    pub full_name: String,
    pub usn: String,
    pub branch: String,
    pub semester: String,
    /// Required for the entry-level semester, ignored otherwise
    #[serde(default)]
    pub cycle: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Onboarding service for identity establishment
pub struct OnboardingService {
    pool: DbPool,
    directory: Arc<dyn DirectoryProvider>,
    events: Arc<EventBus>,
    views: Arc<ViewCache>,
    /// Auth keys granted the admin role at onboarding time
    admin_ids: Vec<String>,
}

impl OnboardingService {
    pub fn new(
        pool: DbPool,
        directory: Arc<dyn DirectoryProvider>,
        events: Arc<EventBus>,
        views: Arc<ViewCache>,
        admin_ids: Vec<String>,
    ) -> Self {
        Self {
            pool,
            directory,
            events,
            views,
            admin_ids,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Establish or refresh the caller's identity from an onboarding
    /// submission. Rejects submissions whose USN is already claimed by a
    /// different identity without performing any write.
    pub async fn complete_onboarding(
        &self,
        caller_id: &str,
        submission: OnboardingSubmission,
    ) -> Result<Identity, PortalError> {
        let cycle = self.validate_submission(&submission)?;
        let usn = identities::normalize_usn(&submission.usn);

        let input = identities::UpsertIdentityInput {
            id: caller_id.to_string(),
            name: submission.full_name.clone(),
            email: submission.email.clone(),
            usn: usn.clone(),
            branch: submission.branch.clone(),
            semester: submission.semester.clone(),
            cycle,
            bio: submission.bio.clone(),
            role: self.role_for(caller_id),
        };

        let identity = self.upsert_checked(&input)?;

        self.views.invalidate_profile(caller_id);
        self.views.invalidate_dashboard(caller_id);

        self.events.emit(PortalEvent::IdentityOnboarded {
            id: identity.id.clone(),
            usn: identity.usn.clone(),
        });

        self.mirror_to_directory(&identity).await?;

        Ok(identity)
    }

    /// Overwrite the caller's bio in both stores. No content validation.
    pub async fn update_bio(&self, caller_id: &str, new_bio: &str) -> Result<Identity, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        let identity = identities::update_bio(&mut conn, caller_id, new_bio)?;
        drop(conn);

        self.views.invalidate_profile(caller_id);

        self.events.emit(PortalEvent::BioUpdated {
            id: caller_id.to_string(),
        });

        self.mirror_to_directory(&identity).await?;

        Ok(identity)
    }

    /// Idempotent repair: pull the caller's directory profile into the local
    /// store. No-op failure unless the directory marks onboarding complete.
    pub async fn sync_profile(&self, caller_id: &str) -> Result<Identity, PortalError> {
        let profile = self
            .directory
            .get_profile(caller_id)
            .await?
            .ok_or_else(|| {
                PortalError::NotFound(format!("No directory profile for {}", caller_id))
            })?;

        if !profile.onboarding_complete {
            return Err(PortalError::InvalidInput(
                "Directory profile has not completed onboarding".into(),
            ));
        }

        let input = identities::UpsertIdentityInput {
            id: caller_id.to_string(),
            name: profile.name,
            email: profile.email,
            usn: identities::normalize_usn(&profile.usn),
            branch: profile.branch,
            semester: profile.semester,
            cycle: profile.cycle,
            bio: profile.bio,
            role: self.role_for(caller_id),
        };

        let identity = self.upsert_checked(&input)?;

        self.views.invalidate_profile(caller_id);
        self.views.invalidate_dashboard(caller_id);

        self.events.emit(PortalEvent::ProfileSynced {
            id: caller_id.to_string(),
        });

        Ok(identity)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Validate the submission and resolve the effective cycle.
    /// Cycle is forced to "none" unless the semester is entry-level.
    fn validate_submission(&self, submission: &OnboardingSubmission) -> Result<String, PortalError> {
        if submission.full_name.trim().is_empty() {
            return Err(PortalError::InvalidInput("full_name is required".into()));
        }

        if !branches::is_valid(&submission.branch) {
            return Err(PortalError::InvalidInput(format!(
                "branch '{}' is not valid. Valid branches: {:?}",
                submission.branch,
                branches::ALL
            )));
        }

        if !semesters::is_valid(&submission.semester) {
            return Err(PortalError::InvalidInput(format!(
                "semester '{}' is not valid. Valid semesters: {:?}",
                submission.semester,
                semesters::ALL
            )));
        }

        if !semesters::is_entry_level(&submission.semester) {
            return Ok(cycles::NONE.to_string());
        }

        match submission.cycle.as_deref() {
            Some(cycle) if cycles::is_valid(cycle) => Ok(cycle.to_string()),
            Some(cycle) => Err(PortalError::InvalidInput(format!(
                "cycle '{}' is not valid. Valid cycles: {:?}",
                cycle,
                cycles::ALL
            ))),
            None => Err(PortalError::InvalidInput(
                "cycle is required for the entry-level semester".into(),
            )),
        }
    }

    /// Conflict-check and upsert in one transaction. The UNKNOWN sentinel is
    /// exempt from the uniqueness rule.
    fn upsert_checked(
        &self,
        input: &identities::UpsertIdentityInput,
    ) -> Result<Identity, PortalError> {
        use diesel::Connection;

        let mut conn = db::get_conn(&self.pool)?;
        conn.transaction(|conn| {
            if input.usn != identities::UNKNOWN_USN {
                if let Some(existing) = identities::find_by_usn(conn, &input.usn)? {
                    if existing.id != input.id {
                        return Err(PortalError::Conflict(format!(
                            "USN {} is already registered",
                            input.usn
                        )));
                    }
                }
            }

            let identity = identities::upsert_identity(conn, input)?;

            // The upsert never touches role on update; promote here when the
            // caller is on the admin allowlist.
            if self.admin_ids.iter().any(|id| id == &input.id) && identity.role != roles::ADMIN {
                return identities::set_role(conn, &input.id, roles::ADMIN);
            }

            Ok(identity)
        })
    }

    fn role_for(&self, caller_id: &str) -> String {
        if self.admin_ids.iter().any(|id| id == caller_id) {
            roles::ADMIN.to_string()
        } else {
            roles::STUDENT.to_string()
        }
    }

    /// Push the identity's attribute set into the directory, marking
    /// onboarding complete. A failed mirror keeps the local write and
    /// surfaces as a Directory error.
    async fn mirror_to_directory(&self, identity: &Identity) -> Result<(), PortalError> {
        let profile = DirectoryProfile {
            name: identity.name.clone(),
            email: identity.email.clone(),
            usn: identity.usn.clone(),
            branch: identity.branch.clone(),
            semester: identity.semester.clone(),
            cycle: identity.cycle.clone(),
            bio: identity.bio.clone(),
            onboarding_complete: true,
        };

        if let Err(e) = self.directory.put_profile(&identity.id, &profile).await {
            warn!(id = %identity.id, error = %e, "Directory mirror failed; local row retained");
            return Err(PortalError::Directory(format!(
                "Profile saved locally but directory update failed: {}",
                e
            )));
        }

        Ok(())
    }
}
