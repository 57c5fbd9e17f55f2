//! Admin service - badge grants and bulk attribute migrations
//!
//! Every operation here runs behind an explicit authorization guard: the
//! caller's identity must carry the admin role. Bulk migrations are
//! all-or-nothing on the local store; the per-identity directory mirror is
//! best-effort and failures are counted rather than rolled back.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{self, badges, identities, DbPool};
use crate::db::models::{badge_types, cycles, roles, semesters, Badge, Identity};
use crate::directory::{DirectoryProfile, DirectoryProvider};
use crate::error::PortalError;
use crate::view_cache::ViewCache;

use super::events::{EventBus, PortalEvent};

/// Result of a bulk migration
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    /// Identities updated in the local store
    pub count: u64,
    /// Directory mirrors that failed (local rows are already updated;
    /// sync_profile repairs stragglers)
    pub mirror_failures: u64,
}

/// Admin service for privileged operations
pub struct AdminService {
    pool: DbPool,
    directory: Arc<dyn DirectoryProvider>,
    events: Arc<EventBus>,
    views: Arc<ViewCache>,
}

impl AdminService {
    pub fn new(
        pool: DbPool,
        directory: Arc<dyn DirectoryProvider>,
        events: Arc<EventBus>,
        views: Arc<ViewCache>,
    ) -> Self {
        Self {
            pool,
            directory,
            events,
            views,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Grant a badge to a USN. The USN is normalized but not checked against
    /// registered identities, and repeated grants produce repeated rows.
    pub fn grant_badge(
        &self,
        caller_id: &str,
        raw_usn: &str,
        badge_type: &str,
    ) -> Result<Badge, PortalError> {
        self.require_admin(caller_id)?;

        if badge_type.trim().is_empty() {
            return Err(PortalError::InvalidInput("badge type is required".into()));
        }

        let usn = identities::normalize_usn(raw_usn);
        let image_ref = badge_types::image_ref(badge_type);

        let mut conn = db::get_conn(&self.pool)?;
        let badge = badges::grant_badge(&mut conn, &usn, badge_type, image_ref)?;
        drop(conn);

        // The holder's cached profile shows badges
        if let Some(holder) = self.identity_for_usn(&usn)? {
            self.views.invalidate_profile(&holder.id);
        }

        self.events.emit(PortalEvent::BadgeGranted {
            usn: badge.usn.clone(),
            badge_type: badge.badge_type.clone(),
        });

        Ok(badge)
    }

    /// List badges for a USN. Not privileged: the badge gallery is public.
    pub fn list_badges(&self, raw_usn: &str) -> Result<Vec<Badge>, PortalError> {
        let usn = identities::normalize_usn(raw_usn);
        let mut conn = db::get_conn(&self.pool)?;
        badges::list_badges_for_usn(&mut conn, &usn)
    }

    /// Move every identity at `from` to semester `to`
    pub async fn bulk_promote_semester(
        &self,
        caller_id: &str,
        from: &str,
        to: &str,
    ) -> Result<BulkOutcome, PortalError> {
        self.require_admin(caller_id)?;

        if !semesters::is_valid(from) || !semesters::is_valid(to) {
            return Err(PortalError::InvalidInput(format!(
                "semesters must be one of {:?}",
                semesters::ALL
            )));
        }

        if from == to {
            return Err(PortalError::InvalidInput(
                "from and to semesters must differ".into(),
            ));
        }

        let mut conn = db::get_conn(&self.pool)?;
        let promoted = identities::bulk_update_semester(&mut conn, from, to)?;
        drop(conn);

        let count = promoted.len() as u64;
        let mirror_failures = self.mirror_all(&promoted).await;

        // Every dashboard and profile view may now be stale
        self.views.clear();

        info!(from = %from, to = %to, count = count, "Bulk semester promotion complete");
        self.events.emit(PortalEvent::SemesterPromoted {
            from: from.to_string(),
            to: to.to_string(),
            count,
        });

        Ok(BulkOutcome {
            count,
            mirror_failures,
        })
    }

    /// Rotate every entry-level identity at `from` cycle to `to`
    pub async fn bulk_switch_cycle(
        &self,
        caller_id: &str,
        from: &str,
        to: &str,
    ) -> Result<BulkOutcome, PortalError> {
        self.require_admin(caller_id)?;

        if !cycles::is_valid(from) || !cycles::is_valid(to) {
            return Err(PortalError::InvalidInput(format!(
                "cycles must be one of {:?}",
                cycles::ALL
            )));
        }

        if from == to {
            return Err(PortalError::InvalidInput(
                "from and to cycles must differ".into(),
            ));
        }

        let mut conn = db::get_conn(&self.pool)?;
        let rotated =
            identities::bulk_update_cycle(&mut conn, semesters::ENTRY_LEVEL, from, to)?;
        drop(conn);

        let count = rotated.len() as u64;
        let mirror_failures = self.mirror_all(&rotated).await;

        self.views.clear();

        info!(from = %from, to = %to, count = count, "Bulk cycle rotation complete");
        self.events.emit(PortalEvent::CycleRotated {
            from: from.to_string(),
            to: to.to_string(),
            count,
        });

        Ok(BulkOutcome {
            count,
            mirror_failures,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Authorization guard: the caller must be a registered admin
    fn require_admin(&self, caller_id: &str) -> Result<Identity, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        let caller = identities::get_identity(&mut conn, caller_id)?
            .ok_or_else(|| PortalError::Forbidden("administrative role required".into()))?;

        if caller.role != roles::ADMIN {
            return Err(PortalError::Forbidden("administrative role required".into()));
        }

        Ok(caller)
    }

    fn identity_for_usn(&self, usn: &str) -> Result<Option<Identity>, PortalError> {
        let mut conn = db::get_conn(&self.pool)?;
        identities::find_by_usn(&mut conn, usn)
    }

    /// Mirror updated identities into the directory, counting failures
    async fn mirror_all(&self, updated: &[Identity]) -> u64 {
        let mut failures = 0u64;

        for identity in updated {
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
                warn!(id = %identity.id, error = %e, "Directory mirror failed during bulk update");
                failures += 1;
            }
        }

        failures
    }
}
