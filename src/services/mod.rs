//! Service layer for campus-hub
//!
//! Services encapsulate policy between HTTP handlers and repositories.
//! Each service wraps database operations with:
//! - Input validation and normalization
//! - Authorization guards where the operation is privileged
//! - Event emission for audit/notifications
//! - View-cache invalidation after mutations
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (policy)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod onboarding_service;
pub mod visibility_service;
pub mod social_service;
pub mod admin_service;

// Re-exports
pub use response::*;
pub use events::{EventBus, EventListener, PortalEvent};
pub use onboarding_service::{OnboardingService, OnboardingSubmission};
pub use visibility_service::{SubjectGroup, VisibilityService};
pub use social_service::{FollowToggle, NetworkEntry, ProfileView, SocialService};
pub use admin_service::{AdminService, BulkOutcome};

use std::sync::Arc;

use crate::db::DbPool;
use crate::directory::DirectoryProvider;
use crate::view_cache::ViewCache;

/// Service container for dependency injection
///
/// Holds all services with a shared database pool, directory provider,
/// event bus, and view cache. Pass this to HttpServer for handler access.
pub struct Services {
    pub onboarding: Arc<OnboardingService>,
    pub visibility: Arc<VisibilityService>,
    pub social: Arc<SocialService>,
    pub admin: Arc<AdminService>,
    pub events: Arc<EventBus>,
    pub views: Arc<ViewCache>,
    pub pool: DbPool,
}

impl Services {
    /// Create all services with shared infrastructure
    pub fn new(
        pool: DbPool,
        directory: Arc<dyn DirectoryProvider>,
        admin_ids: Vec<String>,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let views = Arc::new(ViewCache::new());

        Self {
            onboarding: Arc::new(OnboardingService::new(
                pool.clone(),
                directory.clone(),
                events.clone(),
                views.clone(),
                admin_ids,
            )),
            visibility: Arc::new(VisibilityService::new(
                pool.clone(),
                events.clone(),
                views.clone(),
            )),
            social: Arc::new(SocialService::new(
                pool.clone(),
                events.clone(),
                views.clone(),
            )),
            admin: Arc::new(AdminService::new(
                pool.clone(),
                directory,
                events.clone(),
                views.clone(),
            )),
            events,
            views,
            pool,
        }
    }
}
