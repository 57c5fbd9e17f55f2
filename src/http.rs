//! HTTP API for the portal core
//!
//! Thin hyper handlers over the service layer. The authentication gateway in
//! front of the portal resolves the caller and forwards the auth key in the
//! `x-portal-user` header; a gated route without it gets a uniform 401 JSON
//! body rather than an exception.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::db;
use crate::error::PortalError;
use crate::services::{response, OnboardingSubmission, Services};

/// Header carrying the authenticated caller's auth key
pub const AUTH_HEADER: &str = "x-portal-user";

#[derive(Debug, Deserialize)]
struct BioUpdate {
    bio: String,
}

#[derive(Debug, Deserialize)]
struct BadgeGrant {
    usn: String,
    badge_type: String,
}

#[derive(Debug, Deserialize)]
struct BulkMigration {
    from: String,
    to: String,
}

#[derive(Debug, Default, Deserialize)]
struct NotesQuery {
    subject: Option<String>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), PortalError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        let result = match (method, path.as_str()) {
            // Health check
            (Method::GET, "/health") => self.handle_health().await,

            // Identity & onboarding
            (Method::POST, "/onboarding") => self.handle_onboarding(req).await,
            (Method::PUT, "/profile/bio") => self.handle_update_bio(req).await,
            (Method::POST, "/profile/sync") => self.handle_sync_profile(req).await,
            (Method::GET, "/profile") => self.handle_profile(req).await,

            // Notes
            (Method::POST, "/notes") => self.handle_upload_note(req).await,
            (Method::GET, "/notes") => self.handle_list_notes(req).await,

            // Social graph
            (Method::POST, p) if p.starts_with("/follow/") => {
                let target = p.strip_prefix("/follow/").unwrap_or("").to_string();
                self.handle_toggle_follow(req, &target).await
            }
            (Method::GET, "/network") => self.handle_network(req).await,
            (Method::GET, p) if p.starts_with("/users/") => {
                let segments = p.trim_start_matches('/').to_string();
                self.handle_user_route(req, &segments).await
            }

            // Badges (public gallery)
            (Method::GET, p) if p.starts_with("/badges/") => {
                let usn = p.strip_prefix("/badges/").unwrap_or("");
                self.handle_list_badges(usn).await
            }

            // Administrative operations
            (Method::POST, "/admin/badges") => self.handle_grant_badge(req).await,
            (Method::POST, "/admin/promote") => self.handle_bulk_promote(req).await,
            (Method::POST, "/admin/rotate-cycle") => self.handle_bulk_rotate(req).await,

            // Not found
            _ => Ok(response::not_found("Not Found")),
        };

        match result {
            Ok(resp) => Ok(resp),
            Err(e) => {
                if matches!(e, PortalError::Database(_) | PortalError::Internal(_)) {
                    error!(error = %e, "Request error");
                }
                Ok(response::error_response(e))
            }
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Health check endpoint
    async fn handle_health(&self) -> Result<Response<Full<Bytes>>, PortalError> {
        let mut conn = db::get_conn(&self.services.pool)?;
        let stats = db::stats(&mut conn)?;

        Ok(response::ok(&serde_json::json!({
            "status": "ok",
            "identities": stats.identity_count,
            "notes": stats.note_count,
            "follow_edges": stats.follow_edge_count,
            "badges": stats.badge_count,
            "cached_views": self.services.views.len(),
        })))
    }

    async fn handle_onboarding(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let submission: OnboardingSubmission = read_json(req).await?;

        let identity = self
            .services
            .onboarding
            .complete_onboarding(&caller, submission)
            .await?;
        Ok(response::created(&identity))
    }

    async fn handle_update_bio(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let update: BioUpdate = read_json(req).await?;

        let identity = self.services.onboarding.update_bio(&caller, &update.bio).await?;
        Ok(response::ok(&identity))
    }

    async fn handle_sync_profile(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let identity = self.services.onboarding.sync_profile(&caller).await?;
        Ok(response::ok(&identity))
    }

    async fn handle_profile(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let view = self.services.social.profile(&caller)?;
        Ok(response::ok(&view))
    }

    async fn handle_upload_note(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let input = read_json(req).await?;

        let note = self.services.visibility.upload_note(&caller, input)?;
        Ok(response::created(&note))
    }

    /// Dashboard listing, or a single subject when `?subject=` is present
    async fn handle_list_notes(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let query: NotesQuery = parse_query(&req)?;

        match query.subject {
            Some(subject) => {
                let listed = self.services.visibility.list_subject(&caller, &subject)?;
                Ok(response::ok(&listed))
            }
            None => {
                let dashboard = self.services.visibility.dashboard(&caller)?;
                Ok(response::ok(&dashboard))
            }
        }
    }

    async fn handle_toggle_follow(
        &self,
        req: Request<Incoming>,
        target: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let toggle = self.services.social.toggle_follow(&caller, target)?;
        Ok(response::ok(&toggle))
    }

    async fn handle_network(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let network = self.services.social.list_network(&caller)?;
        Ok(response::ok(&network))
    }

    /// `/users/{id}/stats|followers|following`
    async fn handle_user_route(
        &self,
        req: Request<Incoming>,
        path: &str,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let _caller = caller_id(&req)?;
        let segments: Vec<&str> = path.split('/').collect();

        match segments.as_slice() {
            ["users", id, "stats"] => {
                let stats = self.services.social.follow_stats(id)?;
                Ok(response::ok(&stats))
            }
            ["users", id, "followers"] => {
                let listed = self.services.social.list_followers(id)?;
                Ok(response::ok(&listed))
            }
            ["users", id, "following"] => {
                let listed = self.services.social.list_following(id)?;
                Ok(response::ok(&listed))
            }
            _ => Ok(response::not_found("Not Found")),
        }
    }

    async fn handle_list_badges(&self, usn: &str) -> Result<Response<Full<Bytes>>, PortalError> {
        let listed = self.services.admin.list_badges(usn)?;
        Ok(response::ok(&listed))
    }

    async fn handle_grant_badge(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let grant: BadgeGrant = read_json(req).await?;

        let badge = self
            .services
            .admin
            .grant_badge(&caller, &grant.usn, &grant.badge_type)?;
        Ok(response::created(&badge))
    }

    async fn handle_bulk_promote(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let migration: BulkMigration = read_json(req).await?;

        let outcome = self
            .services
            .admin
            .bulk_promote_semester(&caller, &migration.from, &migration.to)
            .await?;
        Ok(response::ok(&outcome))
    }

    async fn handle_bulk_rotate(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, PortalError> {
        let caller = caller_id(&req)?;
        let migration: BulkMigration = read_json(req).await?;

        let outcome = self
            .services
            .admin
            .bulk_switch_cycle(&caller, &migration.from, &migration.to)
            .await?;
        Ok(response::ok(&outcome))
    }
}

// ============================================================================
// Request Helpers
// ============================================================================

/// Resolve the authenticated caller from the gateway header
fn caller_id<B>(req: &Request<B>) -> Result<String, PortalError> {
    req.headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PortalError::AuthRequired("No authenticated identity".into()))
}

/// Read and deserialize a JSON request body
async fn read_json<T: serde::de::DeserializeOwned>(req: Request<Incoming>) -> Result<T, PortalError> {
    let body = req
        .collect()
        .await
        .map_err(|e| PortalError::InvalidInput(format!("Failed to read body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&body).map_err(PortalError::from)
}

/// Parse the URL query string into a typed struct
fn parse_query<T: serde::de::DeserializeOwned, B>(req: &Request<B>) -> Result<T, PortalError> {
    let query = req.uri().query().unwrap_or("");
    serde_urlencoded::from_str(query)
        .map_err(|e| PortalError::InvalidInput(format!("Invalid query string: {}", e)))
}
