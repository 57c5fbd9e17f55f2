//! Campus Hub - student portal core
//!
//! Authentication-gated note sharing, a directed follow graph, profile and
//! badge management, and administrative bulk migrations over a local SQLite
//! store. Authentication itself lives in an upstream gateway; the identity
//! provider that stores profile attributes is reached through the
//! [`directory::DirectoryProvider`] seam.
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (hyper, thin)        http.rs
//!     ↓
//! Service Layer (policy modules)     services/*.rs
//!     ↓
//! Repository Layer (Diesel)          db/*.rs
//!     ↓
//! SQLite Database (r2d2 pool)
//! ```
//!
//! Policy modules:
//! - Onboarding: identity establishment, USN uniqueness, directory mirroring
//! - Visibility: branch/semester/cycle content matching, subject grouping
//! - Social: follow toggling, aggregate counts, profile views
//! - Admin: badge grants and bulk migrations behind a role guard

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod http;
pub mod services;
pub mod view_cache;

// Re-exports
pub use config::Config;
pub use directory::{DirectoryProfile, DirectoryProvider, InMemoryDirectory};
pub use error::PortalError;
pub use http::HttpServer;
pub use services::Services;
pub use view_cache::{ViewCache, ViewKey};
