//! Campus Hub Daemon
//!
//! Serves the portal core behind the campus authentication gateway.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! campus-hub
//!
//! # Start with custom config
//! campus-hub --config /path/to/config.toml
//!
//! # Start with custom HTTP port
//! campus-hub --http-port 9090
//!
//! # Start with custom data directory
//! campus-hub --data-dir /data/portal
//! ```
//!
//! ## HTTP API
//!
//! - `GET  /health` - Health check
//! - `POST /onboarding` - Complete onboarding
//! - `PUT  /profile/bio` - Update bio
//! - `POST /profile/sync` - Repair profile from the directory
//! - `GET  /profile` - Cached profile view
//! - `POST /notes` - Upload a note
//! - `GET  /notes[?subject=]` - Visible notes, grouped or per subject
//! - `POST /follow/{target}` - Toggle a follow edge
//! - `GET  /users/{id}/stats|followers|following` - Social graph reads
//! - `GET  /network` - All identities with follow state
//! - `GET  /badges/{usn}` - Badge gallery
//! - `POST /admin/badges|promote|rotate-cycle` - Admin operations

use campus_hub::services::events::spawn_logging_listener;
use campus_hub::{db, Config, HttpServer, InMemoryDirectory, Services};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "campus-hub")]
#[command(about = "Campus portal core daemon")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(long, env = "CAMPUS_HUB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "CAMPUS_HUB_HTTP_PORT")]
    http_port: Option<u16>,

    /// Auth key to grant the admin role (repeatable)
    #[arg(long = "admin-id")]
    admin_ids: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("campus_hub=info".parse()?))
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    config.admin_ids.extend(args.admin_ids);

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        "Starting campus-hub"
    );

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    // Open database pool
    let pool = db::open_pool(&config.db_path(), config.max_db_connections)?;

    // Wire services. The in-process directory stands in for the campus
    // identity provider until a deployment plugs its own DirectoryProvider.
    let directory = Arc::new(InMemoryDirectory::new());
    let services = Arc::new(Services::new(pool.clone(), directory, config.admin_ids.clone()));

    // Audit listener for portal events
    let _listener = spawn_logging_listener(services.events.clone());

    // Start HTTP server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(HttpServer::new(services.clone(), http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health                - Health check");
    info!("  POST /onboarding            - Complete onboarding");
    info!("  PUT  /profile/bio           - Update bio");
    info!("  POST /profile/sync          - Repair profile from directory");
    info!("  GET  /profile               - Cached profile view");
    info!("  POST /notes                 - Upload a note");
    info!("  GET  /notes[?subject=]      - Visible notes");
    info!("  POST /follow/{{target}}       - Toggle follow edge");
    info!("  GET  /users/{{id}}/stats      - Follower/following counts");
    info!("  GET  /network               - Identities with follow state");
    info!("  GET  /badges/{{usn}}          - Badge gallery");
    info!("  POST /admin/*               - Administrative operations");

    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    // Run HTTP server with graceful shutdown
    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    // Print stats before exit
    if let Ok(mut conn) = db::get_conn(&pool) {
        if let Ok(stats) = db::stats(&mut conn) {
            info!(
                identities = stats.identity_count,
                notes = stats.note_count,
                follow_edges = stats.follow_edge_count,
                badges = stats.badge_count,
                "Final portal stats"
            );
        }
    }

    Ok(())
}
