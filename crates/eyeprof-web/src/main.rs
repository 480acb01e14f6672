mod auth;
mod demo;
mod handlers;
mod memory;
mod middleware;
mod routes;
mod state;
mod views;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use eyeprof_core::config::AppConfig;

use auth::{AccessLogLayer, UserTable};
use state::{SharedState, WebApp};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "eyeprof-web", about = "Demo site with the request diagnostics toolbar", version = eyeprof_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8080", env = "EYEPROF_LISTEN")]
    listen: String,

    /// Path to the TOML configuration file. Defaults are used when absent.
    #[arg(long, env = "EYEPROF_CONFIG")]
    config: Option<PathBuf>,

    /// Force `application.debug` on.
    #[arg(long)]
    debug: bool,

    /// Memory reader: "jemalloc" (allocated bytes) or "rss" (resident set size).
    #[arg(long, default_value = "jemalloc", env = "EYEPROF_MEMORY")]
    memory: String,

    /// Accounts as name:password[:role], comma-separated. Role is guest, user or admin.
    #[arg(long, env = "EYEPROF_USERS", value_delimiter = ',')]
    users: Vec<String>,

    /// Save every reported snapshot as JSON into this directory (see eyeprof-dump).
    #[arg(long, env = "EYEPROF_CAPTURE_DIR")]
    capture_dir: Option<PathBuf>,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("eyeprof_web=info,eyeprof_core=info")
            }),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

fn load_config(args: &Args) -> AppConfig {
    let mut config = match &args.config {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "configuration loaded");
                config
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load configuration");
                process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    if args.debug {
        config.application.debug = true;
    }
    config
}

fn build_router(app: SharedState, users: Arc<UserTable>) -> Router {
    Router::new()
        .route("/", get(handlers::handle_home))
        .route(
            "/blog",
            get(handlers::handle_blog_index).post(handlers::handle_blog_create),
        )
        .route("/blog/{id}", get(handlers::handle_blog_post))
        .route("/admin/module/blog", get(handlers::handle_admin_blog))
        .route("/api/v1/health", get(handlers::handle_health))
        .route("/api/v1/widgets", get(handlers::handle_widgets))
        .fallback(handlers::serve_fallback)
        .layer(axum::middleware::from_fn_with_state(
            app.clone(),
            middleware::diagnostics_middleware,
        ))
        .with_state(app)
        // AccessLogLayer sits inside auth so it can read the Viewer extension.
        .layer(AccessLogLayer)
        .layer(axum::middleware::from_fn_with_state(
            users,
            auth::basic_auth_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

async fn async_main(args: Args) {
    let config = load_config(&args);
    info!(
        version = eyeprof_core::VERSION,
        debug = config.application.debug,
        installed = config.installed,
        "starting"
    );

    let Some(memory) = memory::reader_by_name(&args.memory) else {
        error!(memory = %args.memory, "unknown memory reader");
        process::exit(1);
    };

    let users = match UserTable::from_entries(&args.users) {
        Ok(users) => users,
        Err(e) => {
            error!(error = %e, "invalid --users");
            process::exit(1);
        }
    };
    if users.is_empty() {
        warn!("no accounts configured, every viewer is anonymous");
    } else {
        info!(users = users.len(), "basic auth enabled");
    }

    if let Some(dir) = &args.capture_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!(dir = %dir.display(), error = %e, "failed to create capture directory");
            process::exit(1);
        }
        info!(dir = %dir.display(), "capturing reported snapshots");
    }

    let app: SharedState =
        Arc::new(WebApp::new(config, memory).with_capture_dir(args.capture_dir.clone()));
    let router = build_router(app, Arc::new(users));
    let service = router.into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, service).await {
        error!(error = %e, "server error");
        process::exit(1);
    }
}
