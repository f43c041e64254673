//! Cite Server
//!
//! An HTTP service that converts bibliographic item data into formatted
//! citations and bibliographies, reusing expensively-initialized
//! formatting engines through a per-style engine pool.

use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cite_server::config::Config;
use cite_server::engine::csl::CslEngineFactory;
use cite_server::locales::LocaleStore;
use cite_server::precache;
use cite_server::routes;
use cite_server::state::AppState;
use cite_server::styles::FileStyleResolver;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cite_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("Starting Cite Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("style repository: {}", config.styles.dir.display());
    tracing::info!("locale directory: {}", config.locales.dir.display());

    // Preload locales into memory; read-only afterwards
    let locales = LocaleStore::from_dir(&config.locales.dir)
        .await
        .context("failed to load locale directory")?;
    tracing::info!("loaded {} locales", locales.len());

    let resolver =
        FileStyleResolver::new(config.styles.dir.clone(), config.styles.base_url.clone());
    let app_state = AppState::new(
        config,
        locales,
        Box::new(resolver),
        Box::new(CslEngineFactory),
    );

    // Pre-warm the engine pool before accepting any traffic
    precache::precache_engines(&app_state)
        .await
        .context("engine precache failed")?;
    tracing::info!("precached {} style+locale engines", app_state.pool().len());

    // Build router
    let app = routes::cite::router()
        .layer(TraceLayer::new_for_http())
        .with_state(app_state.clone());

    // Start server with graceful shutdown
    let host: IpAddr = app_state
        .config()
        .server
        .host
        .parse()
        .context("invalid listen host")?;
    let addr = SocketAddr::from((host, app_state.config().server.port));
    tracing::info!("Cite Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listen address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
