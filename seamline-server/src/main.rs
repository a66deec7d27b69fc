//! Seamline server binary: config bootstrap, resource wiring and the
//! axum serve loop. See the crate docs in `lib.rs` for the architecture.

use anyhow::Context;
use clap::Parser;
use seamline_core::PostgresScanStore;
use seamline_server::{
    AppState,
    broadcast::ChangeFeedBroadcaster,
    infra::config::{Config, ConfigLoad, ConfigLoader},
    routes,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "seamline-server")]
#[command(about = "Real-time RFID scan ingestion and dashboard fan-out server")]
struct Cli {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// PostgreSQL connection URL (overrides config)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Seconds without a frame before a device connection is closed;
    /// 0 disables the timeout
    #[arg(long, env = "INGEST_IDLE_TIMEOUT_SECS")]
    idle_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_server(cli).await
}

struct ConfigBootstrap {
    config: Arc<Config>,
    database_url: String,
}

async fn load_runtime_config(args: &Cli) -> anyhow::Result<ConfigBootstrap> {
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
    if let Some(url) = args.database_url.clone() {
        config.database.url = Some(url);
    }
    if let Some(secs) = args.idle_timeout {
        config.ingest.idle_timeout_secs = secs;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    let Some(database_url) = config.database.url.clone() else {
        error!("DATABASE_URL must be provided for PostgreSQL connections");
        return Err(anyhow::anyhow!(
            "No PostgreSQL connection configuration found"
        ));
    };

    if !(database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")) {
        error!("Only PostgreSQL database URLs are supported");
        return Err(anyhow::anyhow!(
            "Invalid database URL: must start with postgres:// or postgresql://"
        ));
    }

    Ok(ConfigBootstrap {
        config: Arc::new(config),
        database_url,
    })
}

async fn wire_app_resources(
    config: Arc<Config>,
    database_url: &str,
) -> anyhow::Result<AppState> {
    let store = match PostgresScanStore::connect(database_url).await {
        Ok(store) => {
            info!("Successfully connected to PostgreSQL");
            store
        }
        Err(e) => {
            error!("PostgreSQL connection failed: {}", e);
            return Err(anyhow::anyhow!("Database connection failed: {}", e));
        }
    };

    store
        .initialize_schema()
        .await
        .context("database schema initialization failed")?;
    info!("Database schema initialized successfully");

    Ok(AppState::new(Arc::new(store), config))
}

async fn run_server(args: Cli) -> anyhow::Result<()> {
    let ConfigBootstrap {
        config,
        database_url,
    } = load_runtime_config(&args).await?;

    let state = wire_app_resources(Arc::clone(&config), &database_url).await?;

    // Activated once, after the store connection is confirmed; a store
    // without change-feed support degrades to ingestion-only operation.
    let broadcaster =
        ChangeFeedBroadcaster::new(state.store.clone(), state.dashboards.clone());
    let _change_feed_task = broadcaster.start().await;

    let router = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    info!(
        "Starting Seamline server on {}:{}",
        config.server.host, config.server.port
    );
    info!("Device transport: ws://{}:{}/rfid-ws", config.server.host, config.server.port);
    info!(
        "Dashboard transport: ws://{}:{}/dashboard-ws",
        config.server.host, config.server.port
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
