//! Tournament server: the zonecup engine behind an HTTP/JSON API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use zc_server::{
    api,
    config::{CliOverrides, ServerConfig, StoreBackend},
    logging, metrics,
};
use zonecup::{
    TournamentManager,
    db::{Database, MemoryStore, PgTournamentStore, TournamentStore},
};

const HELP: &str = "\
Run the zonecup tournament server

USAGE:
  zc_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --metrics    IP:PORT     Prometheus listener address [default: env METRICS_BIND, disabled]

FLAGS:
  --memory                 Keep state in memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  STORE_BACKEND            postgres | memory
  DATABASE_URL             PostgreSQL connection string
  DEFAULT_ZONE_SIZE        Entrants per zone for new tournaments
  RUST_LOG                 Log filter (default: info,sqlx=warn,hyper=warn)
  (See .env.example for all configuration options)
";

fn parse_args() -> Result<CliOverrides, Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        memory: pargs.contains("--memory"),
        metrics_bind: pargs.opt_value_from_str::<_, SocketAddr>("--metrics")?,
    };

    let rest = pargs.finish();
    if !rest.is_empty() {
        anyhow::bail!("Unexpected arguments: {:?}", rest);
    }
    Ok(overrides)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let overrides = parse_args()?;
    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    logging::init();
    tracing::info!("Starting tournament server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!("Prometheus metrics at http://{}/metrics", addr);
    }

    let (store, database): (Arc<dyn TournamentStore>, Option<Database>) = match config.store {
        StoreBackend::Postgres => {
            let db = Database::new(&config.database)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to apply migrations")?;
            tracing::info!("Database connected and migrated");

            let store: Arc<dyn TournamentStore> =
                Arc::new(PgTournamentStore::new(Arc::new(db.pool().clone())));
            (store, Some(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; state is lost on exit");
            let store: Arc<dyn TournamentStore> = Arc::new(MemoryStore::new());
            (store, None)
        }
    };

    let state = api::AppState {
        manager: TournamentManager::new(store),
        database: database.clone(),
        tournament_defaults: config.tournament_defaults.clone(),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
