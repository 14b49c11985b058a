use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seatpool::config::Config;
use seatpool::db::{create_pool, init_db, init_usage_db, AppState, CompanyLocks};
use seatpool::directory::SqliteDirectory;
use seatpool::{handlers, usage, watchdog};

#[derive(Parser, Debug)]
#[command(name = "seatpool")]
#[command(about = "Company seat-license lifecycle and assignment engine")]
struct Cli {
    /// Seed the database with a dev company and a small license pool
    #[arg(long)]
    seed: bool,

    /// Delete databases on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for local poking: one company id and
/// ten active licenses under a fake subscription.
fn seed_dev_data(state: &AppState) {
    use seatpool::db::queries;
    use seatpool::id::EntityType;

    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM licenses", [], |row| row.get(0))
        .expect("Failed to count licenses");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let company_id = EntityType::Company.gen_id();
    let subscription_id = EntityType::Subscription.gen_id();
    let licenses = queries::create_licenses(
        &conn,
        &company_id,
        &subscription_id,
        10,
        None,
        &state.license_key_prefix,
    )
    .expect("Failed to seed licenses");

    tracing::info!("============================================");
    tracing::info!("SEEDED DEV DATA");
    tracing::info!("Company: {}", company_id);
    tracing::info!("Subscription: {}", subscription_id);
    tracing::info!("Licenses: {}", licenses.len());
    tracing::info!("============================================");

    println!();
    println!("--- COPY FROM HERE ---");
    println!("  company_id: {}", company_id);
    println!("  subscription_id: {}", subscription_id);
    println!("  first_license_id: {}", licenses[0].id);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatpool=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    let usage_pool =
        create_pool(&config.usage_database_path).expect("Failed to create usage database pool");

    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }
    {
        let conn = usage_pool.get().expect("Failed to get usage connection");
        init_usage_db(&conn).expect("Failed to initialize usage database");
    }

    let shutdown = CancellationToken::new();
    let recorder = usage::start(db_pool.clone(), usage_pool.clone(), shutdown.clone());

    let state = AppState {
        db: db_pool,
        usage_db: usage_pool,
        locks: CompanyLocks::new(),
        directory: Arc::new(SqliteDirectory::new(
            create_pool(&config.database_path).expect("Failed to create directory pool"),
        )),
        recorder,
        license_key_prefix: config.license_key_prefix.clone(),
        shutdown: shutdown.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SEATPOOL_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Background expiry sweep for time-driven terminal transitions
    let watchdog_cancel = watchdog::start(
        Arc::new(state.license_pool()),
        config.expiry_check_interval_secs,
    );

    let app = handlers::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    let usage_path = config.usage_database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: databases will be deleted on exit");
    }

    tracing::info!("Seatpool server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    // Stop background work: usage writer drains its queue, bulk runs see
    // the cancellation and keep completed work.
    watchdog_cancel.cancel();
    shutdown.cancel();

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral databases...");
        for path in [&db_path, &usage_path] {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("Failed to remove {}: {}", path, e);
            } else {
                tracing::info!("Removed {}", path);
            }
            let _ = std::fs::remove_file(format!("{}-wal", path));
            let _ = std::fs::remove_file(format!("{}-shm", path));
        }
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
