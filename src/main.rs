use library_catalog::{
    AppState,
    auth::{log_default_accounts, seed_default_accounts},
    config::{AppConfig, Env},
    create_router,
    repository::{self, RepositoryState, SqliteRepository},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the database and the HTTP server, in that order.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate plus the audit trail.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "library_catalog=debug,audit=info,tower_http=info,axum=trace".into());

    // 3. Log format by environment: pretty locally, JSON in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (SQLite) and schema migrations.
    let pool = repository::connect(&config.db_url)
        .await
        .expect("FATAL: Failed to open the SQLite database. Check DATABASE_URL.");
    repository::migrate(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    // 5. Identity store seed accounts.
    seed_default_accounts(repo.as_ref())
        .await
        .expect("FATAL: Failed to seed the default accounts.");

    // LOCAL-ONLY: print the seeded credentials once, as a startup diagnostic.
    if config.env == Env::Local {
        log_default_accounts();
    }

    // 6. Unified State Assembly and Server Startup
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
