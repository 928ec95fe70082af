//! Rental admin server: reads settings from the environment, prepares the store, mounts the API.
//!
//! Run from repo root: `cargo run -p rental-admin-server`

use rental_admin::config::{PolicySettings, StoreSettings};
use rental_admin::{
    apply_migrations, build_app, builtin_config, ensure_database_exists, load_from_dir, resolve, AppState, MemoryStore,
    PgStore, PolicyService, RecordStore, RemotePolicy, RolePolicy, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rental_admin=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = match &settings.catalog_path {
        Some(dir) => load_from_dir(dir).await?,
        None => builtin_config()?,
    };
    let model = resolve(&config)?;

    let store: Arc<dyn RecordStore> = match &settings.store {
        StoreSettings::Postgres {
            database_url,
            max_connections,
        } => {
            ensure_database_exists(database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await?;
            apply_migrations(&pool, &config).await?;
            tracing::info!("using postgres store");
            Arc::new(PgStore::new(pool))
        }
        StoreSettings::Memory => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new(&model))
        }
    };

    let policy: Arc<dyn PolicyService> = match &settings.policy {
        PolicySettings::Remote { url } => {
            tracing::info!(url = %url, "using remote policy service");
            Arc::new(RemotePolicy::new(url)?)
        }
        PolicySettings::Roles { path: Some(path) } => Arc::new(RolePolicy::from_file(path).await?),
        PolicySettings::Roles { path: None } => Arc::new(RolePolicy::builtin()?),
    };

    let state = AppState::new(store, model, policy);
    let app = build_app(state, settings.body_limit_bytes);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
