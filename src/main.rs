use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clicklens::analytics::CountryResolver;
use clicklens::api::create_api_router;
use clicklens::auth::{AuthService, IdentityProvider};
use clicklens::config::{AuthMode, Config, DatabaseBackend};
use clicklens::redirect::create_redirect_router;
use clicklens::storage::{CachedStorage, PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let backend: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    info!("Initializing database...");
    backend.init().await?;

    let storage: Arc<dyn Storage> = Arc::new(CachedStorage::new(
        backend,
        config.cache.max_entries,
        config.cache.ttl_secs,
    ));

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(AuthService::new(&config.auth, &config.session).await?);
    match config.auth.mode {
        AuthMode::None => info!(
            "Authentication is disabled; every request acts as '{}'",
            config.auth.dev_user_id
        ),
        AuthMode::Oauth => info!("OAuth authentication enabled"),
        AuthMode::Secret => info!("Shared-secret JWT authentication enabled"),
    }

    let countries = CountryResolver::from_config(&config.tracking)?;
    info!(
        proxy_mode = ?config.tracking.trusted_proxy_mode,
        geoip = config.tracking.geoip_country_db_path.is_some(),
        "Click country resolution configured"
    );

    let api_router = create_api_router(Arc::clone(&storage), identity, config.session.clone());
    let redirect_router = create_redirect_router(Arc::clone(&storage), countries);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("Redirect server listening on http://{}", redirect_addr);

    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        ),
    )?;

    Ok(())
}
