use asset_hierarchy::config::AppConfig;
use asset_hierarchy::{connect_store, seed, serve, HierarchyService};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "configuration loaded: server={}:{} backend={:?} delete_policy={:?}",
        config.server.host,
        config.server.port,
        config.database.backend,
        config.hierarchy.delete_policy
    );

    let store = connect_store(&config).await?;
    let service = Arc::new(HierarchyService::new(store, config.hierarchy.clone()));

    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("loading seed data");
        seed::load_seed_data(service.as_ref()).await?;
    }

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("asset hierarchy server running on http://{}", bind_address);

    serve(listener, service).await
}
