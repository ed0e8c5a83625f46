pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

pub use api::routes;
pub use logic::{HierarchyError, HierarchyService};
pub use model::*;
pub use store::{HierarchyStore, HierarchyTx, MemoryStore, PostgresStore};

use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};

/// Open the store selected by `database.backend`, creating tables when needed.
pub async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn HierarchyStore>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let database_url = config.database_url()?;
            let store = PostgresStore::connect(&database_url, &config.database).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            log::warn!("using the in-memory store; groups are lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Serve the group endpoints on an already bound listener until it fails.
pub async fn serve<S: HierarchyStore + ?Sized + 'static>(
    listener: tokio::net::TcpListener,
    service: Arc<HierarchyService<S>>,
) -> anyhow::Result<()> {
    let app = api::routes::create_router::<S>().with_state(service);
    axum::serve(listener, app).await?;
    Ok(())
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = AppConfig::load()?;
    let store = connect_store(&config).await?;
    let service = Arc::new(HierarchyService::new(store, config.hierarchy.clone()));

    let listener = tokio::net::TcpListener::bind(config.server_address()).await?;
    serve(listener, service).await
}
