use anyhow::{Context, Result};
use asset_hierarchy::config::AppConfig;
use asset_hierarchy::logic::{closure_violations, ensure_closure_invariants};
use asset_hierarchy::{HierarchyStore, PostgresStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();

    let config = AppConfig::load()?;
    let database_url = config.database_url()?;
    let store = PostgresStore::connect(&database_url, &config.database)
        .await
        .context("Could not connect to the asset hierarchy database")?;

    let node_ids: Vec<i64> = store
        .list_nodes()
        .await?
        .into_iter()
        .map(|group| group.id)
        .collect();
    let edges = store.list_closure_edges().await?;
    println!(
        "Checking {} groups and {} closure rows...",
        node_ids.len(),
        edges.len()
    );

    for violation in closure_violations(&node_ids, &edges) {
        println!("  {}", violation);
    }
    ensure_closure_invariants(&node_ids, &edges)?;

    println!("Closure table is consistent.");
    Ok(())
}
