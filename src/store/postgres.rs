use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::LevelFilter;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, FromRow, PgPool, Postgres, Transaction};

use crate::config::DatabaseConfig;
use crate::model::{AssetGroup, ClosureEdge, GroupAttrs, GroupId};
use crate::store::traits::{HierarchyStore, HierarchyTx};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ClosureRow {
    ancestor: i64,
    descendant: i64,
    depth: i32,
}

impl From<GroupRow> for AssetGroup {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ClosureRow> for ClosureEdge {
    fn from(row: ClosureRow) -> Self {
        ClosureEdge::new(row.ancestor, row.descendant, row.depth)
    }
}

impl PostgresStore {
    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url)
            .context("Invalid PostgreSQL connection string")?
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(
                LevelFilter::Warn,
                Duration::from_millis(config.slow_statement_ms),
            );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .connect_with(options)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the group and closure tables if they are missing
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to run asset hierarchy migrations")?;
        log::info!("asset hierarchy schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// An open PostgreSQL transaction. sqlx rolls back on drop.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl HierarchyTx for PostgresTx {
    async fn create_node(&mut self, attrs: &GroupAttrs) -> Result<GroupId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO asset_groups (name, description)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&attrs.name)
        .bind(&attrs.description)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to create asset group")?;

        Ok(id)
    }

    async fn delete_node(&mut self, id: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM asset_groups WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete asset group")?;

        Ok(result.rows_affected())
    }

    async fn delete_nodes(&mut self, ids: &[GroupId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM asset_groups WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete asset groups")?;

        Ok(result.rows_affected())
    }

    async fn node_exists(&mut self, id: GroupId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM asset_groups g
                JOIN closure_table c
                  ON c.ancestor = g.id
                 AND c.descendant = g.id
                 AND c.depth = 0
                WHERE g.id = $1
            )
            "#,
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to check asset group")?;

        Ok(exists)
    }

    async fn insert_closure_edge(&mut self, edge: ClosureEdge) -> Result<()> {
        sqlx::query("INSERT INTO closure_table (ancestor, descendant, depth) VALUES ($1, $2, $3)")
            .bind(edge.ancestor)
            .bind(edge.descendant)
            .bind(edge.depth)
            .execute(&mut *self.tx)
            .await
            .context("Failed to insert closure edge")?;

        Ok(())
    }

    async fn copy_closure_edges_for_new_child(
        &mut self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO closure_table (ancestor, descendant, depth)
            SELECT ancestor, $1, depth + 1
            FROM closure_table
            WHERE descendant = $2
            "#,
        )
        .bind(child)
        .bind(parent)
        .execute(&mut *self.tx)
        .await
        .context("Failed to copy parent closure edges")?;

        Ok(result.rows_affected())
    }

    async fn delete_closure_edges_for_descendant(&mut self, id: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM closure_table WHERE descendant = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete closure edges")?;

        Ok(result.rows_affected())
    }

    async fn delete_closure_edges_for_descendants(&mut self, ids: &[GroupId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM closure_table WHERE descendant = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete subtree closure edges")?;

        Ok(result.rows_affected())
    }

    async fn delete_closure_edges_for_ancestor(&mut self, id: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM closure_table WHERE ancestor = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete closure edges")?;

        Ok(result.rows_affected())
    }

    async fn shorten_paths_through(&mut self, id: GroupId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE closure_table
            SET depth = depth - 1
            WHERE descendant IN (
                SELECT descendant
                FROM closure_table
                WHERE ancestor = $1
                  AND depth > 0
            )
            AND ancestor IN (
                SELECT ancestor
                FROM closure_table
                WHERE descendant = $1
                  AND depth > 0
            )
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .context("Failed to shorten paths through asset group")?;

        Ok(result.rows_affected())
    }

    async fn count_children(&mut self, id: GroupId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM closure_table WHERE ancestor = $1 AND depth = 1",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to count child groups")?;

        Ok(count)
    }

    async fn subtree_ids(&mut self, id: GroupId) -> Result<Vec<GroupId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT descendant
            FROM closure_table
            WHERE ancestor = $1
            ORDER BY depth, descendant
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await
        .context("Failed to load subtree")?;

        Ok(ids)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PostgresTx { tx } = *self;
        tx.commit().await.context("Failed to commit transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PostgresTx { tx } = *self;
        tx.rollback().await.context("Failed to roll back transaction")
    }
}

#[async_trait::async_trait]
impl HierarchyStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn HierarchyTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        Ok(Box::new(PostgresTx { tx }))
    }

    async fn update_node(&self, id: GroupId, attrs: &GroupAttrs) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE asset_groups
            SET name = $1,
                description = $2,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&attrs.name)
        .bind(&attrs.description)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update asset group")?;

        Ok(result.rows_affected())
    }

    async fn get_node(&self, id: GroupId) -> Result<Option<AssetGroup>> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM asset_groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch asset group")?;

        Ok(row.map(AssetGroup::from))
    }

    async fn list_nodes(&self) -> Result<Vec<AssetGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM asset_groups
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list asset groups")?;

        Ok(rows.into_iter().map(AssetGroup::from).collect())
    }

    async fn list_closure_edges(&self) -> Result<Vec<ClosureEdge>> {
        let rows = sqlx::query_as::<_, ClosureRow>(
            r#"
            SELECT ancestor, descendant, depth
            FROM closure_table
            ORDER BY ancestor, descendant, depth
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list closure edges")?;

        Ok(rows.into_iter().map(ClosureEdge::from).collect())
    }
}
