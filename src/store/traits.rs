use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::model::{AssetGroup, ClosureEdge, GroupAttrs, GroupId};

/// Future returned by the body of a [`run_transaction`] call.
pub type TxFuture<'t, T, E> = Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send + 't>>;

/// Row primitives available inside an open transaction.
///
/// Nothing written through a `HierarchyTx` is visible to other sessions until
/// [`HierarchyTx::commit`] succeeds. Dropping the transaction without committing
/// rolls it back and releases its connection.
#[async_trait::async_trait]
pub trait HierarchyTx: Send {
    /// Insert a group row and return its store-assigned id.
    async fn create_node(&mut self, attrs: &GroupAttrs) -> Result<GroupId>;
    async fn delete_node(&mut self, id: GroupId) -> Result<u64>;
    async fn delete_nodes(&mut self, ids: &[GroupId]) -> Result<u64>;
    /// True when the group row and its self-edge both exist.
    async fn node_exists(&mut self, id: GroupId) -> Result<bool>;

    async fn insert_closure_edge(&mut self, edge: ClosureEdge) -> Result<()>;
    /// For every `(a, parent, d)` insert `(a, child, d + 1)` in one statement.
    async fn copy_closure_edges_for_new_child(
        &mut self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<u64>;
    async fn delete_closure_edges_for_descendant(&mut self, id: GroupId) -> Result<u64>;
    async fn delete_closure_edges_for_descendants(&mut self, ids: &[GroupId]) -> Result<u64>;
    async fn delete_closure_edges_for_ancestor(&mut self, id: GroupId) -> Result<u64>;
    /// Decrement the depth of every edge running from a proper ancestor of `id`
    /// to a proper descendant of `id`.
    async fn shorten_paths_through(&mut self, id: GroupId) -> Result<u64>;

    async fn count_children(&mut self, id: GroupId) -> Result<i64>;
    /// `id` and all of its descendants, nearest first.
    async fn subtree_ids(&mut self, id: GroupId) -> Result<Vec<GroupId>>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait::async_trait]
pub trait HierarchyStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn HierarchyTx>>;

    /// Single-statement update outside any transaction. Returns the number of
    /// rows touched, which is 0 for an unknown id.
    async fn update_node(&self, id: GroupId, attrs: &GroupAttrs) -> Result<u64>;

    async fn get_node(&self, id: GroupId) -> Result<Option<AssetGroup>>;
    async fn list_nodes(&self) -> Result<Vec<AssetGroup>>;
    async fn list_closure_edges(&self) -> Result<Vec<ClosureEdge>>;
}

/// Run `f` inside one transaction: commit when it returns `Ok`, roll back and
/// hand the error back when it returns `Err`.
pub async fn run_transaction<S, T, E, F>(store: &S, f: F) -> std::result::Result<T, E>
where
    S: HierarchyStore + ?Sized,
    T: Send,
    E: From<anyhow::Error> + Send,
    F: for<'t> FnOnce(&'t mut dyn HierarchyTx) -> TxFuture<'t, T, E> + Send,
{
    let mut tx = store.begin().await.map_err(E::from)?;
    let result = f(tx.as_mut()).await;
    match result {
        Ok(value) => {
            tx.commit().await.map_err(E::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!("rollback failed: {:#}", rollback_err);
            }
            Err(err)
        }
    }
}
