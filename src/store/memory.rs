use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::{AssetGroup, ClosureEdge, GroupAttrs, GroupId};
use crate::store::traits::{HierarchyStore, HierarchyTx};

/// Primitive that can be made to fail once, for exercising rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateNode,
    DeleteNode,
    InsertClosureEdge,
    CopyClosureEdges,
    DeleteClosureEdges,
    ShortenPaths,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: GroupId,
    groups: BTreeMap<GroupId, AssetGroup>,
    closure: Vec<ClosureEdge>,
}

/// Process-local store with the same transactional contract as PostgreSQL.
///
/// Transactions are serialised: `begin` holds the state lock until the
/// transaction commits, rolls back or is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<MemoryState>>,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `point` fail.
    pub fn fail_on(&self, point: FailPoint) {
        *self.fail_point.lock() = Some(point);
    }

    /// Insert a closure row without any bookkeeping. Only useful for building
    /// inconsistent fixtures.
    pub async fn insert_raw_edge(&self, edge: ClosureEdge) {
        self.state.lock().await.closure.push(edge);
    }
}

fn trip(fail_point: &Mutex<Option<FailPoint>>, point: FailPoint) -> Result<()> {
    let mut slot = fail_point.lock();
    if *slot == Some(point) {
        *slot = None;
        bail!("injected failure at {:?}", point);
    }
    Ok(())
}

pub struct MemoryTx {
    state: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl MemoryTx {
    fn trip(&self, point: FailPoint) -> Result<()> {
        trip(&self.fail_point, point)
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.restore();
    }
}

#[async_trait::async_trait]
impl HierarchyTx for MemoryTx {
    async fn create_node(&mut self, attrs: &GroupAttrs) -> Result<GroupId> {
        self.trip(FailPoint::CreateNode)?;
        let now = Utc::now();
        self.state.last_id += 1;
        let id = self.state.last_id;
        self.state.groups.insert(
            id,
            AssetGroup {
                id,
                name: attrs.name.clone(),
                description: attrs.description.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn delete_node(&mut self, id: GroupId) -> Result<u64> {
        self.trip(FailPoint::DeleteNode)?;
        Ok(self.state.groups.remove(&id).map_or(0, |_| 1))
    }

    async fn delete_nodes(&mut self, ids: &[GroupId]) -> Result<u64> {
        self.trip(FailPoint::DeleteNode)?;
        let removed = ids
            .iter()
            .filter(|id| self.state.groups.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn node_exists(&mut self, id: GroupId) -> Result<bool> {
        Ok(self.state.groups.contains_key(&id)
            && self
                .state
                .closure
                .iter()
                .any(|edge| *edge == ClosureEdge::self_edge(id)))
    }

    async fn insert_closure_edge(&mut self, edge: ClosureEdge) -> Result<()> {
        self.trip(FailPoint::InsertClosureEdge)?;
        self.state.closure.push(edge);
        Ok(())
    }

    async fn copy_closure_edges_for_new_child(
        &mut self,
        parent: GroupId,
        child: GroupId,
    ) -> Result<u64> {
        self.trip(FailPoint::CopyClosureEdges)?;
        let copied: Vec<ClosureEdge> = self
            .state
            .closure
            .iter()
            .filter(|edge| edge.descendant == parent)
            .map(|edge| ClosureEdge::new(edge.ancestor, child, edge.depth + 1))
            .collect();
        let count = copied.len() as u64;
        self.state.closure.extend(copied);
        Ok(count)
    }

    async fn delete_closure_edges_for_descendant(&mut self, id: GroupId) -> Result<u64> {
        self.trip(FailPoint::DeleteClosureEdges)?;
        let before = self.state.closure.len();
        self.state.closure.retain(|edge| edge.descendant != id);
        Ok((before - self.state.closure.len()) as u64)
    }

    async fn delete_closure_edges_for_descendants(&mut self, ids: &[GroupId]) -> Result<u64> {
        self.trip(FailPoint::DeleteClosureEdges)?;
        let ids: HashSet<GroupId> = ids.iter().copied().collect();
        let before = self.state.closure.len();
        self.state.closure.retain(|edge| !ids.contains(&edge.descendant));
        Ok((before - self.state.closure.len()) as u64)
    }

    async fn delete_closure_edges_for_ancestor(&mut self, id: GroupId) -> Result<u64> {
        self.trip(FailPoint::DeleteClosureEdges)?;
        let before = self.state.closure.len();
        self.state.closure.retain(|edge| edge.ancestor != id);
        Ok((before - self.state.closure.len()) as u64)
    }

    async fn shorten_paths_through(&mut self, id: GroupId) -> Result<u64> {
        self.trip(FailPoint::ShortenPaths)?;
        let below: HashSet<GroupId> = self
            .state
            .closure
            .iter()
            .filter(|edge| edge.ancestor == id && edge.depth > 0)
            .map(|edge| edge.descendant)
            .collect();
        let above: HashSet<GroupId> = self
            .state
            .closure
            .iter()
            .filter(|edge| edge.descendant == id && edge.depth > 0)
            .map(|edge| edge.ancestor)
            .collect();

        let mut updated = 0;
        for edge in self.state.closure.iter_mut() {
            if below.contains(&edge.descendant) && above.contains(&edge.ancestor) {
                edge.depth -= 1;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_children(&mut self, id: GroupId) -> Result<i64> {
        let count = self
            .state
            .closure
            .iter()
            .filter(|edge| edge.ancestor == id && edge.depth == 1)
            .count();
        Ok(count as i64)
    }

    async fn subtree_ids(&mut self, id: GroupId) -> Result<Vec<GroupId>> {
        let mut edges: Vec<&ClosureEdge> = self
            .state
            .closure
            .iter()
            .filter(|edge| edge.ancestor == id)
            .collect();
        edges.sort_by_key(|edge| (edge.depth, edge.descendant));
        Ok(edges.into_iter().map(|edge| edge.descendant).collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.trip(FailPoint::Commit)?;
        tx.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.restore();
        Ok(())
    }
}

#[async_trait::async_trait]
impl HierarchyStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn HierarchyTx>> {
        let state = self.state.clone().lock_owned().await;
        let snapshot = Some(state.clone());
        Ok(Box::new(MemoryTx {
            state,
            snapshot,
            fail_point: self.fail_point.clone(),
        }))
    }

    async fn update_node(&self, id: GroupId, attrs: &GroupAttrs) -> Result<u64> {
        let mut state = self.state.lock().await;
        match state.groups.get_mut(&id) {
            Some(group) => {
                group.name = attrs.name.clone();
                group.description = attrs.description.clone();
                group.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn get_node(&self, id: GroupId) -> Result<Option<AssetGroup>> {
        Ok(self.state.lock().await.groups.get(&id).cloned())
    }

    async fn list_nodes(&self) -> Result<Vec<AssetGroup>> {
        Ok(self.state.lock().await.groups.values().cloned().collect())
    }

    async fn list_closure_edges(&self) -> Result<Vec<ClosureEdge>> {
        let mut edges = self.state.lock().await.closure.clone();
        edges.sort();
        Ok(edges)
    }
}
