use std::sync::Arc;

use crate::config::{DeletePolicy, HierarchyConfig};
use crate::logic::error::{HierarchyError, Result};
use crate::logic::integrity::{closure_violations, ClosureViolation};
use crate::model::{
    ClosureEdge, CreateOutcome, CreateRequest, DeleteOutcome, DeleteRequest, GroupAttrs, GroupId,
    UpdateOutcome, UpdateRequest,
};
use crate::store::traits::{run_transaction, HierarchyStore, HierarchyTx};

/// Create, update and delete asset groups while keeping the closure table an
/// exact copy of the tree's reachability relation.
pub struct HierarchyService<S: HierarchyStore + ?Sized> {
    store: Arc<S>,
    config: HierarchyConfig,
}

impl<S: HierarchyStore + ?Sized> HierarchyService<S> {
    pub fn new(store: Arc<S>, config: HierarchyConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Insert a group and its closure rows in one transaction.
    ///
    /// The new group gets its self edge plus one edge per ancestor of the
    /// parent, one level deeper. Parent id 0 creates a root.
    pub async fn create(&self, request: CreateRequest) -> Result<CreateOutcome> {
        validate_name(&request.name)?;
        let parent = request.parent();
        let attrs = request.attrs();
        let require_parent = self.config.require_existing_parent;

        let id = run_transaction(&*self.store, move |tx| {
            Box::pin(create_in_tx(tx, parent, attrs, require_parent))
        })
        .await?;

        log::info!("created asset group {} under {:?}", id, parent);
        Ok(CreateOutcome { id })
    }

    /// Overwrite name and description. An unknown id is not an error, and
    /// any name is accepted.
    pub async fn update(&self, request: UpdateRequest) -> Result<UpdateOutcome> {
        let rows_affected = self
            .store
            .update_node(request.id, &request.attrs())
            .await?;

        if rows_affected == 0 {
            log::debug!("update of unknown asset group {} was a no-op", request.id);
        }
        Ok(UpdateOutcome { rows_affected })
    }

    /// Remove a group and every closure row that mentions it, handling its
    /// children per the configured [`DeletePolicy`]. An unknown id is not an error.
    pub async fn delete(&self, request: DeleteRequest) -> Result<DeleteOutcome> {
        let id = request.id;
        let policy = self.config.delete_policy;

        let deleted = run_transaction(&*self.store, move |tx| {
            Box::pin(delete_in_tx(tx, id, policy))
        })
        .await?;

        if deleted.is_empty() {
            log::debug!("delete of unknown asset group {} was a no-op", id);
        } else {
            log::info!("deleted asset groups {:?} ({:?})", deleted, policy);
        }
        Ok(DeleteOutcome { deleted })
    }

    /// Compare the stored closure table against the tree it encodes.
    pub async fn verify(&self) -> Result<Vec<ClosureViolation>> {
        let node_ids: Vec<GroupId> = self
            .store
            .list_nodes()
            .await?
            .into_iter()
            .map(|group| group.id)
            .collect();
        let edges = self.store.list_closure_edges().await?;
        Ok(closure_violations(&node_ids, &edges))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(HierarchyError::InvalidName);
    }
    Ok(())
}

async fn create_in_tx(
    tx: &mut dyn HierarchyTx,
    parent: Option<GroupId>,
    attrs: GroupAttrs,
    require_parent: bool,
) -> Result<GroupId> {
    if let Some(parent) = parent {
        if require_parent && !tx.node_exists(parent).await? {
            return Err(HierarchyError::ParentNotFound(parent));
        }
    }

    let id = tx.create_node(&attrs).await?;
    tx.insert_closure_edge(ClosureEdge::self_edge(id)).await?;

    if let Some(parent) = parent {
        let copied = tx.copy_closure_edges_for_new_child(parent, id).await?;
        if copied == 0 {
            log::warn!(
                "parent group {} has no closure rows; group {} was created as a root",
                parent,
                id
            );
        }
    }

    Ok(id)
}

async fn delete_in_tx(
    tx: &mut dyn HierarchyTx,
    id: GroupId,
    policy: DeletePolicy,
) -> Result<Vec<GroupId>> {
    match policy {
        DeletePolicy::Restrict => {
            let children = tx.count_children(id).await?;
            if children > 0 {
                return Err(HierarchyError::HasChildren { id, children });
            }
            tx.delete_closure_edges_for_descendant(id).await?;
            let removed = tx.delete_node(id).await?;
            Ok(if removed > 0 { vec![id] } else { Vec::new() })
        }
        DeletePolicy::Cascade => {
            let mut subtree = tx.subtree_ids(id).await?;
            if !subtree.contains(&id) {
                subtree.insert(0, id);
            }
            tx.delete_closure_edges_for_descendants(&subtree).await?;
            let removed = tx.delete_nodes(&subtree).await?;
            Ok(if removed > 0 { subtree } else { Vec::new() })
        }
        DeletePolicy::Reparent => {
            let shortened = tx.shorten_paths_through(id).await?;
            tx.delete_closure_edges_for_ancestor(id).await?;
            tx.delete_closure_edges_for_descendant(id).await?;
            let removed = tx.delete_node(id).await?;
            if shortened > 0 {
                log::debug!("moved {} closure row(s) up past group {}", shortened, id);
            }
            Ok(if removed > 0 { vec![id] } else { Vec::new() })
        }
    }
}
