use anyhow::Result;

use crate::logic::HierarchyService;
use crate::model::{CreateRequest, GroupId};
use crate::store::traits::HierarchyStore;

/// (name, description, index of parent in this list)
const SAMPLE_GROUPS: &[(&str, &str, Option<usize>)] = &[
    ("Electronics", "Consumer and office electronics", None),
    ("Laptops", "Portable computers", Some(0)),
    ("Gaming", "High performance laptops", Some(1)),
    ("Ultrabooks", "Thin and light laptops", Some(1)),
    ("Monitors", "External displays", Some(0)),
    ("Furniture", "Office furniture", None),
    ("Desks", "Standing and fixed desks", Some(5)),
];

/// Load a small demonstration tree unless the store already holds groups.
/// Returns the ids of the created groups.
pub async fn load_seed_data<S: HierarchyStore + ?Sized>(
    service: &HierarchyService<S>,
) -> Result<Vec<GroupId>> {
    if !service.store().list_nodes().await?.is_empty() {
        log::info!("store already holds asset groups, skipping seed data");
        return Ok(Vec::new());
    }

    let mut ids: Vec<GroupId> = Vec::with_capacity(SAMPLE_GROUPS.len());
    for (name, description, parent) in SAMPLE_GROUPS {
        let parent_id = parent.map(|index| ids[index]).unwrap_or(crate::model::ROOT_PARENT);
        let outcome = service
            .create(CreateRequest::new(parent_id, *name, *description))
            .await?;
        ids.push(outcome.id);
    }

    log::info!("seeded {} asset groups", ids.len());
    Ok(ids)
}
