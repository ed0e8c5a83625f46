use serde::{Deserialize, Serialize};

use crate::model::{parent_from_wire, GroupAttrs, GroupId};

/// Create a group under `parent_id` (0 creates a root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub parent_id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateRequest {
    pub fn new(parent_id: GroupId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            parent_id,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn root(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(crate::model::ROOT_PARENT, name, description)
    }

    pub fn parent(&self) -> Option<GroupId> {
        parent_from_wire(self.parent_id)
    }

    pub fn attrs(&self) -> GroupAttrs {
        GroupAttrs::new(self.name.clone(), self.description.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl UpdateRequest {
    pub fn new(id: GroupId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn attrs(&self) -> GroupAttrs {
        GroupAttrs::new(self.name.clone(), self.description.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub id: GroupId,
}

/// `rows_affected` is 0 when the id did not exist; that is still a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub rows_affected: u64,
}

/// Ids of every group row removed by the delete (empty for a missing id).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: Vec<GroupId>,
}
