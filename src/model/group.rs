use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::GroupId;

/// One node of the asset group tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable attributes of a group, as written by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAttrs {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl GroupAttrs {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A row of the closure table: `ancestor` reaches `descendant` in `depth` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClosureEdge {
    pub ancestor: GroupId,
    pub descendant: GroupId,
    pub depth: i32,
}

impl ClosureEdge {
    pub fn new(ancestor: GroupId, descendant: GroupId, depth: i32) -> Self {
        Self {
            ancestor,
            descendant,
            depth,
        }
    }

    pub fn self_edge(id: GroupId) -> Self {
        Self::new(id, id, 0)
    }

    pub fn is_self_reference(&self) -> bool {
        self.ancestor == self.descendant && self.depth == 0
    }

    pub fn is_direct_relationship(&self) -> bool {
        self.depth == 1
    }
}
