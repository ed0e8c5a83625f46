pub type GroupId = i64;

/// Parent id meaning "no parent": the new group becomes a root.
pub const ROOT_PARENT: GroupId = 0;

/// Map the wire-level parent id onto an optional parent.
pub fn parent_from_wire(parent_id: GroupId) -> Option<GroupId> {
    if parent_id == ROOT_PARENT {
        None
    } else {
        Some(parent_id)
    }
}
