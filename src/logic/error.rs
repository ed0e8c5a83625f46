use crate::model::GroupId;

pub type Result<T> = std::result::Result<T, HierarchyError>;

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("group name must not be empty")]
    InvalidName,

    #[error("parent group {0} not found")]
    ParentNotFound(GroupId),

    #[error("group {id} still has {children} child group(s)")]
    HasChildren { id: GroupId, children: i64 },

    #[error("closure table is inconsistent: {0}")]
    Integrity(String),

    /// Failure reported by the store, passed through untouched.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl HierarchyError {
    /// Human-readable message including the full store error chain.
    pub fn message(&self) -> String {
        match self {
            HierarchyError::Store(err) => format!("{:#}", err),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_store_message_keeps_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("connection reset"));
        let err = HierarchyError::from(err.context("Failed to create asset group").unwrap_err());
        assert_eq!(
            err.message(),
            "Failed to create asset group: connection reset"
        );
    }

    #[test]
    fn test_domain_messages() {
        assert_eq!(
            HierarchyError::ParentNotFound(42).message(),
            "parent group 42 not found"
        );
        assert_eq!(
            HierarchyError::HasChildren { id: 2, children: 3 }.message(),
            "group 2 still has 3 child group(s)"
        );
    }
}
