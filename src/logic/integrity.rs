use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::logic::error::{HierarchyError, Result};
use crate::model::{ClosureEdge, GroupId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClosureViolation {
    MissingSelfEdge {
        node_id: GroupId,
    },
    DuplicateEdge {
        edge: ClosureEdge,
        count: usize,
    },
    DanglingReference {
        edge: ClosureEdge,
        missing_node_id: GroupId,
    },
    InvalidDepth {
        edge: ClosureEdge,
    },
    MultipleParents {
        node_id: GroupId,
        parent_ids: Vec<GroupId>,
    },
    CycleDetected {
        node_id: GroupId,
    },
    MissingEdge {
        edge: ClosureEdge,
    },
    UnexpectedEdge {
        edge: ClosureEdge,
    },
}

impl fmt::Display for ClosureViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureViolation::MissingSelfEdge { node_id } => {
                write!(f, "group {} has no self edge", node_id)
            }
            ClosureViolation::DuplicateEdge { edge, count } => write!(
                f,
                "edge ({}, {}, {}) is stored {} times",
                edge.ancestor, edge.descendant, edge.depth, count
            ),
            ClosureViolation::DanglingReference {
                edge,
                missing_node_id,
            } => write!(
                f,
                "edge ({}, {}, {}) references missing group {}",
                edge.ancestor, edge.descendant, edge.depth, missing_node_id
            ),
            ClosureViolation::InvalidDepth { edge } => write!(
                f,
                "edge ({}, {}, {}) has an invalid depth",
                edge.ancestor, edge.descendant, edge.depth
            ),
            ClosureViolation::MultipleParents {
                node_id,
                parent_ids,
            } => write!(f, "group {} has several parents {:?}", node_id, parent_ids),
            ClosureViolation::CycleDetected { node_id } => {
                write!(f, "group {} is its own ancestor", node_id)
            }
            ClosureViolation::MissingEdge { edge } => write!(
                f,
                "expected edge ({}, {}, {}) is missing",
                edge.ancestor, edge.descendant, edge.depth
            ),
            ClosureViolation::UnexpectedEdge { edge } => write!(
                f,
                "edge ({}, {}, {}) does not follow from the tree",
                edge.ancestor, edge.descendant, edge.depth
            ),
        }
    }
}

/// Check that `edges` is exactly the reachability relation of the tree
/// described by its depth-1 rows, over the groups in `node_ids`.
pub fn closure_violations(node_ids: &[GroupId], edges: &[ClosureEdge]) -> Vec<ClosureViolation> {
    let nodes: BTreeSet<GroupId> = node_ids.iter().copied().collect();
    let mut violations = Vec::new();

    let mut counts: BTreeMap<ClosureEdge, usize> = BTreeMap::new();
    for edge in edges {
        *counts.entry(*edge).or_insert(0) += 1;
    }

    let mut actual: BTreeSet<ClosureEdge> = BTreeSet::new();
    for (edge, count) in &counts {
        if *count > 1 {
            violations.push(ClosureViolation::DuplicateEdge {
                edge: *edge,
                count: *count,
            });
        }
        if let Some(missing) = [edge.ancestor, edge.descendant]
            .into_iter()
            .find(|id| !nodes.contains(id))
        {
            violations.push(ClosureViolation::DanglingReference {
                edge: *edge,
                missing_node_id: missing,
            });
            continue;
        }
        let self_pair = edge.ancestor == edge.descendant;
        if edge.depth < 0 || (self_pair && edge.depth != 0) || (!self_pair && edge.depth == 0) {
            violations.push(ClosureViolation::InvalidDepth { edge: *edge });
            continue;
        }
        actual.insert(*edge);
    }

    for node_id in &nodes {
        if !actual.contains(&ClosureEdge::self_edge(*node_id)) {
            violations.push(ClosureViolation::MissingSelfEdge { node_id: *node_id });
        }
    }

    let mut parents: HashMap<GroupId, Vec<GroupId>> = HashMap::new();
    for edge in actual.iter().filter(|edge| edge.is_direct_relationship()) {
        parents.entry(edge.descendant).or_default().push(edge.ancestor);
    }
    for (node_id, parent_ids) in &parents {
        if parent_ids.len() > 1 {
            violations.push(ClosureViolation::MultipleParents {
                node_id: *node_id,
                parent_ids: parent_ids.clone(),
            });
        }
    }

    let mut expected: BTreeSet<ClosureEdge> = BTreeSet::new();
    for node_id in &nodes {
        expected.insert(ClosureEdge::self_edge(*node_id));
        let mut current = *node_id;
        let mut depth = 0;
        while let Some(parent) = parents.get(&current).and_then(|ids| ids.first()) {
            depth += 1;
            if *parent == *node_id || depth as usize > nodes.len() {
                violations.push(ClosureViolation::CycleDetected { node_id: *node_id });
                break;
            }
            expected.insert(ClosureEdge::new(*parent, *node_id, depth));
            current = *parent;
        }
    }

    for edge in expected.difference(&actual) {
        if !edge.is_self_reference() {
            violations.push(ClosureViolation::MissingEdge { edge: *edge });
        }
    }
    for edge in actual.difference(&expected) {
        violations.push(ClosureViolation::UnexpectedEdge { edge: *edge });
    }

    violations
}

pub fn ensure_closure_invariants(node_ids: &[GroupId], edges: &[ClosureEdge]) -> Result<()> {
    let violations = closure_violations(node_ids, edges);
    match violations.first() {
        None => Ok(()),
        Some(first) => Err(HierarchyError::Integrity(format!(
            "{} ({} violation(s) in total)",
            first,
            violations.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(ancestor: GroupId, descendant: GroupId, depth: i32) -> ClosureEdge {
        ClosureEdge::new(ancestor, descendant, depth)
    }

    fn electronics_tree() -> (Vec<GroupId>, Vec<ClosureEdge>) {
        (
            vec![1, 2, 3],
            vec![
                e(1, 1, 0),
                e(1, 2, 1),
                e(2, 2, 0),
                e(1, 3, 2),
                e(2, 3, 1),
                e(3, 3, 0),
            ],
        )
    }

    #[test]
    fn test_consistent_tree_has_no_violations() {
        let (nodes, edges) = electronics_tree();
        assert!(closure_violations(&nodes, &edges).is_empty());
        assert!(ensure_closure_invariants(&nodes, &edges).is_ok());
    }

    #[test]
    fn test_empty_store_is_consistent() {
        assert!(closure_violations(&[], &[]).is_empty());
    }

    #[test]
    fn test_missing_self_edge() {
        let violations = closure_violations(&[1], &[]);
        assert_eq!(violations, vec![ClosureViolation::MissingSelfEdge { node_id: 1 }]);
    }

    #[test]
    fn test_duplicate_edge() {
        let (nodes, mut edges) = electronics_tree();
        edges.push(e(1, 3, 2));
        let violations = closure_violations(&nodes, &edges);
        assert_eq!(
            violations,
            vec![ClosureViolation::DuplicateEdge {
                edge: e(1, 3, 2),
                count: 2
            }]
        );
    }

    #[test]
    fn test_dangling_ancestor_after_naive_delete() {
        // Removing group 2 the naive way: only rows with descendant = 2 go.
        let nodes = vec![1, 3];
        let edges = vec![e(1, 1, 0), e(1, 3, 2), e(2, 3, 1), e(3, 3, 0)];
        let violations = closure_violations(&nodes, &edges);

        assert!(violations.contains(&ClosureViolation::DanglingReference {
            edge: e(2, 3, 1),
            missing_node_id: 2,
        }));
        // (1, 3, 2) no longer follows from any depth-1 chain
        assert!(violations.contains(&ClosureViolation::UnexpectedEdge { edge: e(1, 3, 2) }));
    }

    #[test]
    fn test_missing_transitive_edge() {
        let nodes = vec![1, 2, 3];
        let edges = vec![
            e(1, 1, 0),
            e(1, 2, 1),
            e(2, 2, 0),
            e(2, 3, 1),
            e(3, 3, 0),
        ];
        assert_eq!(
            closure_violations(&nodes, &edges),
            vec![ClosureViolation::MissingEdge { edge: e(1, 3, 2) }]
        );
    }

    #[test]
    fn test_two_parents() {
        let nodes = vec![1, 2, 3];
        let edges = vec![e(1, 1, 0), e(2, 2, 0), e(3, 3, 0), e(1, 3, 1), e(2, 3, 1)];
        let violations = closure_violations(&nodes, &edges);
        assert!(violations
            .iter()
            .any(|v| matches!(v, ClosureViolation::MultipleParents { node_id: 3, .. })));
    }

    #[test]
    fn test_cycle() {
        let nodes = vec![1, 2];
        let edges = vec![e(1, 1, 0), e(2, 2, 0), e(1, 2, 1), e(2, 1, 1)];
        let violations = closure_violations(&nodes, &edges);
        assert!(violations.contains(&ClosureViolation::CycleDetected { node_id: 1 }));
        assert!(violations.contains(&ClosureViolation::CycleDetected { node_id: 2 }));
    }

    #[test]
    fn test_invalid_depths() {
        let nodes = vec![1, 2];
        let edges = vec![e(1, 1, 3), e(2, 2, 0), e(1, 2, 0)];
        let violations = closure_violations(&nodes, &edges);
        assert!(violations.contains(&ClosureViolation::InvalidDepth { edge: e(1, 1, 3) }));
        assert!(violations.contains(&ClosureViolation::InvalidDepth { edge: e(1, 2, 0) }));
        assert!(violations.contains(&ClosureViolation::MissingSelfEdge { node_id: 1 }));
    }

    #[test]
    fn test_ensure_reports_first_violation() {
        let err = ensure_closure_invariants(&[7], &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "closure table is inconsistent: group 7 has no self edge (1 violation(s) in total)"
        );
    }
}
