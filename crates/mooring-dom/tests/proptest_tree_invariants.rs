#![forbid(unsafe_code)]

//! Property tests for document tree invariants.
//!
//! Validates, under random sequences of inserts, moves, and removals:
//! - parent and child links always agree, and no child appears twice;
//! - no node is its own ancestor;
//! - every successful insertion yields exactly one addition record, and
//!   every detach (explicit or as part of a move) one removal record.

use proptest::prelude::*;

use mooring_dom::{AdjacentPosition, Document, NodeId, ObserveOptions};

// ============================================================================
// Strategy helpers
// ============================================================================

const POOL: usize = 8;

#[derive(Debug, Clone)]
enum Op {
    Append { parent: usize, node: usize },
    InsertBefore { parent: usize, node: usize, reference: usize },
    Adjacent { target: usize, mode: u8, node: usize },
    Remove { node: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Index POOL stands for the body element.
    let slot = 0..=POOL;
    prop_oneof![
        3 => (slot.clone(), 0..POOL).prop_map(|(parent, node)| Op::Append { parent, node }),
        2 => (slot.clone(), 0..POOL, 0..POOL)
            .prop_map(|(parent, node, reference)| Op::InsertBefore { parent, node, reference }),
        2 => (0..POOL, 0u8..4, 0..POOL)
            .prop_map(|(target, mode, node)| Op::Adjacent { target, mode, node }),
        1 => (0..POOL).prop_map(|node| Op::Remove { node }),
    ]
}

fn mode(raw: u8) -> AdjacentPosition {
    match raw {
        0 => AdjacentPosition::BeforeBegin,
        1 => AdjacentPosition::AfterBegin,
        2 => AdjacentPosition::BeforeEnd,
        _ => AdjacentPosition::AfterEnd,
    }
}

fn check_links(doc: &Document, nodes: &[NodeId]) -> Result<(), TestCaseError> {
    for &node in nodes.iter().chain([doc.body()].iter()) {
        let children = doc.children(node);
        for (i, &child) in children.iter().enumerate() {
            prop_assert_eq!(doc.parent(child), Some(node));
            prop_assert!(!children[i + 1..].contains(&child), "duplicate child");
        }
        if let Some(parent) = doc.parent(node) {
            prop_assert!(doc.children(parent).contains(&node));
            prop_assert!(!doc.contains(node, parent), "cycle through {node}");
        }
    }
    Ok(())
}

// ============================================================================
// Invariant: structure and records stay consistent
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn random_mutations_keep_tree_consistent(
        ops in prop::collection::vec(op_strategy(), 1..60)
    ) {
        let doc = Document::new();
        let nodes: Vec<NodeId> = (0..POOL).map(|_| doc.create_element("div")).collect();
        let pick = |i: usize| if i == POOL { doc.body() } else { nodes[i] };
        // One shallow observer per possible parent, so every record is
        // caught exactly once whether or not its target is connected.
        let observers: Vec<_> = nodes
            .iter()
            .chain([doc.body()].iter())
            .map(|&n| doc.observe(n, ObserveOptions::CHILD_LIST, |_| {}))
            .collect();

        let mut expected_added = 0usize;
        let mut expected_removed = 0usize;

        for op in ops {
            // Any parented node that gets inserted is detached first.
            let (moved, result) = match op {
                Op::Append { parent, node } => {
                    let node = pick(node);
                    (doc.parent(node).is_some(), doc.append_child(pick(parent), node).map(|()| true))
                }
                Op::InsertBefore { parent, node, reference } => {
                    let node = pick(node);
                    let reference = pick(reference);
                    (doc.parent(node).is_some(), doc.insert_before(pick(parent), node, Some(reference)).map(|()| true))
                }
                Op::Adjacent { target, mode: raw, node } => {
                    let node = pick(node);
                    (doc.parent(node).is_some(), doc.insert_adjacent(pick(target), mode(raw), node))
                }
                Op::Remove { node } => {
                    if doc.remove(pick(node)).unwrap() {
                        expected_removed += 1;
                    }
                    (false, Ok(false))
                }
            };
            if let Ok(true) = result {
                expected_added += 1;
                if moved {
                    expected_removed += 1;
                }
            }
            check_links(&doc, &nodes)?;
        }

        let records: Vec<_> = observers.iter().flat_map(|o| o.take_records()).collect();
        let added: usize = records.iter().map(|r| r.added_nodes.len()).sum();
        let removed: usize = records.iter().map(|r| r.removed_nodes.len()).sum();
        prop_assert_eq!(added, expected_added);
        prop_assert_eq!(removed, expected_removed);
    }
}
