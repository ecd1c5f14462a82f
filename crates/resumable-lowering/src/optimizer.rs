//! State graph optimizer.
//!
//! Passes run to a fixpoint:
//! - unreachable states are removed (with the jump cases they registered)
//! - empty `Goto`-only states are threaded through
//! - a state reached only by a plain `Goto` from its predecessor in the same
//!   scope is merged into that predecessor
//!
//! Afterwards every state gets an output position: greedy depth-first runs
//! follow `Goto` fallthrough edges so that a backend can drop those jumps.
//!
//! States whose label is referenced (scope entries, resume points, `Goto`
//! targets inside bodies) are never merged or threaded away.

use fixedbitset::FixedBitSet;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::graph::{StateGraph, StateId};

/// Counters reported by one optimizer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub removed: usize,
    pub threaded: usize,
    pub merged: usize,
    pub passes: usize,
}

/// Upper bound on fixpoint passes; each pass that changes anything removes
/// at least one edge or node.
const MAX_PASSES: usize = 64;

pub fn optimize(graph: &mut StateGraph) -> OptimizeStats {
    let before = graph.len();
    let mut stats = OptimizeStats::default();
    while stats.passes < MAX_PASSES {
        stats.passes += 1;
        let removed = remove_unreachable(graph);
        let threaded = thread_jumps(graph);
        let merged = merge_chains(graph);
        stats.removed += removed;
        stats.threaded += threaded;
        stats.merged += merged;
        if removed + threaded + merged == 0 {
            break;
        }
    }
    assign_order(graph);
    debug!(
        before,
        after = graph.len(),
        removed = stats.removed,
        threaded = stats.threaded,
        merged = stats.merged,
        passes = stats.passes,
        "optimized state graph"
    );
    stats
}

/// Give states creation order without changing the graph.
pub fn assign_creation_order(graph: &mut StateGraph) {
    let ids: Vec<StateId> = graph.nodes().map(|node| node.id).collect();
    for (order, id) in (0u32..).zip(ids) {
        graph.node_mut(id).order = order;
    }
    graph.sort_by_order();
}

fn capacity(graph: &StateGraph) -> usize {
    graph
        .nodes()
        .map(|node| node.id.0 as usize + 1)
        .max()
        .unwrap_or(0)
}

fn edges(graph: &StateGraph) -> FxHashMap<StateId, Vec<StateId>> {
    let mut edges: FxHashMap<StateId, Vec<StateId>> = FxHashMap::default();
    for node in graph.nodes() {
        let out = edges.entry(node.id).or_default();
        if let Some(transition) = &node.transition {
            out.extend(transition.successors());
        }
    }
    for (from, to) in graph.body_jump_targets() {
        edges.entry(from).or_default().push(to);
    }
    edges
}

fn remove_unreachable(graph: &mut StateGraph) -> usize {
    let edges = edges(graph);
    let mut seen = FixedBitSet::with_capacity(capacity(graph));
    let mut stack = vec![graph.entry()];
    while let Some(id) = stack.pop() {
        if id.0 as usize >= seen.len() || seen.put(id.0 as usize) {
            continue;
        }
        if let Some(next) = edges.get(&id) {
            stack.extend(next.iter().copied().filter(|to| !seen.contains(to.0 as usize)));
        }
    }

    let dead: Vec<StateId> = graph
        .nodes()
        .map(|node| node.id)
        .filter(|id| !seen.contains(id.0 as usize))
        .collect();
    for id in &dead {
        graph.remove_node(*id);
    }
    dead.len()
}

fn predecessor_counts(graph: &StateGraph) -> FxHashMap<StateId, u32> {
    let mut counts: FxHashMap<StateId, u32> = FxHashMap::default();
    for targets in edges(graph).into_values() {
        for to in targets {
            *counts.entry(to).or_default() += 1;
        }
    }
    counts
}

fn thread_jumps(graph: &mut StateGraph) -> usize {
    let referenced = graph.referenced_labels();
    let forward: FxHashMap<StateId, StateId> = graph
        .nodes()
        .filter(|node| node.expressions.is_empty() && !referenced.contains(&node.id))
        .filter_map(|node| node.fallthrough().map(|to| (node.id, to)))
        .filter(|(from, to)| from != to)
        .collect();
    if forward.is_empty() {
        return 0;
    }

    let resolve = |start: StateId| {
        let mut current = start;
        let mut visited = FxHashSet::default();
        while let Some(next) = forward.get(&current) {
            if !visited.insert(current) {
                return start;
            }
            current = *next;
        }
        current
    };

    let ids: Vec<StateId> = graph.nodes().map(|node| node.id).collect();
    let mut changed = 0;
    for id in ids {
        let Some(transition) = graph.node_mut(id).transition.as_mut() else {
            continue;
        };
        transition.retarget(|to| {
            let threaded = resolve(to);
            if threaded != to {
                changed += 1;
            }
            threaded
        });
    }
    changed
}

fn merge_chains(graph: &mut StateGraph) -> usize {
    let referenced = graph.referenced_labels();
    let preds = predecessor_counts(graph);
    let ids: Vec<StateId> = graph.nodes().map(|node| node.id).collect();
    let mut merged = 0;
    for id in ids {
        while graph.contains(id) {
            let Some(next) = mergeable_successor(graph, id, &referenced, &preds) else {
                break;
            };
            graph.rename_holder(next, id);
            let Some(absorbed) = graph.remove_node(next) else {
                break;
            };
            let node = graph.node_mut(id);
            node.expressions.extend(absorbed.expressions);
            node.transition = absorbed.transition;
            if absorbed.result.is_some() {
                node.result = absorbed.result;
            }
            merged += 1;
        }
    }
    merged
}

fn mergeable_successor(
    graph: &StateGraph,
    id: StateId,
    referenced: &FxHashSet<StateId>,
    preds: &FxHashMap<StateId, u32>,
) -> Option<StateId> {
    let node = graph.node(id);
    let next = node.fallthrough()?;
    let successor = graph.get(next)?;
    let mergeable = next != id
        && successor.scope == node.scope
        && !referenced.contains(&next)
        && preds.get(&next).copied() == Some(1);
    mergeable.then_some(next)
}

/// Greedy fallthrough ordering, scope by scope.
fn assign_order(graph: &mut StateGraph) {
    let referenced = graph.referenced_labels();
    let mut seen = FixedBitSet::with_capacity(capacity(graph));
    let mut order = 0u32;

    let scopes: Vec<(Option<StateId>, Vec<StateId>)> = graph
        .scopes()
        .iter()
        .map(|scope| (scope.entry, scope.nodes.clone()))
        .collect();
    for (entry, mut members) in scopes {
        members.sort_unstable();
        let mut starts: Vec<StateId> = entry.into_iter().collect();
        starts.extend(members.iter().copied().filter(|id| referenced.contains(id)));
        starts.extend(members.iter().copied());

        for start in starts {
            let mut current = start;
            loop {
                if !graph.contains(current) || seen.put(current.0 as usize) {
                    break;
                }
                let (scope, is_final, next) = {
                    let node = graph.node_mut(current);
                    node.order = order;
                    (node.scope, node.is_final(), node.fallthrough())
                };
                order += 1;
                if is_final {
                    break;
                }
                match next {
                    Some(next) if graph.get(next).is_some_and(|node| node.scope == scope) => {
                        current = next;
                    }
                    _ => break,
                }
            }
        }
    }
    graph.sort_by_order();
}

#[cfg(test)]
#[path = "../tests/optimizer.rs"]
mod tests;
