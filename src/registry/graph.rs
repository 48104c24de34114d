//! Index-based dependency graph helpers.
//!
//! Nodes are declaration indices; `deps[i]` lists the nodes `i` depends on.
//! An edge `d → i` means `d` must be healthy before `i` starts.

use std::collections::BTreeSet;

/// Returns the first cycle found, as a closed path (`a, b, a`), walking nodes in
/// declaration order.
pub(super) fn find_cycle(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        OnStack,
        Done,
    }

    let mut marks = vec![Mark::New; deps.len()];
    let mut stack: Vec<usize> = Vec::new();

    fn visit(
        node: usize,
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::OnStack;
        stack.push(node);
        for &next in &deps[node] {
            match marks[next] {
                Mark::OnStack => {
                    let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::New => {
                    if let Some(cycle) = visit(next, deps, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        None
    }

    for node in 0..deps.len() {
        if marks[node] == Mark::New {
            if let Some(cycle) = visit(node, deps, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Kahn's algorithm. Among ready nodes the earliest declared goes first.
///
/// Returns `None` if the graph has a cycle.
pub(super) fn topological_order(deps: &[Vec<usize>], dependents: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut in_degree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut sorted = Vec::with_capacity(deps.len());
    while let Some(node) = ready.pop_first() {
        sorted.push(node);
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    (sorted.len() == deps.len()).then_some(sorted)
}

/// Reverses `deps` into a dependents adjacency list.
pub(super) fn invert(deps: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut dependents = vec![Vec::new(); deps.len()];
    for (node, list) in deps.iter().enumerate() {
        for &dep in list {
            dependents[dep].push(node);
        }
    }
    dependents
}
