//! Pure graph algorithms over task dependency edges (C3).
//!
//! The repository layer is responsible for persisting edges; this module
//! only answers "would this edge set contain a cycle" and "who depends on
//! this task", given the edge list of a project already loaded in memory.

use std::collections::{HashMap, HashSet};

/// Returns `true` if adding `(task_id -> depends_on)` to `existing_edges`
/// would create a cycle reachable from `depends_on`.
///
/// `existing_edges` is `task_id -> set of depends_on_task_id` for the whole
/// project; a cycle exists iff `task_id` is reachable from `depends_on`
/// following existing edges forward.
pub fn would_create_cycle(
    existing_edges: &HashMap<i64, HashSet<i64>>,
    task_id: i64,
    depends_on: i64,
) -> bool {
    if task_id == depends_on {
        return true; // self-edge, forbidden outright
    }
    let mut stack = vec![depends_on];
    let mut visited = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == task_id {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(deps) = existing_edges.get(&node) {
            stack.extend(deps.iter().copied());
        }
    }
    false
}

/// Builds the reverse index `dependents_of(task_id) -> [tasks that depend on it]`
/// from the forward edge map `task_id -> depends_on_task_id set`.
pub fn reverse_index(forward: &HashMap<i64, HashSet<i64>>) -> HashMap<i64, HashSet<i64>> {
    let mut reverse: HashMap<i64, HashSet<i64>> = HashMap::new();
    for (&task_id, deps) in forward {
        for &dep in deps {
            reverse.entry(dep).or_default().insert(task_id);
        }
    }
    reverse
}

/// Full DAG check over an edge set, used by property tests (P2) and by
/// startup sanity checks. Returns the first cycle found, if any, as a
/// sequence of task ids.
pub fn find_cycle(edges: &HashMap<i64, HashSet<i64>>) -> Option<Vec<i64>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        node: i64,
        edges: &HashMap<i64, HashSet<i64>>,
        marks: &mut HashMap<i64, Mark>,
        path: &mut Vec<i64>,
    ) -> Option<Vec<i64>> {
        marks.insert(node, Mark::Visiting);
        path.push(node);
        if let Some(deps) = edges.get(&node) {
            for &dep in deps {
                match marks.get(&dep) {
                    Some(Mark::Visiting) => {
                        let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                        return Some(path[start..].to_vec());
                    }
                    Some(Mark::Done) => continue,
                    None => {
                        if let Some(cycle) = visit(dep, edges, marks, path) {
                            return Some(cycle);
                        }
                    }
                }
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    for &node in edges.keys() {
        if marks.get(&node).is_none() {
            let mut path = Vec::new();
            if let Some(cycle) = visit(node, edges, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(i64, i64)]) -> HashMap<i64, HashSet<i64>> {
        let mut m: HashMap<i64, HashSet<i64>> = HashMap::new();
        for &(from, to) in pairs {
            m.entry(from).or_default().insert(to);
        }
        m
    }

    #[test]
    fn detects_self_edge() {
        let e = edges(&[]);
        assert!(would_create_cycle(&e, 1, 1));
    }

    #[test]
    fn detects_direct_cycle() {
        // 1 -> 2 already exists; adding 2 -> 1 cycles.
        let e = edges(&[(1, 2)]);
        assert!(would_create_cycle(&e, 2, 1));
    }

    #[test]
    fn scenario_d_transitive_cycle() {
        // T1 -> T2 -> T3 exists; adding T3 -> T1 must cycle (Scenario D).
        let e = edges(&[(1, 2), (2, 3)]);
        assert!(would_create_cycle(&e, 3, 1));
        assert!(!would_create_cycle(&e, 3, 4));
    }

    #[test]
    fn reverse_index_is_correct() {
        let e = edges(&[(1, 2), (3, 2)]);
        let rev = reverse_index(&e);
        assert_eq!(rev.get(&2).cloned(), Some(HashSet::from([1, 3])));
    }

    #[test]
    fn find_cycle_reports_none_on_dag() {
        let e = edges(&[(1, 2), (2, 3)]);
        assert!(find_cycle(&e).is_none());
    }
}
