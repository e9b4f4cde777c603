// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cycle detection over a feature dependency graph.
//!
//! Uses depth-first search with the three-colour scheme: a node is white
//! until first visited, grey while it is on the current DFS path, and black
//! once all of its dependencies are explored. Reaching a grey node means the
//! path has looped back on itself; the loop is returned for reporting.
//!
//! Time O(V + E), space O(V).

use std::collections::{HashMap, HashSet};

/// Returns the first cycle found as `[a, b, ..., a]`, or `None`.
///
/// `graph` lists each node with the nodes it depends on. Dependencies that
/// are not themselves listed are treated as leaves.
pub(crate) fn detect_cycle(graph: &[(&str, Vec<&str>)]) -> Option<Vec<String>> {
    let edges: HashMap<&str, &[&str]> = graph
        .iter()
        .map(|(node, deps)| (*node, deps.as_slice()))
        .collect();

    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    let mut path = Vec::new();

    for (node, _) in graph {
        if !visited.contains(node) {
            if let Some(cycle) = dfs(node, &edges, &mut visited, &mut on_path, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, &'a [&'a str]>,
    visited: &mut HashSet<&'a str>,
    on_path: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_path.insert(node);
    path.push(node);

    for &dep in edges.get(node).copied().unwrap_or_default() {
        if on_path.contains(dep) {
            let start = path.iter().position(|n| *n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
        if !visited.contains(dep) {
            if let Some(cycle) = dfs(dep, edges, visited, on_path, path) {
                return Some(cycle);
            }
        }
    }

    on_path.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let graph = vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["a", "b"])];
        assert_eq!(detect_cycle(&graph), None);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = vec![("a", vec!["a"])];
        assert_eq!(detect_cycle(&graph), Some(vec!["a".to_string(), "a".to_string()]));
    }

    #[test]
    fn reports_only_the_looping_segment() {
        let graph = vec![("a", vec!["b"]), ("b", vec!["c"]), ("c", vec!["d"]), ("d", vec!["b"])];
        assert_eq!(
            detect_cycle(&graph),
            Some(vec!["b", "c", "d", "b"].into_iter().map(String::from).collect())
        );
    }

    #[test]
    fn unknown_dependencies_are_leaves() {
        let graph = vec![("a", vec!["external"])];
        assert_eq!(detect_cycle(&graph), None);
    }
}
