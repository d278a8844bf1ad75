//! Strongly connected components.
//!
//! The nodes reachable from the given roots are copied into a `petgraph` graph and
//! decomposed with Tarjan's algorithm. Components are numbered in the order Tarjan
//! closes them, which is a reverse topological order: a component can only reach
//! components with a smaller number (or itself).

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

pub struct SccDecomposition {
    component: Vec<Option<usize>>,
    components: Vec<Vec<usize>>,
}

impl SccDecomposition {
    pub fn new<F, I>(num_nodes: usize, roots: impl IntoIterator<Item = usize>, successors: F) -> Self
    where
        F: Fn(usize) -> I,
        I: IntoIterator<Item = usize>,
    {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut node_of: Vec<Option<NodeIndex>> = vec![None; num_nodes];
        let mut stack = Vec::new();
        for root in roots {
            if node_of[root].is_none() {
                let node = graph.add_node(root);
                node_of[root] = Some(node);
                stack.push((root, node));
            }
        }
        while let Some((v, from)) = stack.pop() {
            for w in successors(v) {
                let to = match node_of[w] {
                    Some(to) => to,
                    None => {
                        let to = graph.add_node(w);
                        node_of[w] = Some(to);
                        stack.push((w, to));
                        to
                    }
                };
                graph.add_edge(from, to, ());
            }
        }

        let mut component = vec![None; num_nodes];
        let components = tarjan_scc(&graph)
            .into_iter()
            .enumerate()
            .map(|(id, scc)| {
                let mut members: Vec<usize> = scc.into_iter().map(|node| graph[node]).collect();
                members.sort_unstable();
                for &m in &members {
                    component[m] = Some(id);
                }
                members
            })
            .collect();

        Self {
            component,
            components,
        }
    }

    /// Component of `node`, or `None` if it is unreachable from the roots.
    pub fn component_of(&self, node: usize) -> Option<usize> {
        self.component[node]
    }

    pub fn components(&self) -> &[Vec<usize>] {
        &self.components
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Whether `u` and `v` are both reachable and lie in the same component.
    pub fn same_component(&self, u: usize, v: usize) -> bool {
        match (self.component[u], self.component[v]) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_chain_and_cycle() {
        // 0 -> 1 <-> 2 -> 3, 4 unreachable
        let succ = |v: usize| -> Vec<usize> {
            match v {
                0 => vec![1],
                1 => vec![2],
                2 => vec![1, 3],
                _ => vec![],
            }
        };
        let scc = SccDecomposition::new(5, [0], succ);

        assert_eq!(scc.num_components(), 3);
        assert!(scc.same_component(1, 2));
        assert!(!scc.same_component(0, 1));
        assert_eq!(scc.component_of(4), None);
        assert!(!scc.same_component(4, 4));

        // Sinks close first.
        assert_eq!(scc.components()[0], vec![3]);
        assert_eq!(scc.components()[1], vec![1, 2]);
        assert_eq!(scc.components()[2], vec![0]);
    }

    #[test]
    fn test_self_loop() {
        let scc = SccDecomposition::new(2, [0], |v: usize| if v == 0 { vec![0, 1] } else { vec![] });
        assert_eq!(scc.num_components(), 2);
        assert!(scc.same_component(0, 0));
    }
}
