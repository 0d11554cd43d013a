//! A bare integer-indexed adjacency-list graph, decoupled from [`Cfg`].
//!
//! Grounded on the original `graph.h`/`graph.c`: `Node{successors}` plus a
//! `not_valid` bitmap marking nodes folded away during SCC decomposition,
//! and `GraphMathRepr`, the flattened `(nodes, edges)` pair-list view that
//! `wpo.c` prints and tests against. The C `Vector`s of `int` become
//! `Vec<usize>`; the `not_valid` byte array becomes `Vec<bool>`.

use crate::cfg::Cfg;

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub successors: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub not_valid: Vec<bool>,
}

impl Graph {
    pub fn from_cfg(cfg: &Cfg) -> Graph {
        let nodes = cfg
            .blocks()
            .iter()
            .map(|b| Node { successors: b.successors.clone() })
            .collect::<Vec<_>>();
        let not_valid = vec![false; nodes.len()];
        Graph { nodes, not_valid }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds the induced subgraph over `component`, a list of node indices
    /// in the parent graph. `map[parent_index]` is filled with the new local
    /// index of every node that survives (or left untouched for the rest,
    /// matching the original's "leave non-component entries as -1"
    /// contract, represented here with `None`).
    pub fn from_component(&self, component: &[usize], map: &mut Vec<Option<usize>>) -> Graph {
        map.clear();
        map.resize(self.nodes.len(), None);
        for (local, &parent_index) in component.iter().enumerate() {
            map[parent_index] = Some(local);
        }

        let mut nodes = Vec::with_capacity(component.len());
        for &parent_index in component {
            let parent_node = &self.nodes[parent_index];
            let mut successors = Vec::new();
            for &succ in &parent_node.successors {
                if self.not_valid[succ] {
                    continue;
                }
                if let Some(local_succ) = map[succ] {
                    successors.push(local_succ);
                }
            }
            nodes.push(Node { successors });
        }

        let not_valid = vec![false; nodes.len()];
        Graph { nodes, not_valid }
    }

    pub fn math_repr(&self) -> GraphMathRepr {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut edges = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            nodes.push(i);
            for &succ in &node.successors {
                edges.push((i, succ));
            }
        }
        GraphMathRepr { nodes, edges }
    }
}

/// Flattened `(nodes, edges)` view used for printing and for equality
/// assertions in tests, mirroring the original `GraphMathRepr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphMathRepr {
    pub nodes: Vec<usize>,
    pub edges: Vec<(usize, usize)>,
}
