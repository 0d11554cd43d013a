//! Weak Partial Order construction, for fixpoint scheduling over
//! (possibly irreducible) control-flow graphs.
//!
//! Grounded on the original `wpo.h`/`wpo.c`: `sccWPO` (the per-component
//! base case, splitting off a head and recursing on the rest) and
//! `wpo_construct` (the per-SCC dispatcher built on top of [`crate::scc`]),
//! glued together by `wpo_construct_aux`'s bookkeeping pass that turns the
//! recursive `WPOComponent` result into a flat scheduling/stabilizing edge
//! graph plus predecessor counts used by the fixpoint driver. `Vector<Pair>`
//! becomes `Vec<(usize, usize)>`; `C` (a recursion-local scratch component)
//! becomes `Vec<usize>`.

use tracing::debug;

use crate::graph::{Graph, GraphMathRepr, Node};
use crate::scc;

#[derive(Debug, Clone, Default)]
struct WpoComponent {
    nodes: Vec<usize>,
    exits: Vec<usize>,
    scheduling_edges: Vec<(usize, usize)>,
    stabilizing_edges: Vec<(usize, usize)>,
    head: usize,
    exit: usize,
}

/// Scratch bookkeeping threaded through the recursive construction: the
/// sequence of recursion frames (`cx`), the head chosen at each frame, and
/// the synthetic exit id minted at each frame.
struct Scratch {
    cx: Vec<Vec<usize>>,
    heads: Vec<usize>,
    exits: Vec<usize>,
    next_exit_id: usize,
}

fn trivial_wpo(node: usize) -> WpoComponent {
    WpoComponent { nodes: vec![node], head: node, exit: node, ..Default::default() }
}

fn self_loop_wpo(node: usize, scratch: &mut Scratch) -> WpoComponent {
    let new_exit = scratch.next_exit_id;
    scratch.next_exit_id += 1;
    WpoComponent {
        nodes: vec![node],
        exits: vec![new_exit],
        scheduling_edges: vec![(node, new_exit)],
        stabilizing_edges: vec![(new_exit, node)],
        head: node,
        exit: new_exit,
    }
}

fn back_edge_count(graph: &GraphMathRepr, head: usize) -> usize {
    graph.edges.iter().filter(|&&(_, to)| to == head).count()
}

/// `sccWPO`: handles one already-strongly-connected component, peeling the
/// minimum-id node off as the loop head and recursing on the remainder.
fn scc_wpo(graph: &GraphMathRepr, scratch: &mut Scratch) -> WpoComponent {
    let head = *graph.nodes.iter().min().expect("component is non-empty");

    if back_edge_count(graph, head) == 0 {
        return trivial_wpo(graph.nodes[0]);
    }
    if graph.nodes.len() == 1 {
        let exit_id = scratch.next_exit_id;
        scratch.cx.push(vec![head, exit_id]);
        scratch.heads.push(head);
        scratch.exits.push(exit_id);
        return self_loop_wpo(graph.nodes[0], scratch);
    }

    let new_exit = scratch.next_exit_id;
    scratch.cx.push(Vec::new());
    let cx_index = scratch.cx.len() - 1;
    scratch.heads.push(head);
    scratch.exits.push(new_exit);
    scratch.next_exit_id += 1;

    let mut nodes = graph.nodes.iter().copied().filter(|&n| n != head).collect::<Vec<_>>();
    nodes.push(new_exit);
    let mut edges = Vec::new();
    for &(from, to) in &graph.edges {
        if to == head {
            edges.push((from, new_exit));
        } else if from != head {
            edges.push((from, to));
        }
    }
    let sub = GraphMathRepr { nodes, edges };

    let inner = construct(&sub, scratch);

    let mut component = inner.exits.clone();
    let mut result_nodes = Vec::new();
    for &node in &inner.nodes {
        if node != new_exit {
            result_nodes.push(node);
        }
        component.push(node);
    }
    component.push(head);
    result_nodes.push(head);
    scratch.cx[cx_index] = component;

    let mut result_exits = inner.exits.clone();
    result_exits.push(new_exit);

    let mut result_scheduling = inner.scheduling_edges.clone();
    for &(from, to) in &graph.edges {
        if from == head {
            result_scheduling.push((from, to));
        }
    }

    let mut result_stabilizing = inner.stabilizing_edges.clone();
    result_stabilizing.push((new_exit, head));

    WpoComponent {
        nodes: result_nodes,
        exits: result_exits,
        scheduling_edges: result_scheduling,
        stabilizing_edges: result_stabilizing,
        head,
        exit: new_exit,
    }
}

/// `wpo_construct`: decomposes `graph` into SCCs and recurses into
/// [`scc_wpo`] per component, then adds the cross-component scheduling
/// edges that run between SCCs in the condensation order.
fn construct(graph_mr: &GraphMathRepr, scratch: &mut Scratch) -> WpoComponent {
    let max_node = graph_mr.nodes.iter().copied().max().map_or(0, |m| m + 1);
    let mut graph = Graph { nodes: vec![Node::default(); max_node], not_valid: vec![true; max_node] };
    for &n in &graph_mr.nodes {
        graph.not_valid[n] = false;
    }
    for &(from, to) in &graph_mr.edges {
        graph.nodes[from].successors.push(to);
    }

    let components = scc::build(&graph);

    let mut result = WpoComponent::default();
    let mut exits_by_component = vec![0usize; components.comp_count];

    for (i, component) in components.components.iter().enumerate() {
        let in_component: std::collections::HashSet<usize> = component.iter().copied().collect();
        let mut comp_nodes = Vec::new();
        let mut comp_edges = Vec::new();
        for &node_id in component {
            comp_nodes.push(node_id);
            for &succ in &graph.nodes[node_id].successors {
                if in_component.contains(&succ) {
                    comp_edges.push((node_id, succ));
                }
            }
        }
        let comp_mr = GraphMathRepr { nodes: comp_nodes, edges: comp_edges };

        let wpo_component = scc_wpo(&comp_mr, scratch);

        result.nodes.extend(wpo_component.nodes.iter().copied());
        result.exits.extend(wpo_component.exits.iter().copied());
        result.scheduling_edges.extend(wpo_component.scheduling_edges.iter().copied());
        result.stabilizing_edges.extend(wpo_component.stabilizing_edges.iter().copied());
        exits_by_component[i] = wpo_component.exit;
    }

    for &(from, to) in &graph_mr.edges {
        if !graph.not_valid[from] && !graph.not_valid[to] {
            if let (Some(cf), Some(ct)) = (components.comp_id[from], components.comp_id[to]) {
                if cf != ct {
                    result.scheduling_edges.push((exits_by_component[cf], to));
                }
            }
        }
    }

    result
}

/// The flattened, query-ready Weak Partial Order: a graph over original
/// nodes plus synthetic exit nodes, partitioned into nested components, with
/// per-node scheduling-predecessor counts the fixpoint driver needs to know
/// when a node's inputs have all stabilized.
#[derive(Debug, Clone)]
pub struct Wpo {
    pub num_nodes: usize,
    pub scheduling_edges: Vec<(usize, usize)>,
    pub stabilizing_edges: Vec<(usize, usize)>,
    pub successors: Vec<Vec<usize>>,
    pub num_sched_pred: Vec<usize>,
    /// `num_outer_sched_pred[component][node]`: scheduling predecessors of
    /// `node` that originate outside `component` — nonzero only at a
    /// component's head, where it counts predecessors from outside the loop.
    pub num_outer_sched_pred: Vec<Vec<usize>>,
    pub node_to_component: Vec<Option<usize>>,
    pub components: Vec<Vec<usize>>,
    pub heads: Vec<usize>,
    pub exits: Vec<usize>,
}

impl Wpo {
    /// Builds the WPO of a [`Graph`] (spec.md §4.4), mirroring
    /// `wpo_construct_aux`'s post-processing of the recursive result.
    pub fn build(graph: &Graph) -> Wpo {
        let graph_mr = graph.math_repr();
        let mut scratch = Scratch { cx: Vec::new(), heads: Vec::new(), exits: Vec::new(), next_exit_id: graph.len() };

        let result = if graph.is_empty() {
            WpoComponent::default()
        } else {
            construct(&graph_mr, &mut scratch)
        };

        let num_nodes = result.nodes.len() + result.exits.len();
        let mut successors = vec![Vec::new(); num_nodes];
        for &(from, to) in result.scheduling_edges.iter().chain(result.stabilizing_edges.iter()) {
            successors[from].push(to);
        }

        let mut num_sched_pred = vec![0usize; num_nodes];
        for &(_, to) in &result.scheduling_edges {
            num_sched_pred[to] += 1;
        }

        let mut node_to_component = vec![None; num_nodes];
        for (i, component) in scratch.cx.iter().enumerate() {
            for &node in component {
                node_to_component[node] = Some(i);
            }
        }

        let mut num_outer_sched_pred = vec![vec![0usize; num_nodes]; scratch.cx.len()];
        for (i, component) in scratch.cx.iter().enumerate() {
            let in_component: std::collections::HashSet<usize> = component.iter().copied().collect();
            for &(from, to) in &result.scheduling_edges {
                if !in_component.contains(&from) && in_component.contains(&to) {
                    num_outer_sched_pred[i][to] += 1;
                }
            }
        }

        debug!(
            num_nodes,
            num_scheduling_edges = result.scheduling_edges.len(),
            num_components = scratch.cx.len(),
            "built WPO"
        );

        Wpo {
            num_nodes,
            scheduling_edges: result.scheduling_edges,
            stabilizing_edges: result.stabilizing_edges,
            successors,
            num_sched_pred,
            num_outer_sched_pred,
            node_to_component,
            components: scratch.cx,
            heads: scratch.heads,
            exits: scratch.exits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    #[test]
    fn acyclic_pair_has_no_exits_or_stabilizing_edges() {
        let g = Graph {
            nodes: vec![Node { successors: vec![1] }, Node { successors: vec![] }],
            not_valid: vec![false, false],
        };
        let wpo = Wpo::build(&g);
        assert!(wpo.stabilizing_edges.is_empty());
        assert_eq!(wpo.scheduling_edges, vec![(0, 1)]);
    }

    #[test]
    fn two_node_cycle_gets_one_synthetic_exit() {
        let g = Graph {
            nodes: vec![Node { successors: vec![1] }, Node { successors: vec![0] }],
            not_valid: vec![false, false],
        };
        let wpo = Wpo::build(&g);
        // Synthetic exit node id is 2 (the original has 2 nodes, ids 0 and 1).
        assert_eq!(wpo.num_nodes, 3);
        assert_eq!(wpo.heads, vec![0]);
        assert_eq!(wpo.exits, vec![2]);
        let mut scheduling_edges = wpo.scheduling_edges.clone();
        scheduling_edges.sort_unstable();
        assert_eq!(scheduling_edges, vec![(0, 1), (1, 2)]);
        assert_eq!(wpo.stabilizing_edges, vec![(2, 0)]);
    }

    #[test]
    fn head_has_outer_predecessor_count_from_loop_entry() {
        // 0 -> 1, 1 -> 2, 2 -> 1 (loop on {1,2}, entered from 0).
        let g = Graph {
            nodes: vec![
                Node { successors: vec![1] },
                Node { successors: vec![2] },
                Node { successors: vec![1] },
            ],
            not_valid: vec![false; 3],
        };
        let wpo = Wpo::build(&g);
        assert_eq!(wpo.heads, vec![1]);
        let comp_of_head = wpo.node_to_component[1].unwrap();
        assert_eq!(wpo.num_outer_sched_pred[comp_of_head][1], 1);
    }

    fn sample_graphs() -> Vec<Graph> {
        vec![
            Graph { nodes: vec![Node { successors: vec![1] }, Node { successors: vec![] }], not_valid: vec![false, false] },
            Graph { nodes: vec![Node { successors: vec![1] }, Node { successors: vec![0] }], not_valid: vec![false, false] },
            Graph {
                nodes: vec![
                    Node { successors: vec![1] },
                    Node { successors: vec![2] },
                    Node { successors: vec![1] },
                ],
                not_valid: vec![false; 3],
            },
        ]
    }

    fn is_acyclic(num_nodes: usize, edges: &[(usize, usize)]) -> bool {
        let mut successors = vec![Vec::new(); num_nodes];
        for &(from, to) in edges {
            successors[from].push(to);
        }
        let mut state = vec![0u8; num_nodes]; // 0 = unvisited, 1 = in-progress, 2 = done
        fn visit(node: usize, successors: &[Vec<usize>], state: &mut [u8]) -> bool {
            match state[node] {
                1 => return false,
                2 => return true,
                _ => {}
            }
            state[node] = 1;
            for &succ in &successors[node] {
                if !visit(succ, successors, state) {
                    return false;
                }
            }
            state[node] = 2;
            true
        }
        (0..num_nodes).all(|n| visit(n, &successors, &mut state))
    }

    #[test]
    fn sum_of_sched_pred_counts_equals_scheduling_edge_count() {
        for g in sample_graphs() {
            let wpo = Wpo::build(&g);
            assert_eq!(wpo.num_sched_pred.iter().sum::<usize>(), wpo.scheduling_edges.len());
        }
    }

    #[test]
    fn scheduling_edges_are_acyclic() {
        for g in sample_graphs() {
            let wpo = Wpo::build(&g);
            assert!(is_acyclic(wpo.num_nodes, &wpo.scheduling_edges));
        }
    }

    #[test]
    fn every_stabilizing_edge_targets_a_head() {
        for g in sample_graphs() {
            let wpo = Wpo::build(&g);
            for &(_from, to) in &wpo.stabilizing_edges {
                assert!(wpo.heads.contains(&to));
            }
        }
    }

    /// Builds a small graph over 4 nodes deterministically from `seed`'s
    /// bits: bit `i` gates the edge `i -> (i+1)%4`, bit `i+4` gates the edge
    /// `i -> (i+2)%4`.
    fn graph_from_seed(seed: u8) -> Graph {
        let n = 4;
        let mut nodes = vec![Node::default(); n];
        for i in 0..n {
            if seed & (1 << i) != 0 {
                nodes[i].successors.push((i + 1) % n);
            }
            if seed & (1 << (i + 4)) != 0 {
                nodes[i].successors.push((i + 2) % n);
            }
        }
        Graph { nodes, not_valid: vec![false; n] }
    }

    #[quickcheck_macros::quickcheck]
    fn sched_pred_count_matches_edges_on_random_graphs(seed: u8) -> bool {
        let wpo = Wpo::build(&graph_from_seed(seed));
        wpo.num_sched_pred.iter().sum::<usize>() == wpo.scheduling_edges.len()
    }

    #[quickcheck_macros::quickcheck]
    fn scheduling_edges_stay_acyclic_on_random_graphs(seed: u8) -> bool {
        let wpo = Wpo::build(&graph_from_seed(seed));
        is_acyclic(wpo.num_nodes, &wpo.scheduling_edges)
    }
}
