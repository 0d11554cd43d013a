//! Tarjan's strongly-connected-components decomposition.
//!
//! Grounded on the original `scc.h`/`scc.c`: `strong_connect` recursion over
//! a `not_valid` bitmap, with `index`/`low_link`/`on_stack` arrays and a
//! component id per node. The design notes call for an arena over pointer
//! graphs and for host-stack recursion to be replaced by an explicit work
//! stack so deeply nested components don't blow the stack; this is an
//! iterative rendition of the same algorithm, not a different one.

use crate::graph::Graph;

#[derive(Debug, Clone)]
pub struct Scc {
    pub comp_count: usize,
    /// `comp_id[node] == None` for nodes the caller marked not-valid.
    pub comp_id: Vec<Option<usize>>,
    pub components: Vec<Vec<usize>>,
}

/// A pending `strong_connect(id, ...)` activation, paused at `next_succ`.
/// `returning_from`, when set, is the child just finished recursing into —
/// its `low_link` must be folded into `id`'s before the loop continues.
struct Activation {
    id: usize,
    next_succ: usize,
    returning_from: Option<usize>,
}

pub fn build(graph: &Graph) -> Scc {
    let n = graph.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut low_link = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut comp_id: Vec<Option<usize>> = vec![None; n];
    let mut components: Vec<Vec<usize>> = Vec::new();

    let mut tarjan_stack: Vec<usize> = Vec::new();
    let mut current_index = 0usize;
    let mut comp_count = 0usize;

    for start in 0..n {
        if graph.not_valid[start] || index[start].is_some() {
            continue;
        }

        let mut work: Vec<Activation> = vec![Activation { id: start, next_succ: 0, returning_from: None }];

        while let Some(mut act) = work.pop() {
            if index[act.id].is_none() {
                index[act.id] = Some(current_index);
                low_link[act.id] = current_index;
                current_index += 1;
                tarjan_stack.push(act.id);
                on_stack[act.id] = true;
            }

            if let Some(child) = act.returning_from.take() {
                low_link[act.id] = low_link[act.id].min(low_link[child]);
            }

            let successors = &graph.nodes[act.id].successors;
            let mut descended = false;
            while act.next_succ < successors.len() {
                let succ = successors[act.next_succ];
                act.next_succ += 1;
                if graph.not_valid[succ] {
                    continue;
                }
                if index[succ].is_none() {
                    work.push(Activation { id: act.id, next_succ: act.next_succ, returning_from: Some(succ) });
                    work.push(Activation { id: succ, next_succ: 0, returning_from: None });
                    descended = true;
                    break;
                } else if on_stack[succ] {
                    low_link[act.id] = low_link[act.id].min(index[succ].unwrap());
                }
            }
            if descended {
                continue;
            }

            if low_link[act.id] == index[act.id].unwrap() {
                let mut component = Vec::new();
                loop {
                    let w = tarjan_stack.pop().expect("component root must be on stack");
                    on_stack[w] = false;
                    comp_id[w] = Some(comp_count);
                    component.push(w);
                    if w == act.id {
                        break;
                    }
                }
                components.push(component);
                comp_count += 1;
            }
        }
    }

    Scc { comp_count, comp_id, components }
}
