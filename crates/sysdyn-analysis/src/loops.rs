//! Feedback-loop enumeration.
//!
//! Johnson's elementary-circuit algorithm over the causal graph, with
//! initial-only edges excluded. Output order is deterministic: circuits
//! are discovered from the lowest node index upward and each loop is
//! reported starting at its lowest member.

use serde::Serialize;
use tracing::warn;

use crate::graph::{CausalGraph, Polarity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopPolarity {
    Reinforcing,
    Balancing,
    Undetermined,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackLoop {
    /// Loop members in traversal order, starting at the lowest-indexed one.
    pub variables: Vec<String>,
    pub polarity: LoopPolarity,
}

/// Enumerate elementary circuits, stopping at `max_loops`.
pub fn find_loops(graph: &CausalGraph, max_loops: usize) -> Vec<FeedbackLoop> {
    let adj = graph.adjacency(false);
    let n = adj.len();
    let mut circuits: Vec<Vec<usize>> = Vec::new();

    let mut blocked = vec![false; n];
    let mut block_lists: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut stack: Vec<usize> = Vec::new();

    for start in 0..n {
        if circuits.len() >= max_loops {
            warn!(max_loops, "feedback loop cap reached; output truncated");
            break;
        }
        for item in blocked.iter_mut().skip(start) {
            *item = false;
        }
        for list in block_lists.iter_mut().skip(start) {
            list.clear();
        }
        circuit(
            start,
            start,
            &adj,
            &mut blocked,
            &mut block_lists,
            &mut stack,
            &mut circuits,
            max_loops,
        );
    }

    circuits
        .into_iter()
        .map(|indices| {
            let polarity = loop_polarity(graph, &indices);
            FeedbackLoop {
                variables: indices.iter().map(|&i| graph.name(i).to_string()).collect(),
                polarity,
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn circuit(
    v: usize,
    start: usize,
    adj: &[Vec<usize>],
    blocked: &mut Vec<bool>,
    block_lists: &mut Vec<Vec<usize>>,
    stack: &mut Vec<usize>,
    circuits: &mut Vec<Vec<usize>>,
    max_loops: usize,
) -> bool {
    let mut found = false;
    stack.push(v);
    blocked[v] = true;

    for &w in &adj[v] {
        if w < start || circuits.len() >= max_loops {
            continue;
        }
        if w == start {
            circuits.push(stack.clone());
            found = true;
        } else if !blocked[w]
            && circuit(w, start, adj, blocked, block_lists, stack, circuits, max_loops)
        {
            found = true;
        }
    }

    if found {
        unblock(v, blocked, block_lists);
    } else {
        for &w in &adj[v] {
            if w >= start && !block_lists[w].contains(&v) {
                block_lists[w].push(v);
            }
        }
    }
    stack.pop();
    found
}

fn unblock(v: usize, blocked: &mut Vec<bool>, block_lists: &mut Vec<Vec<usize>>) {
    blocked[v] = false;
    let pending = std::mem::take(&mut block_lists[v]);
    for w in pending {
        if blocked[w] {
            unblock(w, blocked, block_lists);
        }
    }
}

/// Product of edge polarities around the cycle: an odd number of negative
/// links balances, an even number reinforces.
fn loop_polarity(graph: &CausalGraph, indices: &[usize]) -> LoopPolarity {
    let mut negatives = 0usize;
    for (pos, &from) in indices.iter().enumerate() {
        let to = indices[(pos + 1) % indices.len()];
        match graph.edge(from, to).map(|e| e.polarity) {
            Some(Polarity::Positive) => {}
            Some(Polarity::Negative) => negatives += 1,
            Some(Polarity::Unknown) | None => return LoopPolarity::Undetermined,
        }
    }
    if negatives % 2 == 0 {
        LoopPolarity::Reinforcing
    } else {
        LoopPolarity::Balancing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdyn_model::vensim::parse_vensim;

    fn loops_of(src: &str) -> Vec<FeedbackLoop> {
        let ir = parse_vensim("m", src).unwrap();
        let graph = CausalGraph::from_ir(&ir);
        find_loops(&graph, 1000)
    }

    #[test]
    fn population_has_one_reinforcing_and_one_balancing_loop() {
        let src = "\
Population= INTEG (births - deaths, 1000)\n\t~\t~\t|\n\
births= Population * birth rate\n\t~\t~\t|\n\
deaths= Population / average lifetime\n\t~\t~\t|\n\
birth rate= 0.04\n\t~\t~\t|\n\
average lifetime= 70\n\t~\t~\t|\n";
        let loops = loops_of(src);
        assert_eq!(loops.len(), 2);
        let mut polarities: Vec<LoopPolarity> = loops.iter().map(|l| l.polarity).collect();
        polarities.sort_by_key(|p| format!("{p:?}"));
        assert_eq!(polarities, vec![LoopPolarity::Balancing, LoopPolarity::Reinforcing]);
        for l in &loops {
            assert!(l.variables.contains(&"population".to_string()));
        }
    }

    #[test]
    fn acyclic_model_has_no_loops() {
        let src = "a= 1\n\t~\t~\t|\nb= a + 1\n\t~\t~\t|\n";
        assert!(loops_of(src).is_empty());
    }

    #[test]
    fn shared_node_loops_are_both_found() {
        // two independent cycles through `hub`
        let src = "\
hub= INTEG (spoke one + spoke two, 1)\n\t~\t~\t|\n\
spoke one= hub * 0.1\n\t~\t~\t|\n\
spoke two= hub * 0.2\n\t~\t~\t|\n";
        let loops = loops_of(src);
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.polarity == LoopPolarity::Reinforcing));
    }

    #[test]
    fn initial_references_do_not_create_loops() {
        // the stock's initial value reads a constant derived from the stock
        // only through its initial expression; no runtime loop exists
        let src = "\
S= INTEG (growth, base)\n\t~\t~\t|\n\
growth= 2\n\t~\t~\t|\n\
base= 10\n\t~\t~\t|\n";
        assert!(loops_of(src).is_empty());
    }

    #[test]
    fn loop_cap_truncates() {
        let src = "\
hub= INTEG (spoke one + spoke two, 1)\n\t~\t~\t|\n\
spoke one= hub * 0.1\n\t~\t~\t|\n\
spoke two= hub * 0.2\n\t~\t~\t|\n";
        let ir = parse_vensim("m", src).unwrap();
        let graph = CausalGraph::from_ir(&ir);
        assert_eq!(find_loops(&graph, 1).len(), 1);
    }
}
