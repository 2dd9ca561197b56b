//! Signed causal dependency graph.
//!
//! An edge `a → b` means `a` appears in `b`'s equation. Polarity is the
//! static sign context of the reference: negation, subtraction's right
//! operand and a divisor flip it; contexts whose sign cannot be read off
//! the syntax (comparisons, `ABS`, both branches of a product of unknown
//! sign are still taken as positive per CLD convention) become unknown.
//! Edges that appear only in a stock's initial expression are marked and
//! skipped by the loop search: they act once, at time zero.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use sysdyn_common::expr::{BinaryOp, Builtin, Expr, UnaryOp};
use sysdyn_common::ir::{ModelIr, VarKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Unknown,
}

impl Polarity {
    fn flip(self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
            Polarity::Unknown => Polarity::Unknown,
        }
    }

    /// Merge two sightings of the same reference.
    fn merge(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Polarity::Unknown
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeData {
    pub polarity: Polarity,
    /// True when the reference occurs only in a stock's initial expression.
    pub initial_only: bool,
}

/// Directed graph over canonical variable names.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    pub nodes: IndexSet<String>,
    edges: IndexMap<(usize, usize), EdgeData>,
}

impl CausalGraph {
    pub fn from_ir(ir: &ModelIr) -> Self {
        let mut graph = CausalGraph::default();
        for name in ir.variables.keys() {
            graph.nodes.insert(name.clone());
        }
        for var in ir.variables.values() {
            let scans: Vec<(&Expr, bool)> = match &var.kind {
                VarKind::Stock { initial, net_flow } => {
                    vec![(net_flow, false), (initial, true)]
                }
                VarKind::Flow { equation } | VarKind::Aux { equation } => vec![(equation, false)],
            };
            for (expr, is_initial) in scans {
                let mut refs: IndexMap<String, Polarity> = IndexMap::new();
                signed_refs(expr, Polarity::Positive, &mut refs);
                for (source, polarity) in refs {
                    graph.add_edge(&source, &var.name, polarity, is_initial);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, from: &str, to: &str, polarity: Polarity, initial_only: bool) {
        let Some(from_idx) = self.nodes.get_index_of(from) else {
            return; // dangling reference; parse already rejected these
        };
        let Some(to_idx) = self.nodes.get_index_of(to) else {
            return;
        };
        self.edges
            .entry((from_idx, to_idx))
            .and_modify(|edge| {
                edge.polarity = edge.polarity.merge(polarity);
                edge.initial_only = edge.initial_only && initial_only;
            })
            .or_insert(EdgeData { polarity, initial_only });
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&EdgeData> {
        self.edges.get(&(from, to))
    }

    /// All edges as `(from, to, data)` index triples.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &EdgeData)> {
        self.edges.iter().map(|((from, to), data)| (*from, *to, data))
    }

    /// Adjacency lists by node index, optionally without initial-only edges.
    pub fn adjacency(&self, include_initial: bool) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for ((from, to), data) in &self.edges {
            if include_initial || !data.initial_only {
                adj[*from].push(*to);
            }
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        adj
    }

    pub fn name(&self, index: usize) -> &str {
        self.nodes.get_index(index).map(String::as_str).unwrap_or("?")
    }
}

fn signed_refs(expr: &Expr, sign: Polarity, out: &mut IndexMap<String, Polarity>) {
    match expr {
        Expr::Num(_) | Expr::Time => {}
        Expr::Var(name) => {
            let merged = match out.get(name) {
                Some(existing) => existing.merge(sign),
                None => sign,
            };
            out.insert(name.clone(), merged);
        }
        Expr::Unary(UnaryOp::Neg, inner) => signed_refs(inner, sign.flip(), out),
        Expr::Unary(UnaryOp::Not, inner) => signed_refs(inner, Polarity::Unknown, out),
        Expr::Binary(op, lhs, rhs) => {
            let (lhs_sign, rhs_sign) = match op {
                BinaryOp::Add | BinaryOp::Mul => (sign, sign),
                BinaryOp::Sub | BinaryOp::Div => (sign, sign.flip()),
                BinaryOp::Pow => (sign, Polarity::Unknown),
                BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or => (Polarity::Unknown, Polarity::Unknown),
            };
            signed_refs(lhs, lhs_sign, out);
            signed_refs(rhs, rhs_sign, out);
        }
        Expr::Call(builtin, args) => {
            let arg_signs: Vec<Polarity> = match builtin {
                Builtin::Min | Builtin::Max | Builtin::Sqrt | Builtin::Exp | Builtin::Ln
                | Builtin::Integer => args.iter().map(|_| sign).collect(),
                Builtin::Abs | Builtin::Sin | Builtin::Cos | Builtin::Modulo | Builtin::Pulse => {
                    args.iter().map(|_| Polarity::Unknown).collect()
                }
                Builtin::Step | Builtin::Ramp => {
                    // height/slope carries the sign; timing arguments do not
                    let mut signs = vec![Polarity::Unknown; args.len()];
                    if !signs.is_empty() {
                        signs[0] = sign;
                    }
                    signs
                }
                Builtin::IfThenElse => {
                    let mut signs = vec![sign; args.len()];
                    if !signs.is_empty() {
                        signs[0] = Polarity::Unknown;
                    }
                    signs
                }
            };
            for (arg, arg_sign) in args.iter().zip(arg_signs) {
                signed_refs(arg, arg_sign, out);
            }
        }
    }
}
