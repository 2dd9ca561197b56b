//! Model compilation: reference checking and evaluation ordering.
//!
//! Stocks are state: a reference to a stock reads the value integrated so
//! far, so stocks never participate in the per-step dependency graph. A
//! dependency cycle among the remaining variables has no evaluation order
//! and is rejected as an algebraic loop.

use indexmap::IndexMap;
use tracing::debug;

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::ir::{ModelIr, VarKind};

/// A model ready to simulate.
#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub ir: ModelIr,
    /// Non-stock variables in dependency order.
    pub order: Vec<String>,
}

pub fn compile(ir: ModelIr) -> Result<CompiledModel> {
    ir.check_references()?;
    ir.specs.validate()?;
    let order = evaluation_order(&ir)?;
    debug!(model = %ir.name, layer = order.len(), "compiled model");
    Ok(CompiledModel { ir, order })
}

/// Kahn's algorithm over the non-stock dependency graph. IndexMap keeps
/// the tie-break deterministic (declaration order).
fn evaluation_order(ir: &ModelIr) -> Result<Vec<String>> {
    let mut in_degree: IndexMap<&str, usize> = IndexMap::new();
    let mut successors: IndexMap<&str, Vec<&str>> = IndexMap::new();

    for var in ir.variables.values() {
        if var.kind.is_stock() {
            continue;
        }
        in_degree.entry(var.name.as_str()).or_insert(0);
        let equation = match &var.kind {
            VarKind::Flow { equation } | VarKind::Aux { equation } => equation,
            VarKind::Stock { .. } => unreachable!(),
        };
        for referenced in equation.references() {
            let dep = ir
                .get(referenced)
                .unwrap_or_else(|| panic!("unchecked reference `{referenced}`"));
            if dep.kind.is_stock() {
                continue;
            }
            successors.entry(dep.name.as_str()).or_default().push(var.name.as_str());
            *in_degree.entry(var.name.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    let mut next = 0;
    while next < ready.len() {
        let name = ready[next];
        next += 1;
        order.push(name.to_string());
        if let Some(succ) = successors.get(name) {
            for s in succ.clone() {
                let deg = in_degree.get_mut(s).expect("successor is a graph node");
                *deg -= 1;
                if *deg == 0 {
                    ready.push(s);
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        let cycle: Vec<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg > 0)
            .map(|(name, _)| *name)
            .collect();
        return Err(SdError::AlgebraicLoop(cycle.join(", ")));
    }
    Ok(order)
}
