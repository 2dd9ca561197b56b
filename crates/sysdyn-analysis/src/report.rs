//! Model structure inventory.

use serde::Serialize;

use sysdyn_common::ir::{ModelIr, VarKind};

/// Variables grouped by structural role, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct StructureReport {
    pub stocks: Vec<String>,
    pub flows: Vec<String>,
    pub auxiliaries: Vec<String>,
    pub constants: Vec<String>,
}

pub fn structure_report(ir: &ModelIr) -> StructureReport {
    let mut report = StructureReport {
        stocks: Vec::new(),
        flows: Vec::new(),
        auxiliaries: Vec::new(),
        constants: Vec::new(),
    };
    for var in ir.variables.values() {
        let bucket = match &var.kind {
            VarKind::Stock { .. } => &mut report.stocks,
            VarKind::Flow { .. } => &mut report.flows,
            VarKind::Aux { .. } if var.is_constant() => &mut report.constants,
            VarKind::Aux { .. } => &mut report.auxiliaries,
        };
        bucket.push(var.name.clone());
    }
    report
}
