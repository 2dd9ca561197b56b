//! Model intermediate representation.
//!
//! Both readers (Vensim, XMILE) lower into this form; the engine, analysis,
//! rendering and code generation all consume it. Variables are keyed by
//! canonical name and keep their declaration order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdError};
use crate::expr::Expr;

/// Simulation control parameters.
///
/// Populated from Vensim's `.Control` section or XMILE `<sim_specs>`;
/// missing values fall back to the defaults below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimSpecs {
    pub start: f64,
    pub stop: f64,
    pub dt: f64,
    /// Recording interval. `None` means record every `dt`.
    pub saveper: Option<f64>,
}

impl Default for SimSpecs {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 100.0,
            dt: 1.0,
            saveper: None,
        }
    }
}

impl SimSpecs {
    pub fn effective_saveper(&self) -> f64 {
        self.saveper.unwrap_or(self.dt)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SdError::InvalidSpecs(format!("TIME STEP must be positive, got {}", self.dt)));
        }
        if self.stop <= self.start {
            return Err(SdError::InvalidSpecs(format!(
                "FINAL TIME ({}) must be greater than INITIAL TIME ({})",
                self.stop, self.start
            )));
        }
        let saveper = self.effective_saveper();
        if !saveper.is_finite() || saveper <= 0.0 {
            return Err(SdError::InvalidSpecs(format!("SAVEPER must be positive, got {saveper}")));
        }
        Ok(())
    }
}

/// What a variable is, structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum VarKind {
    /// An accumulation: advanced by integrating `net_flow` from `initial`.
    Stock { initial: Expr, net_flow: Expr },
    /// A rate feeding one or more stocks.
    Flow { equation: Expr },
    /// Any other computed variable.
    Aux { equation: Expr },
}

impl VarKind {
    /// Expressions to scan for references. Stocks expose net flow first,
    /// then the initial expression.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            VarKind::Stock { initial, net_flow } => vec![net_flow, initial],
            VarKind::Flow { equation } | VarKind::Aux { equation } => vec![equation],
        }
    }

    pub fn is_stock(&self) -> bool {
        matches!(self, VarKind::Stock { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    /// Canonical lookup name.
    pub name: String,
    /// Name as spelled in the source file.
    pub display_name: String,
    pub kind: VarKind,
    pub units: Option<String>,
    pub doc: Option<String>,
}

impl Variable {
    /// True for auxiliaries whose equation never varies.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            VarKind::Aux { equation } => equation.is_constant(),
            _ => false,
        }
    }
}

/// A fully parsed model.
#[derive(Debug, Clone)]
pub struct ModelIr {
    pub name: String,
    pub specs: SimSpecs,
    pub variables: IndexMap<String, Variable>,
}

impl ModelIr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: SimSpecs::default(),
            variables: IndexMap::new(),
        }
    }

    /// Insert a variable, rejecting duplicate canonical names.
    pub fn insert(&mut self, var: Variable) -> Result<()> {
        if self.variables.contains_key(&var.name) {
            return Err(SdError::Parse(format!("duplicate variable `{}`", var.display_name)));
        }
        self.variables.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn get(&self, canonical: &str) -> Option<&Variable> {
        self.variables.get(canonical)
    }

    pub fn stock_names(&self) -> Vec<&str> {
        self.variables
            .values()
            .filter(|v| v.kind.is_stock())
            .map(|v| v.name.as_str())
            .collect()
    }

    /// Reclassify auxiliaries referenced by any stock's net flow as flows.
    ///
    /// Vensim has no syntactic flow marker; only `INTEG` reveals which
    /// variables act as rates. XMILE declares flows explicitly, so this is
    /// a no-op there.
    pub fn reclassify_flows(&mut self) {
        let mut rate_names: Vec<String> = Vec::new();
        for var in self.variables.values() {
            if let VarKind::Stock { net_flow, .. } = &var.kind {
                for referenced in net_flow.references() {
                    if !rate_names.iter().any(|n| n == referenced) {
                        rate_names.push(referenced.to_string());
                    }
                }
            }
        }
        for name in rate_names {
            if let Some(var) = self.variables.get_mut(&name) {
                if let VarKind::Aux { equation } = &var.kind {
                    var.kind = VarKind::Flow { equation: equation.clone() };
                }
            }
        }
    }

    /// Verify that every reference resolves to a declared variable.
    pub fn check_references(&self) -> Result<()> {
        for var in self.variables.values() {
            for expr in var.kind.expressions() {
                for referenced in expr.references() {
                    if !self.variables.contains_key(referenced) {
                        return Err(SdError::UnknownVariable {
                            referenced: referenced.to_string(),
                            referrer: var.display_name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
