//! Vensim `.mdl` reader.
//!
//! The text section of an `.mdl` file is a `|`-separated list of equation
//! groups, each `name = rhs ~ units ~ comment`. The `.Control` group carries
//! the simulation parameters, and everything from the sketch delimiter
//! onward is ignored. Subscripts, macros and lookup tables are rejected.

use tracing::debug;

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::expr::Expr;
use sysdyn_common::ir::{ModelIr, VarKind, Variable};
use sysdyn_common::names::canonical;

use crate::parser::{parse_rhs, Rhs};

const SKETCH_DELIMITER: &str = r"\\\---///";

/// Parse Vensim model text. `name` is used as the model name (the format
/// itself does not carry one).
pub fn parse_vensim(name: &str, src: &str) -> Result<ModelIr> {
    let text = src.split(SKETCH_DELIMITER).next().unwrap_or(src);
    let text = strip_brace_comments(text);
    // Join equation continuation lines
    let text = text.replace("\\\n", " ").replace("\\\r\n", " ");

    let mut ir = ModelIr::new(name);
    let mut control = ControlEntries::default();

    for chunk in text.split('|') {
        let chunk = chunk.trim();
        if chunk.is_empty() || chunk.starts_with('*') {
            continue;
        }
        if chunk.starts_with(':') {
            return Err(SdError::Parse(format!(
                "unsupported Vensim construct: `{}`",
                first_line(chunk)
            )));
        }
        parse_equation_group(chunk, &mut ir, &mut control)?;
    }

    control.apply(&mut ir)?;
    ir.reclassify_flows();
    ir.check_references()?;
    debug!(model = %ir.name, variables = ir.variables.len(), "parsed Vensim model");
    Ok(ir)
}

fn parse_equation_group(chunk: &str, ir: &mut ModelIr, control: &mut ControlEntries) -> Result<()> {
    let mut sections = chunk.splitn(3, '~');
    let equation = sections.next().unwrap_or_default().trim();
    let units = sections.next().map(str::trim).filter(|s| !s.is_empty());
    let doc = sections.next().map(str::trim).filter(|s| !s.is_empty());

    let Some(eq_pos) = equation.find('=') else {
        // Annotation-only group (e.g. a group heading), nothing to parse
        return Ok(());
    };
    let (raw_name, rest) = equation.split_at(eq_pos);
    let rhs_src = &rest[1..];
    let display_name = raw_name.trim().to_string();
    let name = canonical(&display_name);
    if name.is_empty() {
        return Err(SdError::Parse(format!("equation with empty name: `{}`", first_line(chunk))));
    }

    if control.capture(&name, rhs_src)? {
        return Ok(());
    }

    let kind = match parse_rhs(rhs_src)? {
        Rhs::Stock { net_flow, initial } => VarKind::Stock { net_flow, initial },
        Rhs::Expr(equation) => VarKind::Aux { equation },
    };
    ir.insert(Variable {
        name,
        display_name,
        kind,
        units: units.map(String::from),
        doc: doc.map(String::from),
    })
}

/// Raw `.Control` entries, resolved once the whole file is read so that
/// `SAVEPER = TIME STEP` style references work.
#[derive(Default)]
struct ControlEntries {
    final_time: Option<Expr>,
    initial_time: Option<Expr>,
    time_step: Option<Expr>,
    saveper: Option<Expr>,
}

impl ControlEntries {
    /// Returns true when the name is a control parameter and was captured.
    fn capture(&mut self, name: &str, rhs_src: &str) -> Result<bool> {
        let slot = match name {
            "final_time" => &mut self.final_time,
            "initial_time" => &mut self.initial_time,
            "time_step" => &mut self.time_step,
            "saveper" => &mut self.saveper,
            _ => return Ok(false),
        };
        *slot = Some(crate::parser::parse_expression(rhs_src)?);
        Ok(true)
    }

    fn apply(&self, ir: &mut ModelIr) -> Result<()> {
        let lookup = |key: &str| -> Option<f64> {
            let expr = match key {
                "final_time" => self.final_time.as_ref(),
                "initial_time" => self.initial_time.as_ref(),
                "time_step" => self.time_step.as_ref(),
                "saveper" => self.saveper.as_ref(),
                _ => None,
            };
            expr.and_then(|e| const_eval(e, &|_| None))
        };
        if let Some(expr) = &self.initial_time {
            if let Some(v) = const_eval(expr, &lookup) {
                ir.specs.start = v;
            }
        }
        if let Some(expr) = &self.final_time {
            if let Some(v) = const_eval(expr, &lookup) {
                ir.specs.stop = v;
            }
        }
        if let Some(expr) = &self.time_step {
            if let Some(v) = const_eval(expr, &lookup) {
                ir.specs.dt = v;
            }
        }
        if let Some(expr) = &self.saveper {
            match const_eval(expr, &lookup) {
                Some(v) => ir.specs.saveper = Some(v),
                None => {
                    return Err(SdError::Parse(
                        "SAVEPER must resolve to a constant (or TIME STEP)".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Constant-fold an expression, resolving variable references through
/// `lookup`. Returns None when the expression is not statically evaluable.
fn const_eval(expr: &Expr, lookup: &dyn Fn(&str) -> Option<f64>) -> Option<f64> {
    use sysdyn_common::expr::{BinaryOp, UnaryOp};
    match expr {
        Expr::Num(v) => Some(*v),
        Expr::Var(name) => lookup(name),
        Expr::Unary(UnaryOp::Neg, inner) => const_eval(inner, lookup).map(|v| -v),
        Expr::Binary(op, lhs, rhs) => {
            let l = const_eval(lhs, lookup)?;
            let r = const_eval(rhs, lookup)?;
            match op {
                BinaryOp::Add => Some(l + r),
                BinaryOp::Sub => Some(l - r),
                BinaryOp::Mul => Some(l * r),
                BinaryOp::Div => Some(l / r),
                BinaryOp::Pow => Some(l.powf(r)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn strip_brace_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

fn first_line(chunk: &str) -> &str {
    chunk.lines().next().unwrap_or(chunk).trim()
}
