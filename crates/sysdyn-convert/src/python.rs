//! Python code generation.
//!
//! The output is a standalone script, not a library binding: simulation
//! specs as module constants, one function per auxiliary/flow in
//! evaluation order, net-flow functions per stock, and an Euler `run()`
//! loop mirroring the engine's stepping. Output is deterministic for a
//! given model and timestamp.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use sysdyn_common::error::Result;
use sysdyn_common::expr::{BinaryOp, Builtin, Expr, UnaryOp};
use sysdyn_common::ir::VarKind;
use sysdyn_engine::CompiledModel;

/// Python reserved words that a canonical variable name could collide with.
const PY_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "time", "try", "while", "with", "yield",
    "state", "math", "run",
];

pub fn generate_python(model: &CompiledModel, generated_at: DateTime<Utc>) -> Result<String> {
    let ir = &model.ir;
    let stocks: Vec<&str> = ir.stock_names();
    let stock_set: HashSet<&str> = stocks.iter().copied().collect();

    let mut out = String::new();
    let _ = writeln!(out, "\"\"\"{} — system dynamics model.", ir.name);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Generated by sysdyn at {}.",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "\"\"\"");
    let _ = writeln!(out);
    let _ = writeln!(out, "import math");
    let _ = writeln!(out);
    let _ = writeln!(out, "INITIAL_TIME = {}", py_num(ir.specs.start));
    let _ = writeln!(out, "FINAL_TIME = {}", py_num(ir.specs.stop));
    let _ = writeln!(out, "TIME_STEP = {}", py_num(ir.specs.dt));
    let _ = writeln!(out, "SAVEPER = {}", py_num(ir.specs.effective_saveper()));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "STOCKS = [{}]",
        stocks.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(", ")
    );
    out.push_str(RUNTIME_HELPERS);

    // Auxiliaries and flows, in evaluation order
    for name in &model.order {
        let var = &ir.variables[name.as_str()];
        let equation = match &var.kind {
            VarKind::Flow { equation } | VarKind::Aux { equation } => equation,
            VarKind::Stock { .. } => continue,
        };
        let _ = writeln!(out);
        let _ = writeln!(out);
        let _ = writeln!(out, "def {}(state, time):", py_ident(name));
        if let Some(doc) = &var.doc {
            let _ = writeln!(out, "    \"\"\"{}\"\"\"", doc.replace('"', "'"));
        }
        let _ = writeln!(out, "    return {}", py_expr(equation, &stock_set));
    }

    // Net flow per stock
    for var in ir.variables.values() {
        if let VarKind::Stock { net_flow, .. } = &var.kind {
            let _ = writeln!(out);
            let _ = writeln!(out);
            let _ = writeln!(out, "def _d_{}(state, time):", py_ident(&var.name));
            let _ = writeln!(out, "    return {}", py_expr(net_flow, &stock_set));
        }
    }

    // Dispatch tables, evaluation order preserved
    let _ = writeln!(out);
    let _ = writeln!(out);
    let aux_entries: Vec<String> = model
        .order
        .iter()
        .map(|name| format!("(\"{name}\", {})", py_ident(name)))
        .collect();
    let _ = writeln!(out, "AUXILIARIES = [{}]", aux_entries.join(", "));
    let flow_entries: Vec<String> = stocks
        .iter()
        .map(|name| format!("(\"{name}\", _d_{})", py_ident(name)))
        .collect();
    let _ = writeln!(out, "NET_FLOWS = [{}]", flow_entries.join(", "));

    // Initial state mirrors the engine: auxiliaries see zeroed stocks
    let _ = writeln!(out);
    let _ = writeln!(out);
    let _ = writeln!(out, "def initial_state():");
    let _ = writeln!(out, "    state = {{name: 0.0 for name in STOCKS}}");
    for var in ir.variables.values() {
        if let VarKind::Stock { initial, .. } = &var.kind {
            let _ = writeln!(
                out,
                "    state[\"{}\"] = {}",
                var.name,
                py_expr_at(initial, &stock_set, "INITIAL_TIME")
            );
        }
    }
    let _ = writeln!(out, "    return state");
    out.push_str(RUN_LOOP);

    debug!(model = %ir.name, bytes = out.len(), "generated Python model");
    Ok(out)
}

const RUNTIME_HELPERS: &str = r#"


def _step(time, height, start):
    return height if time >= start else 0.0


def _pulse(time, start, width):
    return 1.0 if start <= time < start + width else 0.0


def _ramp(time, slope, start, end):
    if time <= start:
        return 0.0
    return slope * (min(time, end) - start)
"#;

const RUN_LOOP: &str = r#"

def run():
    state = initial_state()
    rows = []
    steps = max(1, int(round((FINAL_TIME - INITIAL_TIME) / TIME_STEP)))
    save_every = max(1, int(round(SAVEPER / TIME_STEP)))
    for i in range(steps + 1):
        time = INITIAL_TIME + i * TIME_STEP
        if i % save_every == 0 or i == steps:
            row = {"time": time}
            for name, fn in AUXILIARIES:
                row[name] = fn(state, time)
            for name in STOCKS:
                row[name] = state[name]
            rows.append(row)
        if i == steps:
            break
        deltas = [(name, fn(state, time)) for name, fn in NET_FLOWS]
        for name, delta in deltas:
            state[name] += TIME_STEP * delta
    return rows


if __name__ == "__main__":
    for key, value in run()[-1].items():
        print(f"{key} = {value}")
"#;

/// A canonical name as a safe Python identifier.
fn py_ident(name: &str) -> String {
    let mut ident = if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("v_{name}")
    } else {
        name.to_string()
    };
    if PY_KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

fn py_num(value: f64) -> String {
    if value == f64::INFINITY {
        "math.inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-math.inf".to_string()
    } else if value.is_nan() {
        "math.nan".to_string()
    } else {
        format!("{value:?}")
    }
}

fn py_expr(expr: &Expr, stocks: &HashSet<&str>) -> String {
    py_expr_at(expr, stocks, "time")
}

/// Translate an expression; `time_name` lets initial-value expressions pin
/// the clock to `INITIAL_TIME`.
fn py_expr_at(expr: &Expr, stocks: &HashSet<&str>, time_name: &str) -> String {
    match expr {
        Expr::Num(v) => py_num(*v),
        Expr::Time => time_name.to_string(),
        Expr::Var(name) => {
            if stocks.contains(name.as_str()) {
                format!("state[\"{name}\"]")
            } else {
                format!("{}(state, {time_name})", py_ident(name))
            }
        }
        Expr::Unary(UnaryOp::Neg, inner) => {
            format!("(-{})", py_expr_at(inner, stocks, time_name))
        }
        Expr::Unary(UnaryOp::Not, inner) => {
            format!("(1.0 if {} == 0.0 else 0.0)", py_expr_at(inner, stocks, time_name))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = py_expr_at(lhs, stocks, time_name);
            let r = py_expr_at(rhs, stocks, time_name);
            match op {
                BinaryOp::Add => format!("({l} + {r})"),
                BinaryOp::Sub => format!("({l} - {r})"),
                BinaryOp::Mul => format!("({l} * {r})"),
                BinaryOp::Div => format!("({l} / {r})"),
                BinaryOp::Pow => format!("({l} ** {r})"),
                BinaryOp::Eq => format!("float({l} == {r})"),
                BinaryOp::Ne => format!("float({l} != {r})"),
                BinaryOp::Lt => format!("float({l} < {r})"),
                BinaryOp::Le => format!("float({l} <= {r})"),
                BinaryOp::Gt => format!("float({l} > {r})"),
                BinaryOp::Ge => format!("float({l} >= {r})"),
                BinaryOp::And => format!("float({l} != 0.0 and {r} != 0.0)"),
                BinaryOp::Or => format!("float({l} != 0.0 or {r} != 0.0)"),
            }
        }
        Expr::Call(builtin, args) => {
            let a: Vec<String> = args
                .iter()
                .map(|arg| py_expr_at(arg, stocks, time_name))
                .collect();
            match builtin {
                Builtin::Abs => format!("abs({})", a[0]),
                Builtin::Min => format!("min({}, {})", a[0], a[1]),
                Builtin::Max => format!("max({}, {})", a[0], a[1]),
                Builtin::Sqrt => format!("math.sqrt({})", a[0]),
                Builtin::Exp => format!("math.exp({})", a[0]),
                Builtin::Ln => format!("math.log({})", a[0]),
                Builtin::Sin => format!("math.sin({})", a[0]),
                Builtin::Cos => format!("math.cos({})", a[0]),
                Builtin::Integer => format!("float(int({}))", a[0]),
                Builtin::Modulo => format!("math.fmod({}, {})", a[0], a[1]),
                Builtin::Step => format!("_step({time_name}, {}, {})", a[0], a[1]),
                Builtin::Pulse => format!("_pulse({time_name}, {}, {})", a[0], a[1]),
                Builtin::Ramp => format!("_ramp({time_name}, {}, {}, {})", a[0], a[1], a[2]),
                Builtin::IfThenElse => {
                    format!("({} if {} != 0.0 else {})", a[1], a[0], a[2])
                }
            }
        }
    }
}
