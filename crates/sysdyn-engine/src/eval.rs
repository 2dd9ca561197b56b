//! Expression evaluation.
//!
//! Arithmetic follows IEEE 754: division by zero and domain errors produce
//! infinities or NaN rather than failing the run, matching how simulation
//! tables usually surface them. Truthiness is "non-zero".

use indexmap::IndexMap;

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::expr::{BinaryOp, Builtin, Expr, UnaryOp};

/// Evaluation environment for one point in time.
#[derive(Debug, Clone)]
pub struct Env {
    pub time: f64,
    pub dt: f64,
    pub values: IndexMap<String, f64>,
}

impl Env {
    pub fn new(dt: f64) -> Self {
        Self {
            time: 0.0,
            dt,
            values: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.values.get(name).copied().ok_or_else(|| {
            SdError::Simulation(format!("variable `{name}` has no value in the environment"))
        })
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }
}

pub fn eval(expr: &Expr, env: &Env) -> Result<f64> {
    Ok(match expr {
        Expr::Num(v) => *v,
        Expr::Time => env.time,
        Expr::Var(name) => env.get(name)?,
        Expr::Unary(op, inner) => {
            let v = eval(inner, env)?;
            match op {
                UnaryOp::Neg => -v,
                UnaryOp::Not => bool_to_f64(v == 0.0),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval(lhs, env)?;
            let r = eval(rhs, env)?;
            match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Pow => l.powf(r),
                BinaryOp::Eq => bool_to_f64(l == r),
                BinaryOp::Ne => bool_to_f64(l != r),
                BinaryOp::Lt => bool_to_f64(l < r),
                BinaryOp::Le => bool_to_f64(l <= r),
                BinaryOp::Gt => bool_to_f64(l > r),
                BinaryOp::Ge => bool_to_f64(l >= r),
                BinaryOp::And => bool_to_f64(l != 0.0 && r != 0.0),
                BinaryOp::Or => bool_to_f64(l != 0.0 || r != 0.0),
            }
        }
        Expr::Call(builtin, args) => eval_call(*builtin, args, env)?,
    })
}

fn eval_call(builtin: Builtin, args: &[Expr], env: &Env) -> Result<f64> {
    // IF THEN ELSE evaluates only the taken branch
    if builtin == Builtin::IfThenElse {
        let cond = eval(&args[0], env)?;
        let branch = if cond != 0.0 { &args[1] } else { &args[2] };
        return eval(branch, env);
    }

    let mut values = [0.0f64; 3];
    for (slot, arg) in values.iter_mut().zip(args) {
        *slot = eval(arg, env)?;
    }
    Ok(match builtin {
        Builtin::Abs => values[0].abs(),
        Builtin::Min => values[0].min(values[1]),
        Builtin::Max => values[0].max(values[1]),
        Builtin::Sqrt => values[0].sqrt(),
        Builtin::Exp => values[0].exp(),
        Builtin::Ln => values[0].ln(),
        Builtin::Sin => values[0].sin(),
        Builtin::Cos => values[0].cos(),
        Builtin::Integer => values[0].trunc(),
        Builtin::Modulo => values[0] % values[1],
        // STEP(height, start): 0 before start, height from start on
        Builtin::Step => {
            if env.time >= values[1] {
                values[0]
            } else {
                0.0
            }
        }
        // PULSE(start, width): 1 during [start, start + width)
        Builtin::Pulse => {
            if env.time >= values[0] && env.time < values[0] + values[1] {
                1.0
            } else {
                0.0
            }
        }
        // RAMP(slope, start, end): linear rise between start and end
        Builtin::Ramp => {
            if env.time <= values[1] {
                0.0
            } else {
                values[0] * (env.time.min(values[2]) - values[1])
            }
        }
        Builtin::IfThenElse => unreachable!("handled above"),
    })
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
