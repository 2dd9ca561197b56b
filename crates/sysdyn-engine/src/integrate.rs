//! Fixed-step integrators.
//!
//! Per step: evaluate the auxiliary/flow layer in dependency order against
//! the current stock values, record if a save point is due, then advance
//! stocks by their net flow. RK4 re-evaluates the layer at each sub-stage.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use sysdyn_common::error::Result;
use sysdyn_common::expr::Expr;
use sysdyn_common::ir::VarKind;

use crate::compile::CompiledModel;
use crate::eval::{eval, Env};
use crate::results::SimulationResults;

/// Integration method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Euler,
    Rk4,
}

struct StockDef<'a> {
    name: &'a str,
    net_flow: &'a Expr,
    initial: &'a Expr,
}

/// Run a compiled model over its own simulation specs.
#[instrument(skip(model), fields(model = %model.ir.name))]
pub fn run(model: &CompiledModel, method: Method) -> Result<SimulationResults> {
    let specs = model.ir.specs;
    specs.validate()?;

    let stocks: Vec<StockDef> = model
        .ir
        .variables
        .values()
        .filter_map(|var| match &var.kind {
            VarKind::Stock { initial, net_flow } => Some(StockDef {
                name: var.name.as_str(),
                net_flow,
                initial,
            }),
            _ => None,
        })
        .collect();

    let mut env = Env::new(specs.dt);
    env.time = specs.start;
    for name in model.ir.variables.keys() {
        env.set(name, 0.0);
    }

    // Initial conditions: auxiliaries first against zeroed stocks (initial
    // expressions may reference them), then stock initials, then the layer
    // again so recorded auxiliaries match the initial stocks.
    eval_layer(model, &mut env)?;
    let initial_values: Vec<f64> = stocks
        .iter()
        .map(|stock| eval(stock.initial, &env))
        .collect::<Result<_>>()?;
    for (stock, value) in stocks.iter().zip(&initial_values) {
        env.set(stock.name, *value);
    }

    let n_steps = ((specs.stop - specs.start) / specs.dt).round().max(1.0) as usize;
    let save_every = (specs.effective_saveper() / specs.dt).round().max(1.0) as usize;
    let mut results = SimulationResults::new(model.ir.variables.keys().cloned());

    for i in 0..=n_steps {
        let t = specs.start + i as f64 * specs.dt;
        env.time = t;
        eval_layer(model, &mut env)?;

        if i % save_every == 0 || i == n_steps {
            record(&mut results, t, &env);
        }
        if i == n_steps {
            break;
        }

        match method {
            Method::Euler => {
                let derivatives = net_flows(&stocks, &env)?;
                for (stock, d) in stocks.iter().zip(&derivatives) {
                    let current = env.get(stock.name)?;
                    env.set(stock.name, current + specs.dt * d);
                }
            }
            Method::Rk4 => {
                step_rk4(model, &stocks, &mut env, t, specs.dt)?;
            }
        }
    }

    debug!(rows = results.len(), "simulation complete");
    Ok(results)
}

/// Evaluate auxiliaries and flows in dependency order.
fn eval_layer(model: &CompiledModel, env: &mut Env) -> Result<()> {
    for name in &model.order {
        let equation = match &model.ir.variables[name.as_str()].kind {
            VarKind::Flow { equation } | VarKind::Aux { equation } => equation,
            VarKind::Stock { .. } => continue,
        };
        let value = eval(equation, env)?;
        env.set(name, value);
    }
    Ok(())
}

fn net_flows(stocks: &[StockDef], env: &Env) -> Result<Vec<f64>> {
    stocks.iter().map(|stock| eval(stock.net_flow, env)).collect()
}

/// Classic fourth-order Runge–Kutta step for the stock vector.
fn step_rk4(
    model: &CompiledModel,
    stocks: &[StockDef],
    env: &mut Env,
    t: f64,
    dt: f64,
) -> Result<()> {
    let y: Vec<f64> = stocks
        .iter()
        .map(|stock| env.get(stock.name))
        .collect::<Result<_>>()?;

    // The layer is already evaluated at (t, y)
    let k1 = net_flows(stocks, env)?;
    let k2 = stage(model, stocks, env, t + dt / 2.0, &y, &k1, dt / 2.0)?;
    let k3 = stage(model, stocks, env, t + dt / 2.0, &y, &k2, dt / 2.0)?;
    let k4 = stage(model, stocks, env, t + dt, &y, &k3, dt)?;

    for (i, stock) in stocks.iter().enumerate() {
        let slope = (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]) / 6.0;
        env.set(stock.name, y[i] + dt * slope);
    }
    env.time = t;
    Ok(())
}

/// Evaluate net flows at `(stage_time, y + scale * k)`.
fn stage(
    model: &CompiledModel,
    stocks: &[StockDef],
    env: &mut Env,
    stage_time: f64,
    y: &[f64],
    k: &[f64],
    scale: f64,
) -> Result<Vec<f64>> {
    for (i, stock) in stocks.iter().enumerate() {
        env.set(stock.name, y[i] + scale * k[i]);
    }
    env.time = stage_time;
    eval_layer(model, env)?;
    net_flows(stocks, env)
}

fn record(results: &mut SimulationResults, t: f64, env: &Env) {
    results.push_row(t, |name| env.values.get(name).copied().unwrap_or(f64::NAN));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use sysdyn_model::vensim::parse_vensim;
    use sysdyn_model::xmile::parse_xmile;

    const TANK_MDL: &str = "\
Tank= INTEG (inflow, 0)\n\t~\tliters\n\t~\t|\n\
inflow= 5\n\t~\tliters/Minute\n\t~\t|\n\
FINAL TIME = 10\n\t~\t~\t|\n\
INITIAL TIME = 0\n\t~\t~\t|\n\
TIME STEP = 1\n\t~\t~\t|\n";

    #[test]
    fn constant_inflow_accumulates_exactly() {
        let ir = parse_vensim("tank", TANK_MDL).unwrap();
        let model = compile(ir).unwrap();
        let results = run(&model, Method::Euler).unwrap();
        // 11 rows: t = 0..=10
        assert_eq!(results.len(), 11);
        assert_eq!(results.final_time(), Some(10.0));
        // Euler is exact for a constant derivative
        assert_eq!(results.final_value("tank"), Some(50.0));
        assert_eq!(results.final_value("inflow"), Some(5.0));
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let src = r#"<xmile><header><name>decay</name></header>
            <sim_specs><start>0</start><stop>5</stop><dt>0.25</dt></sim_specs>
            <model><variables>
              <stock name="level"><eqn>100</eqn><outflow>drain</outflow></stock>
              <flow name="drain"><eqn>level * 0.5</eqn></flow>
            </variables></model></xmile>"#;
        let ir = parse_xmile("decay", src).unwrap();
        let model = compile(ir).unwrap();
        let results = run(&model, Method::Rk4).unwrap();
        let expected = 100.0 * (-0.5f64 * 5.0).exp();
        let actual = results.final_value("level").unwrap();
        assert!((actual - expected).abs() < 1e-3, "got {actual}, want {expected}");
    }

    #[test]
    fn euler_is_less_accurate_than_rk4_here() {
        let src = r#"<xmile><model><variables>
              <stock name="level"><eqn>100</eqn><outflow>drain</outflow></stock>
              <flow name="drain"><eqn>level * 0.5</eqn></flow>
            </variables></model></xmile>"#;
        let mut ir = parse_xmile("decay", src).unwrap();
        ir.specs.stop = 5.0;
        ir.specs.dt = 0.25;
        let model = compile(ir).unwrap();
        let expected = 100.0 * (-0.5f64 * 5.0).exp();
        let euler = run(&model, Method::Euler).unwrap().final_value("level").unwrap();
        let rk4 = run(&model, Method::Rk4).unwrap().final_value("level").unwrap();
        assert!((rk4 - expected).abs() < (euler - expected).abs());
    }

    #[test]
    fn saveper_thins_the_recording() {
        let src = "\
Tank= INTEG (inflow, 0)\n\t~\t~\t|\n\
inflow= 5\n\t~\t~\t|\n\
FINAL TIME = 10\n\t~\t~\t|\n\
INITIAL TIME = 0\n\t~\t~\t|\n\
SAVEPER = 2\n\t~\t~\t|\n\
TIME STEP = 0.5\n\t~\t~\t|\n";
        let ir = parse_vensim("tank", src).unwrap();
        let model = compile(ir).unwrap();
        let results = run(&model, Method::Euler).unwrap();
        // t = 0, 2, 4, 6, 8, 10
        assert_eq!(results.time, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn empty_model_records_only_time() {
        let src = "<xmile><model><variables></variables></model></xmile>";
        let ir = parse_xmile("empty", src).unwrap();
        let model = compile(ir).unwrap();
        let results = run(&model, Method::Euler).unwrap();
        assert_eq!(results.len(), 101);
        assert!(results.columns.is_empty());
    }

    #[test]
    fn time_dependent_step_input() {
        let src = "\
Tank= INTEG (inflow, 0)\n\t~\t~\t|\n\
inflow= STEP(10, 5)\n\t~\t~\t|\n\
FINAL TIME = 10\n\t~\t~\t|\n\
INITIAL TIME = 0\n\t~\t~\t|\n\
TIME STEP = 1\n\t~\t~\t|\n";
        let ir = parse_vensim("tank", src).unwrap();
        let model = compile(ir).unwrap();
        let results = run(&model, Method::Euler).unwrap();
        // inflow switches on at t=5; Euler adds from t=5..9 inclusive
        assert_eq!(results.final_value("tank"), Some(50.0));
    }
}
