//! Stock-and-flow diagram rendering.
//!
//! Nodes come from the model variables, edges from the causal graph
//! (initial-only references included so the picture shows the whole
//! structure). Stocks draw as rectangles, everything else as circles.

use plotters::prelude::*;
use tracing::debug;

use sysdyn_common::error::{Result, SdError};
use sysdyn_common::ir::{ModelIr, VarKind};
use sysdyn_analysis::CausalGraph;

use crate::layout::force_layout;

const NODE_RADIUS: i32 = 18;
const STOCK_HALF_WIDTH: i32 = 30;
const STOCK_HALF_HEIGHT: i32 = 16;

pub fn render_sfd_png(ir: &ModelIr, width: u32, height: u32) -> Result<Vec<u8>> {
    if ir.variables.is_empty() {
        return Err(SdError::Render("model has no variables to draw".to_string()));
    }

    let graph = CausalGraph::from_ir(ir);
    let edges: Vec<(usize, usize)> = graph.edges().map(|(from, to, _)| (from, to)).collect();
    let positions = force_layout(graph.node_count(), &edges);

    let margin = 60.0;
    let to_px = |(x, y): (f64, f64)| -> (i32, i32) {
        (
            (margin + x * (width as f64 - 2.0 * margin)) as i32,
            (margin + y * (height as f64 - 2.0 * margin)) as i32,
        )
    };

    let file = tempfile::Builder::new()
        .prefix("sysdyn-sfd-")
        .suffix(".png")
        .tempfile()?;
    let path = file.path().to_path_buf();

    {
        let root = BitMapBackend::new(&path, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let edge_style = BLACK.mix(0.55).stroke_width(1);
        for (from, to, _) in graph.edges() {
            if from == to {
                continue;
            }
            let a = to_px(positions[from]);
            let b = to_px(positions[to]);
            root.draw(&PathElement::new(vec![a, b], edge_style))
                .map_err(render_err)?;
            draw_arrowhead(&root, a, b)?;
        }

        let fill = RGBColor(173, 216, 230);
        for (idx, var) in ir.variables.values().enumerate() {
            let (x, y) = to_px(positions[idx]);
            match var.kind {
                VarKind::Stock { .. } => {
                    root.draw(&Rectangle::new(
                        [
                            (x - STOCK_HALF_WIDTH, y - STOCK_HALF_HEIGHT),
                            (x + STOCK_HALF_WIDTH, y + STOCK_HALF_HEIGHT),
                        ],
                        fill.filled(),
                    ))
                    .map_err(render_err)?;
                    root.draw(&Rectangle::new(
                        [
                            (x - STOCK_HALF_WIDTH, y - STOCK_HALF_HEIGHT),
                            (x + STOCK_HALF_WIDTH, y + STOCK_HALF_HEIGHT),
                        ],
                        BLACK.stroke_width(1),
                    ))
                    .map_err(render_err)?;
                }
                _ => {
                    root.draw(&Circle::new((x, y), NODE_RADIUS, fill.filled()))
                        .map_err(render_err)?;
                    root.draw(&Circle::new((x, y), NODE_RADIUS, BLACK.stroke_width(1)))
                        .map_err(render_err)?;
                }
            }
            root.draw(&Text::new(
                var.display_name.clone(),
                (x - STOCK_HALF_WIDTH, y + STOCK_HALF_HEIGHT + 4),
                ("sans-serif", 13),
            ))
            .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
    }

    let bytes = std::fs::read(&path)?;
    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        bytes = bytes.len(),
        "rendered stock-and-flow diagram"
    );
    Ok(bytes)
}

/// Small filled triangle at the target end, pulled back to the node edge.
fn draw_arrowhead<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    from: (i32, i32),
    to: (i32, i32),
) -> Result<()> {
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1.0 {
        return Ok(());
    }
    let (ux, uy) = (dx / len, dy / len);
    // Tip sits just outside the node outline
    let tip = (
        to.0 - (ux * (NODE_RADIUS as f64 + 2.0)) as i32,
        to.1 - (uy * (NODE_RADIUS as f64 + 2.0)) as i32,
    );
    let base = (tip.0 - (ux * 9.0) as i32, tip.1 - (uy * 9.0) as i32);
    let (px, py) = (-uy, ux);
    let left = (base.0 + (px * 4.0) as i32, base.1 + (py * 4.0) as i32);
    let right = (base.0 - (px * 4.0) as i32, base.1 - (py * 4.0) as i32);
    root.draw(&Polygon::new(vec![tip, left, right], BLACK.mix(0.7).filled()))
        .map_err(render_err)
}

fn render_err<E: std::fmt::Display>(err: E) -> SdError {
    SdError::Render(err.to_string())
}
