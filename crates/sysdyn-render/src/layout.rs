//! Deterministic force-directed layout (Fruchterman–Reingold).
//!
//! Nodes start on a ring so the layout needs no random source and is
//! reproducible for a given model. Positions come back in the unit square.

const ITERATIONS: usize = 120;

/// Lay out `node_count` nodes connected by `edges` (index pairs).
pub fn force_layout(node_count: usize, edges: &[(usize, usize)]) -> Vec<(f64, f64)> {
    match node_count {
        0 => return Vec::new(),
        1 => return vec![(0.5, 0.5)],
        _ => {}
    }

    // Ring initialization with a golden-angle offset to avoid symmetric
    // stalemates on regular graphs
    let golden = std::f64::consts::PI * (3.0 - 5.0f64.sqrt());
    let mut pos: Vec<(f64, f64)> = (0..node_count)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / node_count as f64 + golden * i as f64 * 0.01;
            (0.5 + 0.38 * angle.cos(), 0.5 + 0.38 * angle.sin())
        })
        .collect();

    let k = (1.0 / node_count as f64).sqrt();
    let mut temperature = 0.12;

    for _ in 0..ITERATIONS {
        let mut disp = vec![(0.0f64, 0.0f64); node_count];

        // Repulsion between all pairs
        for i in 0..node_count {
            for j in (i + 1)..node_count {
                let (dx, dy) = delta(pos[i], pos[j]);
                let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                let force = k * k / dist;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                disp[i].0 += fx;
                disp[i].1 += fy;
                disp[j].0 -= fx;
                disp[j].1 -= fy;
            }
        }

        // Attraction along edges
        for &(a, b) in edges {
            if a == b || a >= node_count || b >= node_count {
                continue;
            }
            let (dx, dy) = delta(pos[a], pos[b]);
            let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
            let force = dist * dist / k;
            let (fx, fy) = (dx / dist * force, dy / dist * force);
            disp[a].0 -= fx;
            disp[a].1 -= fy;
            disp[b].0 += fx;
            disp[b].1 += fy;
        }

        for i in 0..node_count {
            let (dx, dy) = disp[i];
            let len = (dx * dx + dy * dy).sqrt().max(1e-6);
            let step = len.min(temperature);
            pos[i].0 = (pos[i].0 + dx / len * step).clamp(0.02, 0.98);
            pos[i].1 = (pos[i].1 + dy / len * step).clamp(0.02, 0.98);
        }
        temperature *= 0.96;
    }

    pos
}

fn delta(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 - b.0, a.1 - b.1)
}
