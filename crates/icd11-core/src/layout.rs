//! Force-directed layout for the hierarchy view.
//!
//! Fruchterman & Reingold (1991): every pair of nodes repels with k²/d, every
//! edge attracts with d²/k, and the step length is capped by a temperature
//! that cools linearly to zero. Starting positions come from a seeded RNG so
//! the same graph always lands in the same place.

use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::Position;

/// Minimum distance used in force terms, keeps coincident nodes finite.
const MIN_DISTANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Seed for the initial positions
    pub seed: u64,
    /// Upper bound on simulation steps
    pub iterations: usize,
    /// Largest absolute coordinate after rescaling
    pub scale: f64,
    /// Stop once the mean step length drops below this
    pub threshold: f64,
    /// Ideal edge length; defaults to 1/sqrt(n)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_distance: Option<f64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            iterations: 50,
            scale: 1.0,
            threshold: 1e-4,
            optimal_distance: None,
        }
    }
}

/// Compute one position per node, indexed like `graph.node_indices()`.
/// Edge direction is ignored. Output is centered on the origin.
pub fn spring_layout<N, E>(graph: &DiGraph<N, E>, config: &LayoutConfig) -> Vec<Position> {
    let n = graph.node_count();
    match n {
        0 => return Vec::new(),
        1 => return vec![Position::default()],
        _ => {}
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut pos: Vec<[f64; 2]> = (0..n).map(|_| [rng.gen::<f64>(), rng.gen::<f64>()]).collect();

    let mut adjacent = vec![false; n * n];
    for edge in graph.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        adjacent[a * n + b] = true;
        adjacent[b * n + a] = true;
    }

    let k = config
        .optimal_distance
        .unwrap_or_else(|| (1.0 / n as f64).sqrt());
    let mut temperature = extent(&pos) * 0.1;
    let cooling = temperature / (config.iterations as f64 + 1.0);

    for _ in 0..config.iterations {
        let mut disp = vec![[0.0_f64; 2]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = pos[i][0] - pos[j][0];
                let dy = pos[i][1] - pos[j][1];
                let dist = dx.hypot(dy).max(MIN_DISTANCE);
                let attraction = if adjacent[i * n + j] { dist / k } else { 0.0 };
                let coeff = k * k / (dist * dist) - attraction;
                disp[i][0] += dx * coeff;
                disp[i][1] += dy * coeff;
            }
        }

        let mut moved = 0.0;
        for (p, d) in pos.iter_mut().zip(&disp) {
            let len = d[0].hypot(d[1]).max(MIN_DISTANCE);
            let step = [d[0] * temperature / len, d[1] * temperature / len];
            p[0] += step[0];
            p[1] += step[1];
            moved += step[0].hypot(step[1]);
        }

        temperature -= cooling;
        if moved / (n as f64) < config.threshold {
            break;
        }
    }

    rescale(&mut pos, config.scale);
    pos.into_iter().map(|[x, y]| Position { x, y }).collect()
}

/// Larger side of the bounding box.
fn extent(pos: &[[f64; 2]]) -> f64 {
    let span = |axis: usize| {
        let (lo, hi) = pos
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[axis]), hi.max(p[axis]))
            });
        hi - lo
    };
    span(0).max(span(1))
}

/// Center on the origin and stretch so the largest |coordinate| is `scale`.
fn rescale(pos: &mut [[f64; 2]], scale: f64) {
    let n = pos.len() as f64;
    let mean = pos
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0] / n, acc[1] + p[1] / n]);
    let mut lim = 0.0_f64;
    for p in pos.iter_mut() {
        p[0] -= mean[0];
        p[1] -= mean[1];
        lim = lim.max(p[0].abs()).max(p[1].abs());
    }
    if lim > 0.0 {
        for p in pos.iter_mut() {
            p[0] *= scale / lim;
            p[1] *= scale / lim;
        }
    }
}
