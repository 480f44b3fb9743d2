//! Procedural layout of the brain network's node slots.
//!
//! Slots are scattered inside an ellipsoid from a seeded RNG, so the same
//! configuration always yields the same picture. Each slot is wired to its
//! nearest neighbours. Playbooks are then pinned to slots by their `index`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

use crate::config::VisualConfig;
use crate::model::{Color, Playbook};

/// Ellipsoid axis scale (x, y, z) relative to the configured radius.
const AXIS_SCALE: [f32; 3] = [1.2, 1.0, 0.8];

/// Positions and connections for every node slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLayout {
    pub positions: Vec<[f32; 3]>,
    /// Undirected edges as `(lower, higher)` slot pairs.
    pub edges: Vec<(u32, u32)>,
}

/// A playbook placed on the network, as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentNode {
    pub index: u32,
    pub title: String,
    pub color: Color,
    pub position: [f32; 3],
}

impl NodeLayout {
    pub fn generate(config: &VisualConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.layout_seed);
        let positions: Vec<[f32; 3]> = (0..config.node_slots)
            .map(|_| {
                let p = sample_unit_ball(&mut rng);
                [
                    p[0] * AXIS_SCALE[0] * config.radius,
                    p[1] * AXIS_SCALE[1] * config.radius,
                    p[2] * AXIS_SCALE[2] * config.radius,
                ]
            })
            .collect();

        let edges = nearest_neighbour_edges(&positions, config.connections_per_node);
        Self { positions, edges }
    }

    pub fn slots(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, index: u32) -> Option<[f32; 3]> {
        self.positions.get(index as usize).copied()
    }

    /// Slots directly connected to `index`.
    pub fn neighbours(&self, index: u32) -> Vec<u32> {
        self.edges
            .iter()
            .filter_map(|&(a, b)| match (a == index, b == index) {
                (true, _) => Some(b),
                (_, true) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Pin playbooks to their slots, ordered by index.
    pub fn incident_nodes(&self, playbooks: &[Playbook]) -> Vec<IncidentNode> {
        let mut nodes: Vec<IncidentNode> = playbooks
            .iter()
            .filter_map(|p| match self.position(p.index) {
                Some(position) => Some(IncidentNode {
                    index: p.index,
                    title: p.title.clone(),
                    color: p.color,
                    position,
                }),
                None => {
                    warn!(title = %p.title, index = p.index, slots = self.slots(), "Playbook has no node slot");
                    None
                }
            })
            .collect();
        nodes.sort_by_key(|n| n.index);
        nodes
    }
}

fn sample_unit_ball(rng: &mut StdRng) -> [f32; 3] {
    loop {
        let p = [
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
        ];
        if p.iter().map(|c| c * c).sum::<f32>() <= 1.0 {
            return p;
        }
    }
}

fn distance_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_neighbour_edges(positions: &[[f32; 3]], k: usize) -> Vec<(u32, u32)> {
    let mut edges = BTreeSet::new();
    for (i, p) in positions.iter().enumerate() {
        let mut others: Vec<(usize, f32)> = positions
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, q)| (j, distance_sq(p, q)))
            .collect();
        others.sort_by(|a, b| a.1.total_cmp(&b.1));
        for (j, _) in others.into_iter().take(k) {
            let (a, b) = if i < j { (i, j) } else { (j, i) };
            edges.insert((a as u32, b as u32));
        }
    }
    edges.into_iter().collect()
}
