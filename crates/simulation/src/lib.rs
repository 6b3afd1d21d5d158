//! Force-directed placement engine for area and paper layout.
//!
//! The engine is synchronous: callers step it on their own cadence and read
//! `alpha()` as the convergence signal. Alpha decays multiplicatively each
//! step and snaps to exactly 0.0 at the floor, so `alpha() == 0.0` is the
//! settled test.

use serde::{Deserialize, Serialize};

/// Alpha assigned by `start`; matches the d3 force layout this replaces.
pub const ALPHA_START: f64 = 0.1;
/// Below this the layout is considered settled and alpha snaps to zero.
pub const ALPHA_FLOOR: f64 = 0.005;

const MIN_DISTANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceTuning {
    /// Pairwise repulsion strength, applied as `repulsion / d^2`.
    pub repulsion: f64,
    /// Spring constant for linked nodes.
    pub spring: f64,
    /// Rest length of spring links.
    pub spring_length: f64,
    /// Weak pull toward the canvas center.
    pub gravity: f64,
    /// Velocity retained per step.
    pub damping: f64,
    /// Displacement clamp per step, in canvas pixels.
    pub max_step: f64,
    /// Multiplicative alpha decay per step.
    pub alpha_decay: f64,
}

impl Default for ForceTuning {
    fn default() -> Self {
        Self {
            repulsion: 5000.0,
            spring: 0.06,
            spring_length: 30.0,
            gravity: 0.03,
            damping: 0.9,
            max_step: 12.0,
            alpha_decay: 0.99,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
}

impl ForceNode {
    pub fn new(id: impl Into<String>, x: f64, y: f64, radius: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForceSimulation {
    nodes: Vec<ForceNode>,
    links: Vec<(usize, usize)>,
    size: f64,
    tuning: ForceTuning,
    alpha: f64,
    running: bool,
}

impl ForceSimulation {
    /// An engine over a `size` x `size` square canvas. Created settled; call
    /// `start` or `kick` to run it.
    pub fn new(size: f64, tuning: ForceTuning) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            size: size.max(1.0),
            tuning,
            alpha: 0.0,
            running: false,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<ForceNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn add_node(&mut self, node: ForceNode) {
        self.nodes.push(node);
    }

    /// Links two nodes by index. Out-of-range indices are ignored at step
    /// time rather than panicking.
    pub fn link(&mut self, a: usize, b: usize) {
        self.links.push((a, b));
    }

    pub fn start(&mut self) {
        self.kick(ALPHA_START);
    }

    /// Sets the decay signal directly. The area micro-adjust pass starts
    /// from a much smaller alpha than paper placement; zero means settled.
    pub fn kick(&mut self, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha < ALPHA_FLOOR || self.nodes.is_empty() {
            self.alpha = 0.0;
            self.running = false;
        } else {
            self.alpha = alpha;
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.alpha = 0.0;
        self.running = false;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn nodes(&self) -> &[ForceNode] {
        &self.nodes
    }

    /// Advances the layout by one tick. Returns false once settled.
    pub fn step(&mut self, dt: f64) -> bool {
        if !self.running {
            return false;
        }

        let count = self.nodes.len();
        let mut forces = vec![(0.0f64, 0.0f64); count];

        for i in 0..count {
            for j in (i + 1)..count {
                let dx = self.nodes[j].x - self.nodes[i].x;
                let dy = self.nodes[j].y - self.nodes[i].y;
                let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let push = self.tuning.repulsion / (dist * dist);
                let fx = dx / dist * push;
                let fy = dy / dist * push;
                forces[i].0 -= fx;
                forces[i].1 -= fy;
                forces[j].0 += fx;
                forces[j].1 += fy;
            }
        }

        for &(a, b) in &self.links {
            if a >= count || b >= count {
                continue;
            }
            let dx = self.nodes[b].x - self.nodes[a].x;
            let dy = self.nodes[b].y - self.nodes[a].y;
            let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
            let stretch = dist - self.tuning.spring_length;
            let pull = self.tuning.spring * stretch;
            let fx = dx / dist * pull;
            let fy = dy / dist * pull;
            forces[a].0 += fx;
            forces[a].1 += fy;
            forces[b].0 -= fx;
            forces[b].1 -= fy;
        }

        let center = self.size / 2.0;
        for (i, node) in self.nodes.iter().enumerate() {
            forces[i].0 += (center - node.x) * self.tuning.gravity;
            forces[i].1 += (center - node.y) * self.tuning.gravity;
        }

        for (node, force) in self.nodes.iter_mut().zip(forces) {
            node.vx = (node.vx + force.0 * self.alpha * dt) * self.tuning.damping;
            node.vy = (node.vy + force.1 * self.alpha * dt) * self.tuning.damping;

            let mut step_x = node.vx * dt;
            let mut step_y = node.vy * dt;
            let step_len = (step_x * step_x + step_y * step_y).sqrt();
            if step_len > self.tuning.max_step {
                let scale = self.tuning.max_step / step_len;
                step_x *= scale;
                step_y *= scale;
            }

            node.x += step_x;
            node.y += step_y;

            // Containment inside the canvas rect.
            let low = node.radius.min(self.size / 2.0);
            let high = (self.size - node.radius).max(low);
            node.x = node.x.clamp(low, high);
            node.y = node.y.clamp(low, high);
        }

        self.alpha *= self.tuning.alpha_decay;
        if self.alpha < ALPHA_FLOOR {
            self.alpha = 0.0;
            self.running = false;
            return false;
        }

        true
    }
}
