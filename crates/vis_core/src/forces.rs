use std::{sync::Arc, time::Duration};

use shared::domain::RawDataset;
use simulation::{ForceNode, ForceSimulation};
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::layout::{linear_scale, sqrt_scale, LayoutMetrics};

const SIM_TICK: Duration = Duration::from_millis(16);

/// A running force layout: the engine behind a shared lock plus the driver
/// task stepping it. Stopping aborts the driver first so no stale tick can
/// land after a transition began tearing the view down.
pub struct SimulationHandle {
    sim: Arc<Mutex<ForceSimulation>>,
    driver: JoinHandle<()>,
}

impl SimulationHandle {
    pub fn spawn(sim: ForceSimulation) -> Self {
        let sim = Arc::new(Mutex::new(sim));
        let driver = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move {
                let mut ticker = time::interval(SIM_TICK);
                loop {
                    ticker.tick().await;
                    if !sim.lock().await.step(1.0) {
                        break;
                    }
                }
            })
        };
        Self { sim, driver }
    }

    pub async fn stop(&self) {
        self.driver.abort();
        self.sim.lock().await.stop();
    }

    pub async fn alpha(&self) -> f64 {
        self.sim.lock().await.alpha()
    }

    pub fn probe(&self) -> AlphaProbe {
        AlphaProbe(Arc::clone(&self.sim))
    }
}

/// Read-only convergence view onto a simulation, handed to the settlement
/// monitor so it never owns the handle itself.
#[derive(Clone)]
pub struct AlphaProbe(Arc<Mutex<ForceSimulation>>);

impl AlphaProbe {
    pub async fn alpha(&self) -> f64 {
        self.0.lock().await.alpha()
    }
}

fn domain_of(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut bounds: Option<(f64, f64)> = None;
    for value in values {
        bounds = Some(match bounds {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });
    }
    bounds.unwrap_or((0.0, 0.0))
}

/// Seeds one node per paper: positions mapped into the padded chart range,
/// diameters from the readers count through the square-root scale.
pub fn paper_nodes(dataset: &RawDataset, metrics: &LayoutMetrics) -> Vec<ForceNode> {
    let x_domain = domain_of(dataset.papers.iter().map(|p| p.x));
    let y_domain = domain_of(dataset.papers.iter().map(|p| p.y));
    let readers_domain = domain_of(dataset.papers.iter().map(|p| p.readers));
    let chart = (metrics.chart_range.min, metrics.chart_range.max);
    let diameters = (metrics.paper_range.min, metrics.paper_range.max);

    dataset
        .papers
        .iter()
        .map(|paper| {
            let x = linear_scale(x_domain, chart, paper.x);
            let y = linear_scale(y_domain, chart, paper.y);
            let diameter = sqrt_scale(readers_domain, diameters, paper.readers);
            ForceNode::new(paper.id.clone(), x, y, diameter / 2.0)
        })
        .collect()
}

/// Seeds one node per area: the centroid of its papers in the unpadded
/// circle range, sized by the area's summed readers.
pub fn area_nodes(dataset: &RawDataset, metrics: &LayoutMetrics) -> Vec<ForceNode> {
    let x_domain = domain_of(dataset.papers.iter().map(|p| p.x));
    let y_domain = domain_of(dataset.papers.iter().map(|p| p.y));
    let circle_chart = (
        metrics.circle_chart_range.min,
        metrics.circle_chart_range.max,
    );

    let mut totals: Vec<(String, f64, f64, f64, usize)> = Vec::new();
    for paper in &dataset.papers {
        let x = linear_scale(x_domain, circle_chart, paper.x);
        let y = linear_scale(y_domain, circle_chart, paper.y);
        match totals.iter_mut().find(|(name, ..)| name == &paper.area) {
            Some((_, sum_x, sum_y, readers, count)) => {
                *sum_x += x;
                *sum_y += y;
                *readers += paper.readers;
                *count += 1;
            }
            None => totals.push((paper.area.clone(), x, y, paper.readers, 1)),
        }
    }

    let readers_domain = domain_of(totals.iter().map(|(_, _, _, readers, _)| *readers));
    let sizes = (metrics.circle_range.min, metrics.circle_range.max);

    totals
        .into_iter()
        .map(|(name, sum_x, sum_y, readers, count)| {
            let diameter = sqrt_scale(readers_domain, sizes, readers);
            ForceNode::new(
                name,
                sum_x / count as f64,
                sum_y / count as f64,
                diameter / 2.0,
            )
        })
        .collect()
}

/// Builds the engine for one concern sized to the current square chart.
pub fn simulation_for(nodes: Vec<ForceNode>, metrics: &LayoutMetrics) -> ForceSimulation {
    ForceSimulation::new(metrics.vis_size, simulation::ForceTuning::default()).with_nodes(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Settings;
    use crate::layout::LayoutSizer;
    use crate::layout::ViewportSnapshot;
    use shared::domain::ViewState;

    fn metrics() -> LayoutMetrics {
        let viewport = ViewportSnapshot {
            container_width: 650.0,
            container_height: 651.0,
            window_width: 650.0,
            window_height: 651.0,
            ..ViewportSnapshot::default()
        };
        LayoutSizer::new(&Settings::default()).compute(&viewport, ViewState::Overview, 1)
    }

    fn dataset() -> RawDataset {
        RawDataset::new(
            serde_json::from_str(
                r#"[
                    {"id": "1", "title": "a", "x": 0.0, "y": 0.0, "readers": 10, "area": "A"},
                    {"id": "2", "title": "b", "x": 1.0, "y": 1.0, "readers": 40, "area": "A"},
                    {"id": "3", "title": "c", "x": 0.5, "y": 0.2, "readers": 90, "area": "B"}
                ]"#,
            )
            .expect("papers"),
        )
    }

    #[test]
    fn paper_nodes_stay_inside_the_padded_chart() {
        let metrics = metrics();
        let nodes = paper_nodes(&dataset(), &metrics);

        assert_eq!(nodes.len(), 3);
        for node in &nodes {
            assert!(node.x >= metrics.chart_range.min && node.x <= metrics.chart_range.max);
            assert!(node.y >= metrics.chart_range.min && node.y <= metrics.chart_range.max);
            assert!(node.radius >= metrics.paper_range.min / 2.0);
            assert!(node.radius <= metrics.paper_range.max / 2.0);
        }
    }

    #[test]
    fn area_nodes_aggregate_by_area_label() {
        let nodes = area_nodes(&dataset(), &metrics());

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "A");
        assert_eq!(nodes[1].id, "B");
        // area A holds 50 of the 90-max readers, so it gets the smaller circle
        assert!(nodes[0].radius < nodes[1].radius);
    }

    #[test]
    fn empty_dataset_seeds_no_nodes() {
        let empty = RawDataset::new(Vec::new());
        assert!(paper_nodes(&empty, &metrics()).is_empty());
        assert!(area_nodes(&empty, &metrics()).is_empty());
    }

    #[tokio::test]
    async fn spawned_simulation_decays_to_zero() {
        let mut sim = simulation_for(paper_nodes(&dataset(), &metrics()), &metrics());
        sim.start();
        let handle = SimulationHandle::spawn(sim);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
        loop {
            if handle.alpha().await == 0.0 {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "simulation never settled"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn stop_settles_immediately() {
        let mut sim = simulation_for(paper_nodes(&dataset(), &metrics()), &metrics());
        sim.start();
        let handle = SimulationHandle::spawn(sim);

        handle.stop().await;
        assert_eq!(handle.alpha().await, 0.0);
    }

    #[tokio::test]
    async fn settled_spawn_reports_zero_alpha() {
        let handle = SimulationHandle::spawn(simulation_for(Vec::new(), &metrics()));
        assert_eq!(handle.alpha().await, 0.0);
    }
}
