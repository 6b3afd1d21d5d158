//! Collaborators that narrate render calls to the log instead of drawing.
//! The phase bookkeeping is real so settlement behaves as it would against
//! an actual frontend.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use recommend::RecommendationSet;
use shared::domain::{DatasetDescriptor, DatasetId, DatasetPhase, RawDataset};
use tracing::{debug, info};
use vis_core::{
    Collaborators, HeadingSpec, ListPanel, PanelPhase, PaperView, RenderSurface, ScaffoldSpec,
    SubVisFactory, SubVisualization, ViewportProbe, ViewportSnapshot,
};

pub fn collaborators(width: f64, height: f64) -> Collaborators {
    Collaborators {
        factory: Arc::new(HeadlessVisFactory),
        paper_view: Arc::new(HeadlessPaperView::new()),
        list_panel: Arc::new(HeadlessListPanel::new()),
        surface: Arc::new(HeadlessSurface),
        viewport: Arc::new(FixedViewportProbe { width, height }),
    }
}

struct HeadlessVis {
    title: String,
    phase: Mutex<DatasetPhase>,
}

#[async_trait]
impl SubVisualization for HeadlessVis {
    async fn start(&self, data: &RawDataset, adaptive: Option<&RecommendationSet>) -> Result<()> {
        info!(
            "vis: '{}' built papers={} areas={} recommended={}",
            self.title,
            data.paper_count(),
            data.area_names().len(),
            adaptive.map_or(0, RecommendationSet::len)
        );
        *self.phase.lock().unwrap() = if data.is_empty() {
            DatasetPhase::Empty
        } else {
            DatasetPhase::Ready
        };
        Ok(())
    }

    async fn draw(&self) -> Result<()> {
        info!("vis: '{}' chart drawn", self.title);
        Ok(())
    }

    async fn zoom_out(&self) -> Result<()> {
        info!("vis: '{}' zoomed out", self.title);
        Ok(())
    }

    fn init_mouse_listeners(&self) {
        debug!("vis: '{}' mouse listeners attached", self.title);
    }

    fn current_phase(&self) -> DatasetPhase {
        *self.phase.lock().unwrap()
    }
}

struct HeadlessVisFactory;

impl SubVisFactory for HeadlessVisFactory {
    fn create(&self, descriptor: &DatasetDescriptor) -> Arc<dyn SubVisualization> {
        Arc::new(HeadlessVis {
            title: descriptor.title.clone(),
            phase: Mutex::new(DatasetPhase::NotStarted),
        })
    }
}

struct HeadlessPaperView {
    phase: Mutex<PanelPhase>,
}

impl HeadlessPaperView {
    fn new() -> Self {
        Self {
            phase: Mutex::new(PanelPhase::None),
        }
    }
}

#[async_trait]
impl PaperView for HeadlessPaperView {
    async fn start(&self, dataset: DatasetId) -> Result<()> {
        info!("papers: grid started for dataset {dataset}");
        *self.phase.lock().unwrap() = PanelPhase::Starting;
        Ok(())
    }

    async fn forced(&self) -> Result<()> {
        info!("papers: final placement applied");
        *self.phase.lock().unwrap() = PanelPhase::Ready;
        Ok(())
    }

    async fn show(&self) -> Result<()> {
        info!("papers: grid shown");
        Ok(())
    }

    async fn hide(&self) -> Result<()> {
        info!("papers: grid hidden");
        Ok(())
    }

    fn reset(&self) {
        debug!("papers: grid reset");
        *self.phase.lock().unwrap() = PanelPhase::None;
    }

    fn current_phase(&self) -> PanelPhase {
        *self.phase.lock().unwrap()
    }
}

struct HeadlessListPanel {
    phase: Mutex<PanelPhase>,
}

impl HeadlessListPanel {
    fn new() -> Self {
        Self {
            phase: Mutex::new(PanelPhase::None),
        }
    }
}

#[async_trait]
impl ListPanel for HeadlessListPanel {
    async fn start(&self, dataset: DatasetId) -> Result<()> {
        info!("list: panel populated for dataset {dataset}");
        *self.phase.lock().unwrap() = PanelPhase::Starting;
        Ok(())
    }

    async fn show(&self) -> Result<()> {
        info!("list: panel shown");
        *self.phase.lock().unwrap() = PanelPhase::Ready;
        Ok(())
    }

    async fn hide(&self) -> Result<()> {
        info!("list: panel hidden");
        Ok(())
    }

    async fn fit_height(&self, vis_size: f64) -> Result<()> {
        debug!("list: panel height fitted to {vis_size}");
        Ok(())
    }

    fn reset(&self) {
        debug!("list: panel reset");
        *self.phase.lock().unwrap() = PanelPhase::None;
    }

    fn current_phase(&self) -> PanelPhase {
        *self.phase.lock().unwrap()
    }
}

struct HeadlessSurface;

#[async_trait]
impl RenderSurface for HeadlessSurface {
    async fn clear_canvas(&self) -> Result<()> {
        debug!("render: canvas cleared");
        Ok(())
    }

    async fn draw_scaffold(&self, spec: &ScaffoldSpec) -> Result<()> {
        info!(
            "render: scaffold view={:?} vis_size={} canvas_width={} columns={:?}",
            spec.view, spec.vis_size, spec.canvas_width, spec.dataset_titles
        );
        Ok(())
    }

    async fn resize(&self, spec: &ScaffoldSpec) -> Result<()> {
        info!(
            "render: scaffold resized vis_size={} canvas_width={}",
            spec.vis_size, spec.canvas_width
        );
        Ok(())
    }

    async fn draw_heading(&self, spec: &HeadingSpec) -> Result<()> {
        info!(
            "render: heading '{}' articles={:?} dropdown={} timeline_link={}",
            spec.title,
            spec.article_count,
            spec.dropdown.len(),
            spec.show_timeline_link
        );
        Ok(())
    }
}

struct FixedViewportProbe {
    width: f64,
    height: f64,
}

impl ViewportProbe for FixedViewportProbe {
    fn snapshot(&self) -> ViewportSnapshot {
        ViewportSnapshot {
            container_width: self.width,
            container_height: self.height,
            window_width: self.width,
            window_height: self.height,
            ..ViewportSnapshot::default()
        }
    }
}
