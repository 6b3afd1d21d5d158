use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use loader::DataSource;
use recommend::{ActionLog, ActionRecord, RecommendParams, RecommendationProvider, RecommendationSet};
use shared::{
    domain::{DatasetDescriptor, DatasetId, DatasetPhase, RawDataset, ViewState},
    error::{ErrorCode, VisError, VisException},
    locale,
    protocol::{DatasetSummary, LayoutSummary, NavRequest, VisEvent},
};
use tokio::{
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod config;
pub mod coordinator;
pub mod forces;
pub mod layout;
pub mod registry;
pub mod settlement;
pub mod state;

pub use config::{load_settings, Settings};
pub use coordinator::{AsyncLoadCoordinator, PreparedDataset};
pub use layout::{LayoutMetrics, LayoutSizer, ViewportSnapshot};
pub use registry::{DatasetHandle, DatasetRegistry};
pub use settlement::{SettlementMonitor, SettlementWatch};
pub use state::{next_state, NavEvent, TransitionError};

use forces::SimulationHandle;

/// Lifecycle of an auxiliary panel collaborator. `Starting` covers the span
/// between `start` and the settlement-gated `forced`/`show` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    None,
    Starting,
    Ready,
}

/// One dataset's visualization, built by a [`SubVisFactory`] on every
/// registry reset. Tolerates at most one `start` per reset.
#[async_trait]
pub trait SubVisualization: Send + Sync {
    async fn start(&self, data: &RawDataset, adaptive: Option<&RecommendationSet>) -> Result<()>;
    async fn draw(&self) -> Result<()>;
    async fn zoom_out(&self) -> Result<()>;
    fn init_mouse_listeners(&self);
    fn current_phase(&self) -> DatasetPhase;
}

pub trait SubVisFactory: Send + Sync {
    fn create(&self, descriptor: &DatasetDescriptor) -> Arc<dyn SubVisualization>;
}

/// The paper grid. `forced` is the settlement consumer: it is called once
/// the layout has settled, never while simulations still run.
#[async_trait]
pub trait PaperView: Send + Sync {
    async fn start(&self, dataset: DatasetId) -> Result<()>;
    async fn forced(&self) -> Result<()>;
    async fn show(&self) -> Result<()>;
    async fn hide(&self) -> Result<()>;
    fn reset(&self);
    fn current_phase(&self) -> PanelPhase;
}

#[async_trait]
pub trait ListPanel: Send + Sync {
    async fn start(&self, dataset: DatasetId) -> Result<()>;
    async fn show(&self) -> Result<()>;
    async fn hide(&self) -> Result<()>;
    async fn fit_height(&self, vis_size: f64) -> Result<()>;
    fn reset(&self);
    fn current_phase(&self) -> PanelPhase;
}

/// Canvas scaffolding: the SVG chart, its containment rect, grid lines and
/// column titles in timeline mode, and the heading row above the chart.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    async fn clear_canvas(&self) -> Result<()>;
    async fn draw_scaffold(&self, spec: &ScaffoldSpec) -> Result<()>;
    async fn resize(&self, spec: &ScaffoldSpec) -> Result<()>;
    async fn draw_heading(&self, spec: &HeadingSpec) -> Result<()>;
}

pub trait ViewportProbe: Send + Sync {
    fn snapshot(&self) -> ViewportSnapshot;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaffoldSpec {
    pub view: ViewState,
    pub vis_size: f64,
    pub canvas_width: f64,
    /// Column titles, one per dataset; empty outside timeline mode.
    pub dataset_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropdownEntry {
    pub dataset_id: DatasetId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadingSpec {
    pub title: String,
    /// None before the current dataset has loaded.
    pub article_count: Option<usize>,
    pub show_infolink: bool,
    pub show_timeline_link: bool,
    pub show_titlerow: bool,
    pub show_intro: bool,
    /// Dataset selector entries; empty when the dropdown is disabled.
    pub dropdown: Vec<DropdownEntry>,
    pub selected: DatasetId,
}

pub struct MissingRecommendationProvider;

#[async_trait]
impl RecommendationProvider for MissingRecommendationProvider {
    async fn recommendations(&self, params: &RecommendParams) -> Result<RecommendationSet> {
        Err(anyhow!(
            "recommendation service unavailable for user {}",
            params.user_id.0
        ))
    }
}

/// The collaborator seam: everything the controller drives but does not
/// implement. Rendering internals live behind these traits.
pub struct Collaborators {
    pub factory: Arc<dyn SubVisFactory>,
    pub paper_view: Arc<dyn PaperView>,
    pub list_panel: Arc<dyn ListPanel>,
    pub surface: Arc<dyn RenderSurface>,
    pub viewport: Arc<dyn ViewportProbe>,
}

pub struct VisController {
    settings: Settings,
    coordinator: AsyncLoadCoordinator,
    factory: Arc<dyn SubVisFactory>,
    paper_view: Arc<dyn PaperView>,
    list_panel: Arc<dyn ListPanel>,
    surface: Arc<dyn RenderSurface>,
    viewport: Arc<dyn ViewportProbe>,
    action_log: Arc<dyn ActionLog>,
    monitor: SettlementMonitor,
    sizer: LayoutSizer,
    epoch: Arc<AtomicU64>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<VisEvent>,
}

struct ControllerState {
    view: ViewState,
    current_dataset: DatasetId,
    registry: DatasetRegistry,
    metrics: Option<LayoutMetrics>,
    simulations: Vec<SimulationHandle>,
    watches: Vec<SettlementWatch>,
    pipelines: Vec<JoinHandle<()>>,
    summaries: BTreeMap<DatasetId, DatasetSummary>,
}

impl VisController {
    pub fn new(
        settings: Settings,
        source: Arc<dyn DataSource>,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        Self::new_with_dependencies(
            settings,
            source,
            Arc::new(MissingRecommendationProvider),
            Arc::new(recommend::NoopActionLog),
            collaborators,
        )
    }

    pub fn new_with_recommendations(
        settings: Settings,
        source: Arc<dyn DataSource>,
        recommendations: Arc<dyn RecommendationProvider>,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        Self::new_with_dependencies(
            settings,
            source,
            recommendations,
            Arc::new(recommend::NoopActionLog),
            collaborators,
        )
    }

    pub fn new_with_dependencies(
        settings: Settings,
        source: Arc<dyn DataSource>,
        recommendations: Arc<dyn RecommendationProvider>,
        action_log: Arc<dyn ActionLog>,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let sizer = LayoutSizer::new(&settings);
        let mut coordinator =
            AsyncLoadCoordinator::new(settings.input_format, source, recommendations);
        if settings.is_adaptive {
            coordinator = coordinator.with_adaptive(settings.recommend_params());
        }
        Arc::new(Self {
            settings,
            coordinator,
            factory: collaborators.factory,
            paper_view: collaborators.paper_view,
            list_panel: collaborators.list_panel,
            surface: collaborators.surface,
            viewport: collaborators.viewport,
            action_log,
            monitor: SettlementMonitor::new(),
            sizer,
            epoch: Arc::new(AtomicU64::new(0)),
            inner: Mutex::new(ControllerState {
                view: ViewState::Uninitialized,
                current_dataset: DatasetId::UNASSIGNED,
                registry: DatasetRegistry::new(),
                metrics: None,
                simulations: Vec::new(),
                watches: Vec::new(),
                pipelines: Vec::new(),
                summaries: BTreeMap::new(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<VisEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn current_view(&self) -> ViewState {
        self.inner.lock().await.view
    }

    pub async fn current_dataset(&self) -> DatasetId {
        self.inner.lock().await.current_dataset
    }

    pub async fn layout_metrics(&self) -> Option<LayoutMetrics> {
        self.inner.lock().await.metrics.clone()
    }

    pub async fn dataset_summaries(&self) -> Vec<DatasetSummary> {
        self.inner
            .lock()
            .await
            .summaries
            .values()
            .cloned()
            .collect()
    }

    /// Consumes navigation requests from a broadcast channel until the
    /// sender side closes.
    pub fn spawn_nav_listener(
        self: &Arc<Self>,
        mut requests: broadcast::Receiver<NavRequest>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(request) = requests.recv().await {
                controller.handle_request(request).await;
            }
        })
    }

    /// Single entry point for outside code: applies the request and turns
    /// every failure into an `Error` event instead of a return value.
    pub async fn handle_request(self: &Arc<Self>, request: NavRequest) {
        let outcome = match request {
            NavRequest::Start => self.apply_transition(NavEvent::Start).await,
            NavRequest::ToTimeline => self.apply_transition(NavEvent::ToTimeline).await,
            NavRequest::ToFile { dataset_id } => {
                self.apply_transition(NavEvent::ToFile(dataset_id)).await
            }
            NavRequest::Resize => self.refresh_layout().await,
            NavRequest::ZoomOut => self.zoom_out().await,
        };

        if let Err(err) = outcome {
            warn!("view: request failed: {err:#}");
            let error = match err.downcast_ref::<VisException>() {
                Some(exception) => VisError::new(exception.code, exception.message.clone()),
                None => VisError::new(ErrorCode::Internal, format!("{err:#}")),
            };
            let _ = self.events.send(VisEvent::Error(error));
        }
    }

    async fn apply_transition(self: &Arc<Self>, event: NavEvent) -> Result<()> {
        self.transition(event).await.map_err(|err| {
            let code = match err {
                TransitionError::Invalid { .. } => ErrorCode::InvalidTransition,
                TransitionError::InFlight => ErrorCode::TransitionInFlight,
            };
            VisException::new(code, err.to_string()).into()
        })
    }

    /// Runs one transition end to end. Entry actions execute in a fixed
    /// order under the state lock: stop simulations and watches, tear down
    /// the prior canvas, rebuild the registry, recompute layout, draw the
    /// new scaffolding, then issue the load pipelines. A request arriving
    /// while another transition holds the lock is rejected, not queued.
    pub async fn transition(self: &Arc<Self>, event: NavEvent) -> Result<(), TransitionError> {
        let mut guard = self.inner.try_lock().map_err(|_| TransitionError::InFlight)?;

        let from = guard.view;
        let Some(to) = state::next_state(from, &event) else {
            return Err(TransitionError::Invalid {
                event: event.name(),
                state: from,
            });
        };

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!("view: {from:?} -> {to:?} event={} epoch={epoch}", event.name());

        for watch in guard.watches.drain(..) {
            watch.cancel();
        }
        for sim in guard.simulations.drain(..) {
            sim.stop().await;
        }
        // In-flight loads are never aborted; their resolutions go stale
        // against the new epoch. Finished tasks are pruned here.
        guard.pipelines.retain(|task| !task.is_finished());

        if let Err(err) = self.surface.clear_canvas().await {
            self.emit_render_failure("clear canvas", &err);
        }
        self.paper_view.reset();
        self.list_panel.reset();

        guard
            .registry
            .reset(&self.settings.datasets, self.factory.as_ref());
        guard.summaries.clear();
        for handle in guard.registry.iter() {
            let _ = self.events.send(VisEvent::DatasetRegistered {
                dataset_id: handle.id,
                title: handle.title.clone(),
            });
        }

        match &event {
            NavEvent::Start => {
                guard.current_dataset = guard
                    .registry
                    .ids()
                    .first()
                    .copied()
                    .unwrap_or(DatasetId::UNASSIGNED);
            }
            NavEvent::ToFile(dataset_id) => {
                guard.current_dataset = *dataset_id;
                if guard.registry.get(*dataset_id).is_none() {
                    warn!("view: dataset {dataset_id} is not registered");
                    let _ = self.events.send(VisEvent::DatasetLoadFailed {
                        dataset_id: *dataset_id,
                        error: VisError::new(
                            ErrorCode::LoadFailure,
                            format!("dataset {dataset_id} is not registered"),
                        ),
                    });
                }
            }
            NavEvent::ToTimeline => {}
        }

        let snapshot = self.viewport.snapshot();
        let metrics = self.sizer.compute(&snapshot, to, guard.registry.count());
        guard.metrics = Some(metrics.clone());
        let _ = self.events.send(VisEvent::LayoutRecomputed {
            layout: layout_summary(&metrics),
        });

        let scaffold = self.scaffold_spec(to, &guard.registry, &metrics);
        if let Err(err) = self.surface.draw_scaffold(&scaffold).await {
            self.emit_render_failure("draw scaffold", &err);
        }
        let heading = self.heading_spec(to, &guard.registry, guard.current_dataset, None);
        if let Err(err) = self.surface.draw_heading(&heading).await {
            self.emit_render_failure("draw heading", &err);
        }

        guard.view = to;
        let _ = self.events.send(VisEvent::ViewChanged { from, to });
        self.spawn_action_record(event.name(), guard.current_dataset);

        let targets: Vec<DatasetHandle> = match to {
            ViewState::Timeline => guard.registry.iter().cloned().collect(),
            _ => guard
                .registry
                .get(guard.current_dataset)
                .cloned()
                .into_iter()
                .collect(),
        };
        for handle in targets {
            let task = self.spawn_dataset_pipeline(epoch, to, handle, metrics.clone());
            guard.pipelines.push(task);
        }

        Ok(())
    }

    /// Recomputes metrics for the current view without entering the
    /// transition table: update-only scaffold redraw plus a list refit.
    pub async fn refresh_layout(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.view == ViewState::Uninitialized {
            debug!("layout: resize before start ignored");
            return Ok(());
        }

        let snapshot = self.viewport.snapshot();
        let metrics = self.sizer.compute(&snapshot, guard.view, guard.registry.count());
        guard.metrics = Some(metrics.clone());
        info!(
            "layout: resized vis_size={} canvas_width={}",
            metrics.vis_size, metrics.canvas_width
        );

        let scaffold = self.scaffold_spec(guard.view, &guard.registry, &metrics);
        self.surface.resize(&scaffold).await.map_err(|err| {
            anyhow::Error::from(VisException::new(
                ErrorCode::RenderFailure,
                format!("resize redraw: {err:#}"),
            ))
        })?;
        self.list_panel.fit_height(metrics.vis_size).await?;

        let _ = self.events.send(VisEvent::LayoutRecomputed {
            layout: layout_summary(&metrics),
        });
        Ok(())
    }

    /// Delegates to the current dataset's sub-visualization. A zoom-out
    /// before any dataset exists is a no-op.
    pub async fn zoom_out(&self) -> Result<()> {
        let vis = {
            let guard = self.inner.lock().await;
            match guard.registry.get(guard.current_dataset) {
                Some(handle) => Arc::clone(&handle.vis),
                None => return Ok(()),
            }
        };
        vis.zoom_out().await
    }

    /// Abandons all outstanding pipelines, watches, and simulations. Not an
    /// error path; there is no terminal view state.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        for task in guard.pipelines.drain(..) {
            task.abort();
        }
        for watch in guard.watches.drain(..) {
            watch.cancel();
        }
        for sim in guard.simulations.drain(..) {
            sim.stop().await;
        }
        info!("view: controller shut down");
    }

    fn spawn_dataset_pipeline(
        self: &Arc<Self>,
        epoch: u64,
        view: ViewState,
        handle: DatasetHandle,
        metrics: LayoutMetrics,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = controller
                .run_dataset_pipeline(epoch, view, &handle, &metrics)
                .await
            {
                warn!("load: dataset={} failed: {err:#}", handle.id);
                let _ = controller.events.send(VisEvent::DatasetLoadFailed {
                    dataset_id: handle.id,
                    error: VisError::new(ErrorCode::LoadFailure, format!("{err:#}")),
                });
            }
        })
    }

    /// One dataset's pipeline, strictly ordered: load, sub-visualization
    /// start, simulation start, settlement watch. Outside timeline mode the
    /// paper grid, chart draw, mouse listeners, and list panel start in
    /// between, matching the single-dataset build-up sequence. Everything
    /// after the load runs under the state lock, so a transition arriving
    /// mid-build is rejected as in-flight instead of interleaving with a
    /// half-built view.
    async fn run_dataset_pipeline(
        self: &Arc<Self>,
        epoch: u64,
        view: ViewState,
        handle: &DatasetHandle,
        metrics: &LayoutMetrics,
    ) -> Result<()> {
        let allow_adaptive = view != ViewState::Timeline;
        let prepared = self.coordinator.prepare(&handle.source, allow_adaptive).await?;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("load: dataset={} resolution outlived epoch {epoch}", handle.id);
            return Ok(());
        }

        // The epoch only advances under this lock, so one re-check at
        // acquisition covers the whole build.
        let mut guard = self.inner.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("load: dataset={} build outlived epoch {epoch}", handle.id);
            return Ok(());
        }

        handle
            .vis
            .start(&prepared.raw, prepared.adaptive.as_ref())
            .await?;

        if view != ViewState::Timeline {
            let heading = self.heading_spec(
                view,
                &guard.registry,
                handle.id,
                Some(prepared.raw.paper_count()),
            );
            if let Err(err) = self.surface.draw_heading(&heading).await {
                self.emit_render_failure("redraw heading", &err);
            }
        }

        let mut area_sim = forces::simulation_for(forces::area_nodes(&prepared.raw, metrics), metrics);
        if self.settings.is_force_areas {
            area_sim.kick(self.settings.area_force_alpha);
        } else {
            area_sim.kick(0.0);
        }
        let mut paper_sim =
            forces::simulation_for(forces::paper_nodes(&prepared.raw, metrics), metrics);
        paper_sim.start();

        let areas = SimulationHandle::spawn(area_sim);
        let papers = SimulationHandle::spawn(paper_sim);

        if view != ViewState::Timeline {
            if let Err(err) = self.start_panels(handle).await {
                areas.stop().await;
                papers.stop().await;
                return Err(err);
            }
        }

        let pending: settlement::PendingProbe = {
            let paper_view = Arc::clone(&self.paper_view);
            let vis = Arc::clone(&handle.vis);
            Box::new(move || {
                matches!(paper_view.current_phase(), PanelPhase::Starting)
                    || matches!(
                        vis.current_phase(),
                        DatasetPhase::NotStarted | DatasetPhase::Loading
                    )
            })
        };
        let (watch, settled) = self.monitor.watch(
            Arc::clone(&self.epoch),
            epoch,
            handle.id,
            areas.probe(),
            papers.probe(),
            pending,
        );
        let companion = self.spawn_settled_companion(epoch, handle.id, settled);

        guard.watches.push(watch);
        guard.simulations.push(areas);
        guard.simulations.push(papers);
        guard.pipelines.push(companion);

        let summary = DatasetSummary {
            dataset_id: handle.id,
            title: handle.title.clone(),
            paper_count: prepared.raw.paper_count(),
            retrieved_at: Some(prepared.raw.retrieved_at),
        };
        guard.summaries.insert(handle.id, summary.clone());
        drop(guard);

        info!(
            "load: dataset={} ready papers={} adaptive={}",
            handle.id,
            summary.paper_count,
            prepared.adaptive.is_some()
        );
        let _ = self.events.send(VisEvent::DatasetReady { summary });
        Ok(())
    }

    /// Companion panels around the chart, skipped in timeline mode.
    async fn start_panels(&self, handle: &DatasetHandle) -> Result<()> {
        self.paper_view.start(handle.id).await?;
        handle.vis.draw().await?;
        handle.vis.init_mouse_listeners();
        self.list_panel.start(handle.id).await
    }

    /// Waits for the settled signal, then performs the dependent rendering:
    /// final paper placement and, when enabled, showing the list panel.
    /// Placement holds the state lock the same way the build does.
    fn spawn_settled_companion(
        self: &Arc<Self>,
        epoch: u64,
        dataset: DatasetId,
        settled: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if settled.await.is_err() {
                return;
            }
            let _guard = controller.inner.lock().await;
            if controller.epoch.load(Ordering::SeqCst) != epoch {
                debug!("settle: dataset={dataset} signal outlived epoch {epoch}");
                return;
            }
            if let Err(err) = controller.paper_view.forced().await {
                warn!("settle: dataset={dataset} paper placement failed: {err:#}");
            }
            if controller.settings.show_list {
                if let Err(err) = controller.list_panel.show().await {
                    warn!("settle: dataset={dataset} list show failed: {err:#}");
                }
            }
            let _ = controller
                .events
                .send(VisEvent::LayoutSettled { dataset_id: dataset });
        })
    }

    fn spawn_action_record(self: &Arc<Self>, action: &'static str, item: DatasetId) {
        if !self.settings.is_evaluation {
            return;
        }
        let log = Arc::clone(&self.action_log);
        let record = ActionRecord {
            user: self.settings.user_id.to_string(),
            action: action.to_string(),
            item: item.to_string(),
            item_type: "navigation".to_string(),
            timestamp: Some(chrono::Utc::now()),
        };
        tokio::spawn(async move {
            if let Err(err) = log.record(&record).await {
                warn!("view: action log failed: {err:#}");
            }
        });
    }

    fn scaffold_spec(
        &self,
        view: ViewState,
        registry: &DatasetRegistry,
        metrics: &LayoutMetrics,
    ) -> ScaffoldSpec {
        let dataset_titles = if view == ViewState::Timeline {
            registry.iter().map(|handle| handle.title.clone()).collect()
        } else {
            Vec::new()
        };
        ScaffoldSpec {
            view,
            vis_size: metrics.vis_size,
            canvas_width: metrics.canvas_width,
            dataset_titles,
        }
    }

    fn heading_spec(
        &self,
        view: ViewState,
        registry: &DatasetRegistry,
        selected: DatasetId,
        article_count: Option<usize>,
    ) -> HeadingSpec {
        let title = if self.settings.title.is_empty() {
            locale::default_heading(&self.settings.language, article_count.unwrap_or(0))
        } else {
            self.settings.title.clone()
        };
        let dropdown = if self.settings.show_dropdown {
            registry
                .iter()
                .map(|handle| DropdownEntry {
                    dataset_id: handle.id,
                    title: handle.title.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        HeadingSpec {
            title,
            article_count,
            show_infolink: self.settings.show_infolink,
            show_timeline_link: self.settings.show_timeline && view != ViewState::Timeline,
            show_titlerow: self.settings.show_titlerow,
            show_intro: self.settings.show_intro,
            dropdown,
            selected,
        }
    }

    fn emit_render_failure(&self, what: &str, err: &anyhow::Error) {
        warn!("view: {what} failed: {err:#}");
        let _ = self.events.send(VisEvent::Error(VisError::new(
            ErrorCode::RenderFailure,
            format!("{what}: {err:#}"),
        )));
    }
}

fn layout_summary(metrics: &LayoutMetrics) -> LayoutSummary {
    LayoutSummary {
        vis_size: metrics.vis_size,
        correction_factor: metrics.correction_factor,
        canvas_width: metrics.canvas_width,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
