use std::{sync::Arc, time::Duration};

use anyhow::{bail, ensure, Result};
use clap::Parser;
use loader::FsHttpDataSource;
use recommend::{
    ActionLog, HttpActionLog, HttpRecommendationProvider, NoopActionLog, RecommendationProvider,
};
use shared::{
    domain::{DatasetDescriptor, DatasetId, InputFormat},
    protocol::{NavRequest, VisEvent},
};
use tokio::{
    sync::broadcast,
    time::{sleep, timeout},
};
use tracing::warn;
use vis_core::{load_settings, MissingRecommendationProvider, VisController};

mod headless;

/// Drives one explorer session headlessly: overview, optionally the
/// timeline and a dataset switch, then a final summary.
#[derive(Parser, Debug)]
struct Args {
    /// Settings file; a missing file falls back to the built-in defaults.
    #[arg(long, default_value = "explorer.toml")]
    config: String,
    /// Extra datasets as TITLE=SOURCE pairs, appended to the configured ones.
    #[arg(long = "dataset", value_name = "TITLE=SOURCE")]
    datasets: Vec<String>,
    /// Input format override: tabular, remote_json, or inline_json.
    #[arg(long)]
    format: Option<InputFormat>,
    /// Fetch recommendations alongside the current dataset.
    #[arg(long)]
    adaptive: bool,
    /// Visit the timeline view after the overview has settled.
    #[arg(long)]
    timeline: bool,
    /// Switch to this dataset id (registration order, starting at 1).
    #[arg(long)]
    switch_to: Option<i64>,
    #[arg(long, default_value_t = 901.0)]
    width: f64,
    #[arg(long, default_value_t = 901.0)]
    height: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(format) = args.format {
        settings.input_format = format;
    }
    if args.adaptive {
        settings.is_adaptive = true;
    }
    for pair in &args.datasets {
        let Some((title, source)) = pair.split_once('=') else {
            bail!("dataset '{pair}' is not in TITLE=SOURCE form");
        };
        settings.datasets.push(DatasetDescriptor::new(title, source));
    }
    ensure!(
        !settings.datasets.is_empty(),
        "no datasets configured; add [[datasets]] entries to {} or pass --dataset TITLE=SOURCE",
        args.config
    );
    let dataset_count = settings.datasets.len();

    let source = Arc::new(FsHttpDataSource::new(
        settings.data_dir.clone(),
        settings.revision_endpoint.clone(),
    ));
    let recommendations: Arc<dyn RecommendationProvider> =
        if settings.is_adaptive && !settings.recommendation_endpoint.is_empty() {
            Arc::new(HttpRecommendationProvider::new(
                settings.recommendation_endpoint.clone(),
            ))
        } else {
            Arc::new(MissingRecommendationProvider)
        };
    let action_log: Arc<dyn ActionLog> =
        if settings.is_evaluation && !settings.evaluation_endpoint.is_empty() {
            Arc::new(HttpActionLog::new(settings.evaluation_endpoint.clone()))
        } else {
            Arc::new(NoopActionLog)
        };

    let controller = VisController::new_with_dependencies(
        settings,
        source,
        recommendations,
        action_log,
        headless::collaborators(args.width, args.height),
    );

    let mut printer_events = controller.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = printer_events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("event {line}"),
                Err(err) => warn!("event encoding failed: {err:#}"),
            }
        }
    });

    let mut script_events = controller.subscribe_events();
    let (nav_tx, nav_rx) = broadcast::channel(16);
    let listener = controller.spawn_nav_listener(nav_rx);

    nav_tx.send(NavRequest::Start)?;
    match next_matching(&mut script_events, Duration::from_secs(10), |e| {
        matches!(
            e,
            VisEvent::DatasetReady { .. } | VisEvent::DatasetLoadFailed { .. }
        )
    })
    .await
    {
        Some(VisEvent::DatasetReady { .. }) => {
            if next_matching(&mut script_events, Duration::from_secs(20), |e| {
                matches!(e, VisEvent::LayoutSettled { .. })
            })
            .await
            .is_none()
            {
                warn!("overview layout did not settle in time");
            }
        }
        Some(_) => warn!("overview dataset failed to load"),
        None => warn!("overview load never resolved"),
    }

    if args.timeline {
        nav_tx.send(NavRequest::ToTimeline)?;
        let mut landed = 0;
        while landed < dataset_count {
            match next_matching(&mut script_events, Duration::from_secs(10), |e| {
                matches!(
                    e,
                    VisEvent::DatasetReady { .. } | VisEvent::DatasetLoadFailed { .. }
                )
            })
            .await
            {
                Some(_) => landed += 1,
                None => {
                    warn!("timeline loads stalled after {landed} of {dataset_count}");
                    break;
                }
            }
        }
    }

    if let Some(id) = args.switch_to {
        nav_tx.send(NavRequest::ToFile {
            dataset_id: DatasetId(id),
        })?;
        if next_matching(&mut script_events, Duration::from_secs(10), |e| {
            matches!(
                e,
                VisEvent::DatasetReady { .. } | VisEvent::DatasetLoadFailed { .. }
            )
        })
        .await
        .is_none()
        {
            warn!("dataset switch never resolved");
        }
    }

    nav_tx.send(NavRequest::ZoomOut)?;
    sleep(Duration::from_millis(100)).await;

    for summary in controller.dataset_summaries().await {
        println!(
            "dataset_id={} title='{}' papers={}",
            summary.dataset_id, summary.title, summary.paper_count
        );
    }
    if let Some(metrics) = controller.layout_metrics().await {
        println!(
            "layout vis_size={} correction_factor={:.3} canvas_width={}",
            metrics.vis_size, metrics.correction_factor, metrics.canvas_width
        );
    }

    controller.shutdown().await;
    drop(nav_tx);
    let _ = listener.await;
    printer.abort();
    Ok(())
}

/// Skips events until one matches, giving up after `wait`.
async fn next_matching(
    events: &mut broadcast::Receiver<VisEvent>,
    wait: Duration,
    predicate: impl Fn(&VisEvent) -> bool,
) -> Option<VisEvent> {
    timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .unwrap_or(None)
}
