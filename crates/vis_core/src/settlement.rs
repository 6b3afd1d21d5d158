use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::DatasetId;
use tokio::{sync::oneshot, task::JoinHandle, time};
use tracing::debug;

use crate::forces::AlphaProbe;

pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reports whether dependent rendering is still waiting on the layout:
/// papers mid-start, or the sub-visualization not yet finished or empty.
pub type PendingProbe = Box<dyn Fn() -> bool + Send + Sync>;

/// Cancellable poll over one dataset's pair of simulations. Polling is used
/// because the engine exposes only a readable decay value, not a completion
/// notification.
pub struct SettlementWatch {
    poll_task: JoinHandle<()>,
}

impl SettlementWatch {
    pub fn cancel(&self) {
        self.poll_task.abort();
    }
}

pub struct SettlementMonitor {
    poll_interval: Duration,
}

impl SettlementMonitor {
    pub fn new() -> Self {
        Self {
            poll_interval: SETTLE_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Watches both alphas under the epoch current at issue time. The
    /// settled signal is delivered at most once, and never once the epoch
    /// has moved on; an abandoned watch simply stops.
    pub fn watch(
        &self,
        epoch: Arc<AtomicU64>,
        started_epoch: u64,
        dataset: DatasetId,
        areas: AlphaProbe,
        papers: AlphaProbe,
        pending: PendingProbe,
    ) -> (SettlementWatch, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let poll_interval = self.poll_interval;
        let poll_task = tokio::spawn(async move {
            let mut ticker = time::interval(poll_interval);
            loop {
                ticker.tick().await;
                if epoch.load(Ordering::SeqCst) != started_epoch {
                    debug!("settle: dataset={dataset} watch outlived epoch {started_epoch}");
                    return;
                }
                if !pending() {
                    continue;
                }
                if areas.alpha().await <= 0.0 && papers.alpha().await <= 0.0 {
                    debug!("settle: dataset={dataset} layout settled");
                    let _ = tx.send(());
                    return;
                }
            }
        });
        (SettlementWatch { poll_task }, rx)
    }
}

impl Default for SettlementMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicBool;

    use simulation::{ForceNode, ForceSimulation, ForceTuning};
    use tokio::time::timeout;

    use crate::forces::SimulationHandle;

    fn settled_handle() -> SimulationHandle {
        SimulationHandle::spawn(ForceSimulation::new(600.0, ForceTuning::default()))
    }

    fn running_handle() -> SimulationHandle {
        let mut sim = ForceSimulation::new(600.0, ForceTuning::default())
            .with_nodes(vec![ForceNode::new("n", 10.0, 10.0, 5.0)]);
        sim.start();
        SimulationHandle::spawn(sim)
    }

    fn always_pending() -> PendingProbe {
        Box::new(|| true)
    }

    #[tokio::test]
    async fn fires_once_both_alphas_reach_the_floor() {
        let epoch = Arc::new(AtomicU64::new(1));
        let (_watch, settled) = SettlementMonitor::new().watch(
            Arc::clone(&epoch),
            1,
            DatasetId(1),
            settled_handle().probe(),
            settled_handle().probe(),
            always_pending(),
        );

        timeout(Duration::from_secs(1), settled)
            .await
            .expect("should settle")
            .expect("signal delivered");
    }

    #[tokio::test]
    async fn waits_while_a_simulation_is_still_running() {
        let epoch = Arc::new(AtomicU64::new(1));
        let running = running_handle();
        let (_watch, mut settled) = SettlementMonitor::new().watch(
            Arc::clone(&epoch),
            1,
            DatasetId(1),
            running.probe(),
            settled_handle().probe(),
            always_pending(),
        );

        time::sleep(Duration::from_millis(100)).await;
        assert!(settled.try_recv().is_err(), "must not fire early");

        running.stop().await;
        timeout(Duration::from_secs(1), settled)
            .await
            .expect("should settle after stop")
            .expect("signal delivered");
    }

    #[tokio::test]
    async fn epoch_change_suppresses_the_signal() {
        let epoch = Arc::new(AtomicU64::new(1));
        let (_watch, settled) = SettlementMonitor::new().watch(
            Arc::clone(&epoch),
            1,
            DatasetId(1),
            settled_handle().probe(),
            settled_handle().probe(),
            always_pending(),
        );
        epoch.store(2, Ordering::SeqCst);

        // the sender is dropped without firing
        let outcome = timeout(Duration::from_secs(1), settled).await;
        assert!(matches!(outcome, Ok(Err(_))));
    }

    #[tokio::test]
    async fn cancel_stops_polling_without_firing() {
        let epoch = Arc::new(AtomicU64::new(1));
        let (watch, settled) = SettlementMonitor::new().watch(
            Arc::clone(&epoch),
            1,
            DatasetId(1),
            settled_handle().probe(),
            settled_handle().probe(),
            always_pending(),
        );
        watch.cancel();

        let outcome = timeout(Duration::from_secs(1), settled).await;
        assert!(matches!(outcome, Ok(Err(_))));
    }

    #[tokio::test]
    async fn already_finished_dependents_keep_the_watch_idle() {
        let epoch = Arc::new(AtomicU64::new(1));
        let pending = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&pending);
        let (_watch, mut settled) = SettlementMonitor::new().watch(
            Arc::clone(&epoch),
            1,
            DatasetId(1),
            settled_handle().probe(),
            settled_handle().probe(),
            Box::new(move || probe.load(Ordering::SeqCst)),
        );

        time::sleep(Duration::from_millis(100)).await;
        assert!(settled.try_recv().is_err(), "idle watch must not fire");

        pending.store(true, Ordering::SeqCst);
        timeout(Duration::from_secs(1), settled)
            .await
            .expect("fires once dependents are pending")
            .expect("signal delivered");
    }
}
