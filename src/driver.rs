use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info};

use crate::controller::{EngineSnapshot, SimulationController};

pub type SharedController = Arc<Mutex<SimulationController>>;

pub const ALERT_SWEEP_PERIOD: Duration = Duration::from_millis(250);

pub fn share(controller: SimulationController) -> SharedController {
    Arc::new(Mutex::new(controller))
}

/// Background tasks that keep a shared controller moving.
pub struct Driver {
    ticker: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl Driver {
    /// Starts the fixed-period tick loop and the alert sweeper. Each tick runs
    /// to completion under the controller lock, so ticks never overlap and
    /// actions land between them.
    pub fn spawn(
        controller: SharedController,
        period: Duration,
        frames: broadcast::Sender<EngineSnapshot>,
    ) -> Self {
        let ticker = tokio::spawn(tick_loop(controller.clone(), period, frames));
        let sweeper = tokio::spawn(sweep_loop(controller, ALERT_SWEEP_PERIOD));
        Self { ticker, sweeper }
    }

    pub fn stop(self) {
        self.ticker.abort();
        self.sweeper.abort();
    }
}

async fn tick_loop(
    controller: SharedController,
    period: Duration,
    frames: broadcast::Sender<EngineSnapshot>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let frame = {
            let Ok(mut sim) = controller.lock() else {
                error!("controller lock poisoned; stopping tick loop");
                return;
            };
            match sim.tick() {
                Some(summary) => {
                    if let Some(alert) = &summary.rain_onset {
                        info!(alert_id = alert.id, tick = summary.tick, "broadcasting rain alert");
                    }
                    Some(sim.snapshot())
                }
                None => {
                    if sim.needs_flush() {
                        sim.flush();
                    }
                    None
                }
            }
        };
        if let Some(frame) = frame {
            // No subscribers is fine.
            let _ = frames.send(frame);
        }
    }
}

async fn sweep_loop(controller: SharedController, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let removed = {
            let Ok(mut sim) = controller.lock() else {
                error!("controller lock poisoned; stopping alert sweeper");
                return;
            };
            sim.purge_alerts()
        };
        if removed > 0 {
            debug!(removed, "expired alerts swept");
        }
    }
}
