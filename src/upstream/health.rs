//! Periodic upstream health monitor.
//!
//! Runs one check per interval until the shutdown signal fires or the task
//! is aborted. Ticks never overlap: the next tick is only awaited after the
//! previous check completed.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::bridge::BridgeInner;

pub(crate) async fn run(bridge: Arc<BridgeInner>, mut shutdown: broadcast::Receiver<()>) {
    let interval = bridge.config.check_interval;
    tracing::info!(
        interval = ?interval,
        path = %bridge.config.health_path,
        "Upstream health monitor starting"
    );

    // start() has just probed, so the first tick waits a full interval.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("Upstream health monitor received shutdown signal, exiting loop");
                break;
            }
            _ = ticker.tick() => {
                bridge.check_health().await;
            }
        }
    }
}
