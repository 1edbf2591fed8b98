//! Timer ticker background task

use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::finish_completion;
use crate::state::{AppState, Lifecycle};

/// Background task that re-derives the countdown while the timer runs.
///
/// Sleeps on the snapshot channel whenever the timer is not running, so a
/// paused or idle timer costs nothing and is never mutated from here.
pub async fn timer_ticker_task(state: Arc<AppState>) {
    info!("Starting timer ticker task");

    let mut updates = state.subscribe_timer();
    let mut ticker = interval(state.options.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let running = updates.borrow_and_update().lifecycle == Lifecycle::Running;

        if !running {
            if updates.changed().await.is_err() {
                break;
            }
            ticker.reset();
            continue;
        }

        tokio::select! {
            _ = ticker.tick() => {
                if let Some(report) = state.tick() {
                    debug!(phase = %report.completed, epoch = report.epoch, "tick completed phase");
                    tokio::spawn(finish_completion(Arc::clone(&state), report));
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Timer ticker task stopped");
}
